use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";
pub const GENESIS_FILE: &str = "genesis.json";
pub const NODE_KEY_FILE: &str = "node_key.json";

const STDOUT_FILE: &str = "stdout";
const STDERR_FILE: &str = "stderr";

/// Home directory of a node inside its tempdir.
#[must_use]
pub fn node_home(base_dir: &Path) -> PathBuf {
    base_dir.join("home")
}

#[must_use]
pub fn stdout_path(home: &Path) -> PathBuf {
    home.join(STDOUT_FILE)
}

#[must_use]
pub fn stderr_path(home: &Path) -> PathBuf {
    home.join(STDERR_FILE)
}
