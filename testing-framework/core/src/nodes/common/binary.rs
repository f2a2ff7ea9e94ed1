use std::{env, path::PathBuf};

use cluster_harness_env as tf_env;
use tracing::{debug, info};

use crate::topology::configs::base::BaseConfig;

/// Workspace-relative path used when nothing else resolves.
const FALLBACK_PATH: &str = "target/debug/neard";

pub struct BinaryResolver;

impl BinaryResolver {
    /// Resolve the node binary: `NEARD_BIN`, then `near_root/binary_name`,
    /// then `PATH`, then the workspace build output.
    pub fn resolve_path(config: &BaseConfig) -> PathBuf {
        if let Some(resolved) = tf_env::neard_bin() {
            info!(
                env = "NEARD_BIN",
                path = %resolved.display(),
                "resolved binary from env override"
            );
            return resolved;
        }
        let configured = config.near_root.join(&config.binary_name);
        if configured.is_file() {
            info!(
                binary = config.binary_name,
                path = %configured.display(),
                "resolved binary from near_root"
            );
            return configured;
        }
        if let Some(path) = Self::which_on_path(&config.binary_name) {
            info!(
                binary = config.binary_name,
                path = %path.display(),
                "resolved binary from PATH"
            );
            return path;
        }
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../");
        let fallback = root.join(FALLBACK_PATH);

        debug!(
            binary = config.binary_name,
            path = %fallback.display(),
            "falling back to binary path"
        );
        fallback
    }

    fn which_on_path(bin: &str) -> Option<PathBuf> {
        let path_env = env::var_os("PATH")?;
        env::split_paths(&path_env)
            .map(|p| p.join(bin))
            .find(|candidate| candidate.is_file())
    }
}
