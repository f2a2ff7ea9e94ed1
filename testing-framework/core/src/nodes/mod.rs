mod api_client;
pub mod common;
pub mod node;
pub mod types;

use std::{io, path::PathBuf};

pub use api_client::{ApiClient, ApiClientError, RpcErrorBody};
use cluster_harness_env as tf_env;
use tempfile::TempDir;
use tracing::info;

const TEMPDIR_PREFIX: &str = "near-cluster-";

pub(crate) fn create_tempdir() -> io::Result<TempDir> {
    tempfile::Builder::new().prefix(TEMPDIR_PREFIX).tempdir()
}

/// Keep the contents of `tempdir` on disk and swap a fresh, empty tempdir
/// into its place so the handle can still be dropped normally.
pub(crate) fn persist_tempdir(tempdir: &mut TempDir, label: &str) -> io::Result<PathBuf> {
    let fresh = create_tempdir()?;
    let kept = std::mem::replace(tempdir, fresh).keep();
    info!(node = label, path = %kept.display(), "kept node home for inspection");
    Ok(kept)
}

pub(crate) fn should_persist_tempdir(keep_home: bool) -> bool {
    keep_home || tf_env::near_tests_keep_logs()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn persisted_tempdir_survives_drop() {
        let mut tempdir = create_tempdir().expect("tempdir");
        fs::write(tempdir.path().join("stderr.log"), "boom").expect("seed log");

        let kept = persist_tempdir(&mut tempdir, "node0").expect("persist");
        drop(tempdir);

        assert_eq!(fs::read_to_string(kept.join("stderr.log")).expect("log kept"), "boom");
        fs::remove_dir_all(kept).expect("cleanup");
    }
}
