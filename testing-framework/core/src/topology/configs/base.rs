use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use cluster_harness_env as tf_env;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::DEFAULT_STARTUP_TIMEOUT;

const DEFAULT_NEAR_ROOT: &str = "target/debug";
const DEFAULT_BINARY_NAME: &str = "neard";
const DEFAULT_SHARDS: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read cluster config at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse cluster config at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("cluster config must request at least one shard")]
    ZeroShards,
}

/// Network/protocol parameters shared by every node of a local cluster.
///
/// Files may be written as YAML or JSON; unknown keys are rejected so typos
/// do not silently fall back to defaults.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BaseConfig {
    /// Directory searched for the node binary when `NEARD_BIN` is unset.
    pub near_root: PathBuf,
    pub binary_name: String,
    pub shards: u32,
    pub startup_timeout_secs: u64,
    /// Keep node home directories (logs, databases) after the run.
    pub keep_logs: bool,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            near_root: PathBuf::from(DEFAULT_NEAR_ROOT),
            binary_name: DEFAULT_BINARY_NAME.to_owned(),
            shards: DEFAULT_SHARDS,
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT.as_secs(),
            keep_logs: false,
        }
    }
}

impl BaseConfig {
    /// Parse a config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.shards == 0 {
            return Err(ConfigError::ZeroShards);
        }
        Ok(())
    }
}

/// Load the base cluster config from `NEAR_TESTS_CONFIG`, falling back to
/// defaults. `NEAR_TESTS_KEEP_LOGS` forces `keep_logs` on.
pub fn load_config() -> Result<BaseConfig, ConfigError> {
    let mut config = match tf_env::near_tests_config() {
        Some(path) => {
            info!(path = %path.display(), "loading cluster config");
            BaseConfig::from_path(&path)?
        }
        None => {
            debug!("NEAR_TESTS_CONFIG not set, using default cluster config");
            BaseConfig::default()
        }
    };

    if tf_env::near_tests_keep_logs() {
        config.keep_logs = true;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create config file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let file = write_config("binary_name: neard-nightly\n");
        let config = BaseConfig::from_path(file.path()).expect("parse config");

        assert_eq!(config.binary_name, "neard-nightly");
        assert_eq!(config.shards, DEFAULT_SHARDS);
        assert_eq!(config.near_root, PathBuf::from(DEFAULT_NEAR_ROOT));
        assert_eq!(config.startup_timeout(), DEFAULT_STARTUP_TIMEOUT);
    }

    #[test]
    fn json_files_are_accepted() {
        let file = write_config(r#"{"near_root": "/opt/near/bin", "shards": 4, "keep_logs": true}"#);
        let config = BaseConfig::from_path(file.path()).expect("parse config");

        assert_eq!(config.near_root, PathBuf::from("/opt/near/bin"));
        assert_eq!(config.shards, 4);
        assert!(config.keep_logs);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("relase: true\n");
        let err = BaseConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn zero_shards_is_rejected() {
        let file = write_config("shards: 0\n");
        let err = BaseConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroShards));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = BaseConfig::from_path(Path::new("/nonexistent/cluster.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cluster.yaml"));
    }
}
