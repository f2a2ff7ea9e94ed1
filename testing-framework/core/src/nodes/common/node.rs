use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    time::Duration,
};

use tempfile::TempDir;
use tokio::time;
use tracing::{debug, info, warn};

use super::{
    config::{
        injection::{
            apply_genesis_overrides, inject_addresses, inject_boot_node,
            inject_cold_store_defaults, merge_overrides, rewrite_json_file,
        },
        paths::{CONFIG_FILE, GENESIS_FILE, node_home, stderr_path, stdout_path},
    },
    lifecycle::kill::kill_child,
};
use crate::{
    IS_DEBUG_TRACING,
    nodes::{ApiClient, ApiClientError, create_tempdir, persist_tempdir},
    topology::{config::GenesisOverride, generation::GeneratedNodeConfig},
};

const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum SpawnNodeError {
    #[error("failed to create node tempdir")]
    TempDir {
        #[source]
        source: io::Error,
    },
    #[error("failed to move node home from {from} to {to}")]
    MoveHome {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write node config at {path}")]
    WriteConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open node log file {path}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn node process '{binary}'")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to build rpc client for {name}")]
    Client {
        name: String,
        #[source]
        source: ApiClientError,
    },
    #[error("{name} exited during startup with {status}")]
    ExitedEarly { name: String, status: ExitStatus },
    #[error("{name} did not answer status within {timeout:?}")]
    Readiness { name: String, timeout: Duration },
}

/// Shared handle for spawned nodes that exposes common operations.
pub struct NodeHandle {
    pub(crate) child: Child,
    pub(crate) tempdir: TempDir,
    pub(crate) descriptor: GeneratedNodeConfig,
    pub(crate) api: ApiClient,
    pub(crate) keep_home: bool,
}

impl NodeHandle {
    pub fn new(
        child: Child,
        tempdir: TempDir,
        descriptor: GeneratedNodeConfig,
        api: ApiClient,
        keep_home: bool,
    ) -> Self {
        Self {
            child,
            tempdir,
            descriptor,
            api,
            keep_home,
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.descriptor.name()
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn descriptor(&self) -> &GeneratedNodeConfig {
        &self.descriptor
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

/// A node home directory that is configured but not yet running.
pub struct PreparedNode {
    pub tempdir: TempDir,
    pub descriptor: GeneratedNodeConfig,
}

impl PreparedNode {
    #[must_use]
    pub fn home(&self) -> PathBuf {
        node_home(self.tempdir.path())
    }
}

/// Move the node's home out of the `localnet` staging dir into its own
/// tempdir and apply genesis overrides, client overrides, addresses and
/// cold-store defaults.
pub fn prepare_node_home(
    staging_root: &Path,
    descriptor: &GeneratedNodeConfig,
    genesis_overrides: &[GenesisOverride],
    boot_node: Option<&str>,
) -> Result<PreparedNode, SpawnNodeError> {
    let tempdir = create_tempdir().map_err(|source| SpawnNodeError::TempDir { source })?;
    let from = staging_root.join(descriptor.name());
    let home = node_home(tempdir.path());

    debug!(
        node = %descriptor.name(),
        from = %from.display(),
        home = %home.display(),
        "preparing node home"
    );

    fs::rename(&from, &home).map_err(|source| SpawnNodeError::MoveHome {
        from: from.clone(),
        to: home.clone(),
        source,
    })?;

    let genesis_path = home.join(GENESIS_FILE);
    rewrite_json_file(&genesis_path, |genesis| {
        apply_genesis_overrides(genesis, genesis_overrides);
    })
    .map_err(|source| SpawnNodeError::WriteConfig {
        path: genesis_path.clone(),
        source,
    })?;

    let config_path = home.join(CONFIG_FILE);
    rewrite_json_file(&config_path, |config| {
        merge_overrides(config, &descriptor.client_overrides);
        inject_addresses(config, descriptor.rpc_addr(), descriptor.network_addr());
        if let Some(boot_node) = boot_node {
            inject_boot_node(config, boot_node);
        }
        inject_cold_store_defaults(config);
    })
    .map_err(|source| SpawnNodeError::WriteConfig {
        path: config_path.clone(),
        source,
    })?;

    debug!(
        node = %descriptor.name(),
        rpc = %descriptor.rpc_addr(),
        archival = descriptor.archival,
        "node config written"
    );

    Ok(PreparedNode {
        tempdir,
        descriptor: descriptor.clone(),
    })
}

/// Spawn `neard run` for a prepared home and wait until its RPC answers
/// `status`.
pub async fn spawn_node(
    prepared: PreparedNode,
    binary_path: &Path,
    startup_timeout: Duration,
    keep_home: bool,
) -> Result<NodeHandle, SpawnNodeError> {
    let home = prepared.home();
    let name = prepared.descriptor.name();
    let api = ApiClient::new(prepared.descriptor.rpc_addr()).map_err(|source| {
        SpawnNodeError::Client {
            name: name.clone(),
            source,
        }
    })?;
    let (stdout, stderr) = node_output(&home)?;

    debug!(node = %name, binary = %binary_path.display(), "spawning node process");

    let child = Command::new(binary_path)
        .arg("--home")
        .arg(&home)
        .arg("run")
        .current_dir(&home)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|source| SpawnNodeError::Spawn {
            binary: binary_path.to_path_buf(),
            source,
        })?;

    let mut handle = NodeHandle::new(child, prepared.tempdir, prepared.descriptor, api, keep_home);

    if let Err(err) = wait_for_status(&mut handle, startup_timeout).await {
        kill_child(&mut handle.child);
        // Persist tempdir to aid debugging if readiness fails.
        if let Err(persist_err) = persist_tempdir(&mut handle.tempdir, &name) {
            warn!(node = %name, error = %persist_err, "failed to persist node home");
        }
        return Err(err);
    }

    info!(node = %name, pid = handle.pid(), "node readiness confirmed via status");
    Ok(handle)
}

async fn wait_for_status(
    handle: &mut NodeHandle,
    startup_timeout: Duration,
) -> Result<(), SpawnNodeError> {
    let name = handle.name();
    let ready = time::timeout(startup_timeout, async {
        loop {
            if let Ok(Some(status)) = handle.child.try_wait() {
                return Err(SpawnNodeError::ExitedEarly {
                    name: name.clone(),
                    status,
                });
            }
            if handle.api.status().await.is_ok() {
                return Ok(());
            }
            time::sleep(STARTUP_POLL_INTERVAL).await;
        }
    })
    .await;

    match ready {
        Ok(result) => result,
        Err(_) => Err(SpawnNodeError::Readiness {
            name,
            timeout: startup_timeout,
        }),
    }
}

fn node_output(home: &Path) -> Result<(Stdio, Stdio), SpawnNodeError> {
    if *IS_DEBUG_TRACING {
        return Ok((Stdio::inherit(), Stdio::inherit()));
    }
    let open = |path: PathBuf| {
        File::create(&path)
            .map(Stdio::from)
            .map_err(|source| SpawnNodeError::LogFile { path, source })
    };
    Ok((open(stdout_path(home))?, open(stderr_path(home))?))
}
