use std::{ops::Deref, path::Path, time::Duration};

use async_trait::async_trait;
use tracing::{debug, info};

use super::{persist_tempdir, should_persist_tempdir};
use crate::{
    constants::GRACEFUL_SHUTDOWN_TIMEOUT,
    nodes::{
        common::{
            lifecycle::kill::{TerminationMode, TerminationOutcome, kill_child, terminate_child},
            node::{NodeHandle, PreparedNode, SpawnNodeError, spawn_node},
        },
        types::SplitStorageInfo,
    },
    scenario::{DynError, HeightSource, NodeControl, Observation},
};

/// A running local `neard` process.
pub struct Node {
    handle: NodeHandle,
}

impl Deref for Node {
    type Target = NodeHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let name = self.handle.name();
        if should_persist_tempdir(self.handle.keep_home)
            && let Err(e) = persist_tempdir(&mut self.handle.tempdir, &name)
        {
            debug!(error = ?e, "failed to persist node tempdir");
        }

        debug!(node = %name, "stopping node process");
        kill_child(&mut self.handle.child);
    }
}

impl Node {
    pub async fn spawn(
        prepared: PreparedNode,
        binary_path: &Path,
        startup_timeout: Duration,
        keep_home: bool,
    ) -> Result<Self, SpawnNodeError> {
        let handle = spawn_node(prepared, binary_path, startup_timeout, keep_home).await?;

        info!(
            node = %handle.name(),
            role = handle.descriptor().role.label(),
            archival = handle.descriptor().archival,
            "node spawned and ready"
        );

        Ok(Self { handle })
    }

    /// Stop the node, waiting at most `grace_period` after SIGINT in gentle
    /// mode.
    pub async fn terminate_with_grace(
        &mut self,
        mode: TerminationMode,
        grace_period: Duration,
    ) -> Result<TerminationOutcome, DynError> {
        let name = self.handle.name();
        let outcome = terminate_child(&mut self.handle.child, mode, grace_period).await?;
        info!(node = %name, ?mode, ?outcome, "node terminated");
        Ok(outcome)
    }
}

#[async_trait]
impl HeightSource for Node {
    async fn current_height_and_hash(&self) -> Result<Observation, DynError> {
        let status = self.handle.api().status().await?;
        Ok(Observation {
            height: status.sync_info.latest_block_height,
            hash: status.sync_info.latest_block_hash,
        })
    }
}

#[async_trait]
impl NodeControl for Node {
    fn name(&self) -> String {
        self.handle.name()
    }

    async fn split_storage_info(&self) -> Result<SplitStorageInfo, DynError> {
        Ok(self.handle.api().split_storage_info().await?)
    }

    async fn terminate(&mut self, mode: TerminationMode) -> Result<TerminationOutcome, DynError> {
        self.terminate_with_grace(mode, GRACEFUL_SHUTDOWN_TIMEOUT).await
    }
}
