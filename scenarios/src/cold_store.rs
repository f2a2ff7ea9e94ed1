//! Archival cold-store sanity run: start one archival validator, wait for
//! it to produce blocks past a height threshold, then stop it gently.

use std::{fmt, panic::AssertUnwindSafe, time::Duration};

use cluster_harness_core::{
    BaseConfig,
    constants::{DEFAULT_MAX_CONSECUTIVE_QUERY_FAILURES, DEFAULT_POLL_INTERVAL},
    nodes::types::SplitStorageInfo,
    scenario::{
        ClusterBootstrapper, DynError, NodeControl, Observation, PollError, PollOptions,
        TerminationMode, TerminationOutcome, poll_until,
    },
    topology::config::{ClusterConfig, TopologySpec},
};
use futures::FutureExt as _;
use serde_json::json;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Blocks the archival node must produce before the run counts as healthy.
pub const DEFAULT_HEIGHT_THRESHOLD: u64 = 20;
/// Window for reaching [`DEFAULT_HEIGHT_THRESHOLD`].
pub const DEFAULT_SCENARIO_TIMEOUT: Duration = Duration::from_secs(20);

const ARCHIVAL_NODE: usize = 0;
const EXPECTED_NODES: usize = 1;

#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    pub base: BaseConfig,
    pub timeout: Duration,
    /// The run succeeds on the first height strictly greater than this.
    pub height_threshold: u64,
    pub poll_interval: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::new(BaseConfig::default())
    }
}

impl ScenarioConfig {
    #[must_use]
    pub fn new(base: BaseConfig) -> Self {
        Self {
            base,
            timeout: DEFAULT_SCENARIO_TIMEOUT,
            height_threshold: DEFAULT_HEIGHT_THRESHOLD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_QUERY_FAILURES,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_height_threshold(mut self, height: u64) -> Self {
        self.height_threshold = height;
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = failures;
        self
    }

    const fn poll_options(&self) -> PollOptions {
        PollOptions {
            timeout: self.timeout,
            interval: self.poll_interval,
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }
}

/// Progress of a run. Every failure is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioPhase {
    Init,
    ClusterStarted,
    Polling,
    ThresholdReached,
    Shutdown,
}

impl fmt::Display for ScenarioPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::ClusterStarted => "cluster-started",
            Self::Polling => "polling",
            Self::ThresholdReached => "threshold-reached",
            Self::Shutdown => "shutdown",
        })
    }
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("cluster bootstrap failed")]
    Bootstrap {
        #[source]
        source: DynError,
    },
    #[error("expected {expected} node handle(s) from the bootstrapper, got {actual}")]
    TopologyMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error("graceful shutdown of {node} failed")]
    Shutdown {
        node: String,
        #[source]
        source: DynError,
    },
}

impl ScenarioError {
    /// Phase the run was in when it failed.
    #[must_use]
    pub const fn phase(&self) -> ScenarioPhase {
        match self {
            Self::Bootstrap { .. } => ScenarioPhase::Init,
            Self::TopologyMismatch { .. } => ScenarioPhase::ClusterStarted,
            Self::Poll(_) => ScenarioPhase::Polling,
            Self::Shutdown { .. } => ScenarioPhase::ThresholdReached,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioReport {
    /// First observation past the threshold.
    pub observation: Observation,
    /// Time from the start of polling until the threshold was crossed.
    pub elapsed: Duration,
    /// `None` when the node could not report it.
    pub split_storage: Option<SplitStorageInfo>,
    pub termination: TerminationOutcome,
}

pub struct ColdStoreScenario {
    config: ScenarioConfig,
}

impl ColdStoreScenario {
    #[must_use]
    pub const fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// One validator, no non-validators, and that validator archival.
    #[must_use]
    pub const fn topology() -> TopologySpec {
        TopologySpec::single_archival()
    }

    #[must_use]
    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig::new(self.config.base.clone())
            .with_client_override(ARCHIVAL_NODE, json!({ "archive": true }))
    }

    pub async fn run<B>(&self, bootstrapper: &B) -> Result<ScenarioReport, ScenarioError>
    where
        B: ClusterBootstrapper + ?Sized,
    {
        let topology = Self::topology();
        let cluster = self.cluster_config();

        info!(
            phase = %ScenarioPhase::Init,
            validators = topology.validators,
            non_validators = topology.non_validators,
            archival = topology.archival,
            "starting cluster"
        );
        let nodes = bootstrapper
            .start_cluster(&topology, &cluster)
            .await
            .map_err(|source| ScenarioError::Bootstrap { source })?;

        let [mut node] = match <[B::Node; EXPECTED_NODES]>::try_from(nodes) {
            Ok(nodes) => nodes,
            Err(nodes) => return Err(reject_cluster(nodes).await),
        };
        info!(phase = %ScenarioPhase::ClusterStarted, node = %node.name(), "cluster started");

        info!(
            phase = %ScenarioPhase::Polling,
            threshold = self.config.height_threshold,
            timeout_secs = self.config.timeout.as_secs_f32(),
            "waiting for block height"
        );
        let started = Instant::now();
        let polled = match AssertUnwindSafe(self.wait_for_threshold(&node))
            .catch_unwind()
            .await
        {
            Ok(polled) => polled,
            Err(panic) => {
                warn!(node = %node.name(), "height polling panicked, stopping node");
                if let Err(err) = node.terminate(TerminationMode::Gentle).await {
                    warn!(node = %node.name(), error = %err, "failed to stop node");
                }
                std::panic::resume_unwind(panic);
            }
        };
        let elapsed = started.elapsed();

        let split_storage = match &polled {
            Ok(observation) => {
                info!(
                    phase = %ScenarioPhase::ThresholdReached,
                    height = observation.height,
                    hash = %observation.hash,
                    elapsed_ms = elapsed.as_millis(),
                    "height threshold reached"
                );
                report_split_storage(&node).await
            }
            Err(_) => None,
        };

        let terminated = node.terminate(TerminationMode::Gentle).await;

        match (polled, terminated) {
            (Ok(observation), Ok(termination)) => {
                info!(phase = %ScenarioPhase::Shutdown, ?termination, "scenario passed");
                Ok(ScenarioReport {
                    observation,
                    elapsed,
                    split_storage,
                    termination,
                })
            }
            (Ok(_), Err(source)) => Err(ScenarioError::Shutdown {
                node: node.name(),
                source,
            }),
            (Err(err), Ok(termination)) => {
                warn!(error = %err, ?termination, "polling failed, node stopped");
                Err(err.into())
            }
            (Err(err), Err(shutdown)) => {
                warn!(error = %shutdown, "graceful shutdown after failed polling also failed");
                Err(err.into())
            }
        }
    }

    async fn wait_for_threshold<N>(&self, node: &N) -> Result<Observation, PollError>
    where
        N: NodeControl + ?Sized,
    {
        let threshold = self.config.height_threshold;
        poll_until(node, self.config.poll_options(), |observation| {
            observation.height > threshold
        })
        .await
    }
}

/// Stop every handle of a cluster that came back with the wrong shape.
async fn reject_cluster<N: NodeControl>(mut nodes: Vec<N>) -> ScenarioError {
    let actual = nodes.len();
    warn!(expected = EXPECTED_NODES, actual, "unexpected node count, stopping cluster");

    for node in &mut nodes {
        if let Err(err) = node.terminate(TerminationMode::Gentle).await {
            warn!(node = %node.name(), error = %err, "failed to stop node");
        }
    }

    ScenarioError::TopologyMismatch {
        expected: EXPECTED_NODES,
        actual,
    }
}

async fn report_split_storage<N>(node: &N) -> Option<SplitStorageInfo>
where
    N: NodeControl + ?Sized,
{
    match node.split_storage_info().await {
        Ok(info) => {
            info!(
                node = %node.name(),
                head_height = ?info.head_height,
                final_head_height = ?info.final_head_height,
                cold_head_height = ?info.cold_head_height,
                hot_db_kind = ?info.hot_db_kind,
                "split storage info"
            );
            Some(info)
        }
        Err(err) => {
            warn!(node = %node.name(), error = %err, "split storage info unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use cluster_harness_core::{nodes::types::CryptoHash, scenario::HeightSource};
    use futures::FutureExt as _;

    use super::*;

    #[derive(Clone, Copy)]
    enum Chain {
        /// Height grows by one per query, starting here.
        Producing(u64),
        Stuck(u64),
        Unreachable,
        Panicking,
    }

    #[derive(Default)]
    struct Recorder {
        queries: AtomicUsize,
        split_storage_queries: AtomicUsize,
        terminations: Mutex<Vec<TerminationMode>>,
    }

    impl Recorder {
        fn terminations(&self) -> Vec<TerminationMode> {
            self.terminations.lock().expect("terminations lock").clone()
        }
    }

    struct MockNode {
        name: String,
        chain: Chain,
        next: AtomicU64,
        split_storage: bool,
        shutdown_fails: bool,
        stopped: bool,
        recorder: Arc<Recorder>,
    }

    #[async_trait]
    impl HeightSource for MockNode {
        async fn current_height_and_hash(&self) -> Result<Observation, DynError> {
            self.recorder.queries.fetch_add(1, Ordering::SeqCst);
            let height = match self.chain {
                Chain::Producing(_) => self.next.fetch_add(1, Ordering::SeqCst),
                Chain::Stuck(height) => height,
                Chain::Unreachable => return Err("connection refused".into()),
                Chain::Panicking => panic!("status decoder bug"),
            };
            Ok(Observation {
                height,
                hash: CryptoHash([height as u8; 32]),
            })
        }
    }

    #[async_trait]
    impl NodeControl for MockNode {
        fn name(&self) -> String {
            self.name.clone()
        }

        async fn split_storage_info(&self) -> Result<SplitStorageInfo, DynError> {
            self.recorder.split_storage_queries.fetch_add(1, Ordering::SeqCst);
            if !self.split_storage {
                return Err("method not found".into());
            }
            Ok(SplitStorageInfo {
                head_height: Some(21),
                final_head_height: Some(19),
                cold_head_height: Some(19),
                hot_db_kind: Some("Hot".to_owned()),
            })
        }

        async fn terminate(
            &mut self,
            mode: TerminationMode,
        ) -> Result<TerminationOutcome, DynError> {
            self.recorder
                .terminations
                .lock()
                .expect("terminations lock")
                .push(mode);
            if self.shutdown_fails {
                return Err("signal refused".into());
            }
            if self.stopped {
                return Ok(TerminationOutcome::AlreadyStopped);
            }
            self.stopped = true;
            Ok(TerminationOutcome::Stopped { forced: false })
        }
    }

    struct MockBootstrapper {
        handles: usize,
        chain: Chain,
        split_storage: bool,
        shutdown_fails: bool,
        fails: bool,
        recorder: Arc<Recorder>,
        requests: Mutex<Vec<(TopologySpec, ClusterConfig)>>,
    }

    impl MockBootstrapper {
        fn new(chain: Chain) -> Self {
            Self {
                handles: 1,
                chain,
                split_storage: true,
                shutdown_fails: false,
                fails: false,
                recorder: Arc::default(),
                requests: Mutex::default(),
            }
        }

        fn with_handles(mut self, handles: usize) -> Self {
            self.handles = handles;
            self
        }

        fn queries(&self) -> usize {
            self.recorder.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClusterBootstrapper for MockBootstrapper {
        type Node = MockNode;

        async fn start_cluster(
            &self,
            topology: &TopologySpec,
            config: &ClusterConfig,
        ) -> Result<Vec<MockNode>, DynError> {
            self.requests
                .lock()
                .expect("requests lock")
                .push((*topology, config.clone()));
            if self.fails {
                return Err("neard localnet exited with status 1".into());
            }
            let start = match self.chain {
                Chain::Producing(height) => height,
                Chain::Stuck(_) | Chain::Unreachable | Chain::Panicking => 0,
            };
            Ok((0..self.handles)
                .map(|index| MockNode {
                    name: format!("node{index}"),
                    chain: self.chain,
                    next: AtomicU64::new(start),
                    split_storage: self.split_storage,
                    shutdown_fails: self.shutdown_fails,
                    stopped: false,
                    recorder: Arc::clone(&self.recorder),
                })
                .collect())
        }
    }

    fn scenario() -> ColdStoreScenario {
        ColdStoreScenario::new(ScenarioConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn passes_once_height_exceeds_threshold() {
        let bootstrapper = MockBootstrapper::new(Chain::Producing(1));

        let report = scenario().run(&bootstrapper).await.expect("scenario passes");

        assert_eq!(report.observation.height, 21);
        assert_eq!(report.elapsed, Duration::from_secs(5));
        assert_eq!(report.termination, TerminationOutcome::Stopped { forced: false });
        assert_eq!(
            report.split_storage.and_then(|info| info.cold_head_height),
            Some(19)
        );
        assert_eq!(bootstrapper.recorder.terminations(), [TerminationMode::Gentle]);
        assert_eq!(bootstrapper.recorder.split_storage_queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_single_archival_validator() {
        let bootstrapper = MockBootstrapper::new(Chain::Producing(1));

        scenario().run(&bootstrapper).await.expect("scenario passes");

        let requests = bootstrapper.requests.lock().expect("requests lock");
        assert_eq!(requests.len(), 1);
        let (topology, config) = &requests[0];
        assert_eq!(*topology, TopologySpec::new(1, 0, 1));
        assert_eq!(config.client_overrides.len(), 1);
        assert_eq!(config.client_overrides[&0], json!({"archive": true}));
        assert!(config.genesis_overrides.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_chain_times_out_and_still_stops_node() {
        let bootstrapper = MockBootstrapper::new(Chain::Stuck(5));
        let started = Instant::now();

        let err = scenario().run(&bootstrapper).await.unwrap_err();

        assert!(matches!(
            err,
            ScenarioError::Poll(PollError::TimeoutExceeded {
                last_height: Some(5),
                ..
            })
        ));
        assert_eq!(err.phase(), ScenarioPhase::Polling);
        assert!(started.elapsed() >= DEFAULT_SCENARIO_TIMEOUT);
        assert_eq!(bootstrapper.recorder.terminations(), [TerminationMode::Gentle]);
        assert_eq!(bootstrapper.recorder.split_storage_queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exactly_at_threshold_is_not_enough() {
        let bootstrapper = MockBootstrapper::new(Chain::Stuck(DEFAULT_HEIGHT_THRESHOLD));

        let err = scenario().run(&bootstrapper).await.unwrap_err();

        assert!(matches!(err, ScenarioError::Poll(PollError::TimeoutExceeded { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_cluster_is_a_topology_mismatch() {
        let bootstrapper = MockBootstrapper::new(Chain::Producing(1)).with_handles(0);

        let err = scenario().run(&bootstrapper).await.unwrap_err();

        assert!(matches!(
            err,
            ScenarioError::TopologyMismatch {
                expected: 1,
                actual: 0
            }
        ));
        assert_eq!(err.phase(), ScenarioPhase::ClusterStarted);
        assert_eq!(bootstrapper.queries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn extra_handles_are_stopped_without_polling() {
        let bootstrapper = MockBootstrapper::new(Chain::Producing(1)).with_handles(2);

        let err = scenario().run(&bootstrapper).await.unwrap_err();

        assert!(matches!(
            err,
            ScenarioError::TopologyMismatch {
                expected: 1,
                actual: 2
            }
        ));
        assert_eq!(bootstrapper.queries(), 0);
        assert_eq!(
            bootstrapper.recorder.terminations(),
            [TerminationMode::Gentle, TerminationMode::Gentle]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_failure_is_reported() {
        let mut bootstrapper = MockBootstrapper::new(Chain::Producing(1));
        bootstrapper.fails = true;

        let err = scenario().run(&bootstrapper).await.unwrap_err();

        assert!(matches!(err, ScenarioError::Bootstrap { .. }));
        assert_eq!(err.phase(), ScenarioPhase::Init);
        assert_eq!(err.to_string(), "cluster bootstrap failed");
        let cause = std::error::Error::source(&err).expect("bootstrap cause");
        assert_eq!(cause.to_string(), "neard localnet exited with status 1");
        assert_eq!(bootstrapper.queries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_node_escalates_to_query_failure() {
        let bootstrapper = MockBootstrapper::new(Chain::Unreachable);
        let scenario =
            ColdStoreScenario::new(ScenarioConfig::default().with_max_consecutive_failures(3));

        let err = scenario.run(&bootstrapper).await.unwrap_err();

        assert!(matches!(
            err,
            ScenarioError::Poll(PollError::QueryFailure { attempts: 4, .. })
        ));
        assert_eq!(bootstrapper.queries(), 4);
        assert_eq!(bootstrapper.recorder.terminations(), [TerminationMode::Gentle]);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_height_query_still_stops_node_gently() {
        let bootstrapper = MockBootstrapper::new(Chain::Panicking);

        let outcome = AssertUnwindSafe(scenario().run(&bootstrapper))
            .catch_unwind()
            .await;

        assert!(outcome.is_err(), "panic is propagated to the caller");
        assert_eq!(bootstrapper.recorder.terminations(), [TerminationMode::Gentle]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_split_storage_info_is_not_fatal() {
        let mut bootstrapper = MockBootstrapper::new(Chain::Producing(1));
        bootstrapper.split_storage = false;

        let report = scenario().run(&bootstrapper).await.expect("scenario passes");

        assert_eq!(report.split_storage, None);
        assert_eq!(bootstrapper.recorder.split_storage_queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_shutdown_after_success_is_an_error() {
        let mut bootstrapper = MockBootstrapper::new(Chain::Producing(1));
        bootstrapper.shutdown_fails = true;

        let err = scenario().run(&bootstrapper).await.unwrap_err();

        assert!(matches!(err, ScenarioError::Shutdown { ref node, .. } if node == "node0"));
        assert_eq!(err.phase(), ScenarioPhase::ThresholdReached);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_error_wins_over_shutdown_error() {
        let mut bootstrapper = MockBootstrapper::new(Chain::Stuck(5));
        bootstrapper.shutdown_fails = true;

        let err = scenario().run(&bootstrapper).await.unwrap_err();

        assert!(matches!(err, ScenarioError::Poll(PollError::TimeoutExceeded { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_threshold_and_timeout_are_honoured() {
        let bootstrapper = MockBootstrapper::new(Chain::Producing(1));
        let scenario = ColdStoreScenario::new(
            ScenarioConfig::default()
                .with_height_threshold(3)
                .with_timeout(Duration::from_secs(2))
                .with_poll_interval(Duration::from_millis(100)),
        );

        let report = scenario.run(&bootstrapper).await.expect("scenario passes");

        assert_eq!(report.observation.height, 4);
        assert_eq!(report.elapsed, Duration::from_millis(300));
    }
}
