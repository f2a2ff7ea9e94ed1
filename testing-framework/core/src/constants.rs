use std::time::Duration;

/// Host every local node binds its RPC and network listeners to.
pub const LOCAL_HOST: &str = "127.0.0.1";

/// Default delay between two height queries against the same node.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default wall-clock window for a block poller.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(120);

/// Consecutive failed height queries tolerated before polling gives up.
pub const DEFAULT_MAX_CONSECUTIVE_QUERY_FAILURES: u32 = 8;

/// Default time a node gets to answer its first `status` request.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Time a node gets to exit after SIGINT before it is killed.
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request timeout for node JSON-RPC calls.
pub const DEFAULT_RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix `neard localnet` uses for node home directories.
pub const NODE_DIR_PREFIX: &str = "node";
