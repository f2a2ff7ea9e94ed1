use std::time::Duration;

use futures::{Stream, stream};
use thiserror::Error;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::{
    constants::{DEFAULT_MAX_CONSECUTIVE_QUERY_FAILURES, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT},
    nodes::types::CryptoHash,
    scenario::{DynError, HeightSource},
};

/// Upper bound for deadlines so absurd timeouts do not overflow `Instant`.
const MAX_POLL_WINDOW: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// One chain head sample taken from a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Observation {
    pub height: u64,
    pub hash: CryptoHash,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollOptions {
    /// Wall-clock window, anchored when the poller is created.
    pub timeout: Duration,
    /// Delay between two queries.
    pub interval: Duration,
    /// Failed queries tolerated in a row; one more is fatal.
    pub max_consecutive_failures: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POLL_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_QUERY_FAILURES,
        }
    }
}

impl PollOptions {
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub const fn with_max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = failures;
        self
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error(
        "timed out after {timeout:?} waiting for block height (last observed height: {})",
        describe_height(.last_height)
    )]
    TimeoutExceeded {
        timeout: Duration,
        last_height: Option<u64>,
    },
    #[error("height query failed {attempts} times in a row")]
    QueryFailure {
        attempts: u32,
        #[source]
        source: DynError,
    },
}

fn describe_height(height: &Option<u64>) -> String {
    height.map_or_else(|| "none".to_owned(), |height| height.to_string())
}

/// Lazy, wall-clock bounded sequence of new chain heads from one source.
///
/// Each call to [`BlockPoller::next_block`] queries the source every
/// `interval` until it reports a height different from the last one
/// yielded. Query failures are retried up to `max_consecutive_failures`
/// times in a row. Once the window closes every call fails with
/// [`PollError::TimeoutExceeded`].
pub struct BlockPoller<'a, S: ?Sized> {
    source: &'a S,
    options: PollOptions,
    started: Instant,
    deadline: Instant,
    last_height: Option<u64>,
    consecutive_failures: u32,
    queried: bool,
}

impl<'a, S> BlockPoller<'a, S>
where
    S: HeightSource + ?Sized,
{
    pub fn new(source: &'a S, options: PollOptions) -> Self {
        let started = Instant::now();
        let deadline = started + options.timeout.min(MAX_POLL_WINDOW);
        Self {
            source,
            options,
            started,
            deadline,
            last_height: None,
            consecutive_failures: 0,
            queried: false,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    #[must_use]
    pub const fn last_height(&self) -> Option<u64> {
        self.last_height
    }

    /// Wait for the next block height not yielded before.
    pub async fn next_block(&mut self) -> Result<Observation, PollError> {
        loop {
            if self.queried {
                self.pace().await?;
            }
            self.queried = true;

            let remaining = self.deadline.saturating_duration_since(Instant::now());
            let Ok(result) = time::timeout(remaining, self.source.current_height_and_hash()).await
            else {
                return Err(self.timeout_error());
            };

            match result {
                Ok(observation) => {
                    self.consecutive_failures = 0;
                    if self.last_height == Some(observation.height) {
                        continue;
                    }
                    self.last_height = Some(observation.height);
                    debug!(
                        height = observation.height,
                        hash = %observation.hash,
                        elapsed_ms = self.elapsed().as_millis(),
                        "observed new block"
                    );
                    return Ok(observation);
                }
                Err(source) => {
                    self.consecutive_failures += 1;
                    if self.consecutive_failures > self.options.max_consecutive_failures {
                        warn!(
                            attempts = self.consecutive_failures,
                            error = %source,
                            "height query failed, giving up"
                        );
                        return Err(PollError::QueryFailure {
                            attempts: self.consecutive_failures,
                            source,
                        });
                    }
                    warn!(
                        attempt = self.consecutive_failures,
                        error = %source,
                        "height query failed, retrying"
                    );
                }
            }
        }
    }

    /// Turn the poller into a stream that ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Observation, PollError>> + 'a
    where
        S: 'a,
    {
        stream::unfold(Some(self), |state| async move {
            let mut poller = state?;
            match poller.next_block().await {
                Ok(observation) => Some((Ok(observation), Some(poller))),
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    async fn pace(&self) -> Result<(), PollError> {
        let now = Instant::now();
        if now >= self.deadline {
            return Err(self.timeout_error());
        }
        time::sleep(self.options.interval.min(self.deadline - now)).await;
        Ok(())
    }

    const fn timeout_error(&self) -> PollError {
        PollError::TimeoutExceeded {
            timeout: self.options.timeout,
            last_height: self.last_height,
        }
    }
}

/// Poll `source` until `predicate` accepts an observation, or the window
/// in `options` closes.
pub async fn poll_until<S, F>(
    source: &S,
    options: PollOptions,
    mut predicate: F,
) -> Result<Observation, PollError>
where
    S: HeightSource + ?Sized,
    F: FnMut(&Observation) -> bool,
{
    let mut poller = BlockPoller::new(source, options);
    loop {
        let observation = poller.next_block().await?;
        if predicate(&observation) {
            debug!(
                height = observation.height,
                elapsed_ms = poller.elapsed().as_millis(),
                "poll condition satisfied"
            );
            return Ok(observation);
        }
    }
}
