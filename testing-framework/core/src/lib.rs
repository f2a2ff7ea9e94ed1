pub mod constants;
pub mod nodes;
pub mod scenario;
pub mod topology;

use std::{ops::Mul as _, sync::LazyLock, time::Duration};

use cluster_harness_env as tf_env;

pub use topology::configs::base::{BaseConfig, ConfigError, load_config};

/// When set, node processes inherit stdout/stderr instead of writing log
/// files into their home directory.
pub static IS_DEBUG_TRACING: LazyLock<bool> = LazyLock::new(tf_env::debug_tracing);

static IS_SLOW_TEST_ENV: LazyLock<bool> = LazyLock::new(tf_env::slow_test_env);

/// In slow test environments like Codecov, use 2x timeout.
#[must_use]
pub fn adjust_timeout(d: Duration) -> Duration {
    if *IS_SLOW_TEST_ENV { d.mul(2) } else { d }
}
