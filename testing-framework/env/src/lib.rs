use std::{env, path::PathBuf};

#[must_use]
pub fn slow_test_env() -> bool {
    env::var("SLOW_TEST_ENV").is_ok_and(|s| s == "true")
}

#[must_use]
pub fn debug_tracing() -> bool {
    env::var("NEAR_TESTS_TRACING").is_ok_and(|val| val.eq_ignore_ascii_case("true"))
}

/// Explicit path to the `neard` binary, overriding every other lookup.
#[must_use]
pub fn neard_bin() -> Option<PathBuf> {
    env::var_os("NEARD_BIN").map(PathBuf::from)
}

/// Path of the YAML/JSON file holding the base cluster config.
#[must_use]
pub fn near_tests_config() -> Option<PathBuf> {
    env::var_os("NEAR_TESTS_CONFIG").map(PathBuf::from)
}

#[must_use]
pub fn near_tests_keep_logs() -> bool {
    env::var("NEAR_TESTS_KEEP_LOGS").is_ok()
}

#[must_use]
pub fn cold_store_timeout_secs() -> Option<u64> {
    env::var("COLD_STORE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
}
