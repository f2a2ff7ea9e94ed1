use std::{process, time::Duration};

use anyhow::{Context as _, Result};
use cluster_harness_core::{adjust_timeout, load_config};
use cluster_harness_env as tf_env;
use cluster_harness_runner_local::LocalDeployer;
use sanity_scenarios::{ColdStoreScenario, ScenarioConfig, cold_store::DEFAULT_SCENARIO_TIMEOUT};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    sanity_scenarios::defaults::init_tracing();

    if let Err(err) = run().await {
        warn!("cold store sanity check failed: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let base = load_config().context("loading base cluster config failed")?;
    let timeout = tf_env::cold_store_timeout_secs()
        .map_or(DEFAULT_SCENARIO_TIMEOUT, Duration::from_secs);
    let config = ScenarioConfig::new(base).with_timeout(adjust_timeout(timeout));

    info!(
        timeout_secs = config.timeout.as_secs_f32(),
        threshold = config.height_threshold,
        "starting cold store sanity check"
    );

    let report = match ColdStoreScenario::new(config).run(&LocalDeployer::new()).await {
        Ok(report) => report,
        Err(err) => {
            let phase = err.phase();
            return Err(err).with_context(|| format!("cold store scenario failed in {phase} phase"));
        }
    };

    info!(
        height = report.observation.height,
        hash = %report.observation.hash,
        elapsed_ms = report.elapsed.as_millis(),
        termination = ?report.termination,
        "cold store sanity check passed"
    );
    Ok(())
}
