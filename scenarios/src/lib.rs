pub mod cold_store;
pub mod defaults;

pub use cold_store::{
    ColdStoreScenario, ScenarioConfig, ScenarioError, ScenarioPhase, ScenarioReport,
};
