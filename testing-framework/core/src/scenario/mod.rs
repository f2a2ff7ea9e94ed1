//! Scenario-facing seams: the traits a bootstrapper and its nodes implement,
//! and the bounded block poller built on top of them.

mod control;
mod poll;

pub use control::{ClusterBootstrapper, HeightSource, NodeControl};
pub use poll::{BlockPoller, Observation, PollError, PollOptions, poll_until};

pub use crate::nodes::common::lifecycle::kill::{TerminationMode, TerminationOutcome};

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;
