//! Decision Bounded Context
//!
//! STOP / CAUTION / GO recommendations and contract sizing.

pub mod decision;
pub mod engine;
pub mod probability;
pub mod sizing;
pub mod thresholds;

pub use decision::{Decision, DecisionState};
pub use engine::{DecisionContext, DecisionEngine};
pub use probability::{ConfluenceProbabilityModel, ProbabilityModel};
pub use sizing::risk_scaled_contracts;
pub use thresholds::DecisionThresholds;
