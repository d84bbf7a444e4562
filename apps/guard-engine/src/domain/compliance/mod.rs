//! Compliance Bounded Context
//!
//! Prop-firm rule sets and the stateless engine that checks an account
//! snapshot and a candidate trade against them.

pub mod engine;
pub mod rule_set;
pub mod violation;

pub use engine::{ComplianceEngine, NewsEvent, TradeCandidate};
pub use rule_set::{AccountTier, PropFirm, RuleSet};
pub use violation::{ComplianceReport, Severity, Violation, ViolationKind};
