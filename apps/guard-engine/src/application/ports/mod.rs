//! Application Ports (Driven)
//!
//! Ports define interfaces for the external collaborators the engine depends on.

mod audit_port;
mod execution_feed_port;
mod signal_source_port;

pub use audit_port::{LockoutStorePort, PersistenceError, ViolationLogPort, ViolationRecord};
pub use execution_feed_port::{ExecutionFeedPort, LedgerUpdate, NoopExecutionFeed};
pub use signal_source_port::{SignalSourceError, SignalSourcePort};
