//! Infrastructure Layer
//!
//! Adapters implementing the application ports:
//!
//! - `persistence/`: violation log and lockout store (in-memory, JSON files)
//! - `signal_source/`: sensor file drop and scripted sources
//! - `execution_feed`: channel-backed fill/P&L feed

pub mod execution_feed;
pub mod persistence;
pub mod signal_source;

pub use execution_feed::ChannelExecutionFeed;
pub use persistence::{
    InMemoryLockoutStore, InMemoryViolationLog, JsonLockoutStore, JsonlViolationLog,
};
pub use signal_source::{FileSignalSource, ScriptedRead, ScriptedSignalSource};
