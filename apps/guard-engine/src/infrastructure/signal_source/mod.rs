//! Signal Source Adapters
//!
//! Implementations of `SignalSourcePort`.

pub mod file;
pub mod scripted;

pub use file::FileSignalSource;
pub use scripted::{ScriptedRead, ScriptedSignalSource};
