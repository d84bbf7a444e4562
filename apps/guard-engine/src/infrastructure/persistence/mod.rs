//! Persistence Adapters
//!
//! Implementations of the violation log and lockout store ports.

pub mod in_memory;
pub mod json_file;

pub use in_memory::{InMemoryLockoutStore, InMemoryViolationLog};
pub use json_file::{JsonLockoutStore, JsonlViolationLog};
