//! Lockout Bounded Context
//!
//! Per-account ACTIVE / LOCKED_OUT state machine driven by breach
//! violations, the trading calendar and the emergency stop.

pub mod state;
pub mod state_machine;

pub use state::{LockReason, LockoutState, LockoutStatus, LockoutTransition};
pub use state_machine::LockoutStateMachine;
