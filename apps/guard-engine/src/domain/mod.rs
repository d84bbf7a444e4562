//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure dependencies.
//! Every operation here is synchronous and takes the current time as an explicit
//! argument, so the same inputs always give the same outputs.
//!
//! # Bounded Contexts
//!
//! - [`signal`]: Sensor readings normalized into per-chart signals
//! - [`account`]: Account ledger (balances, P&L, high-water mark, open contracts)
//! - [`compliance`]: Prop-firm rule sets and the violation checker
//! - [`lockout`]: ACTIVE / LOCKED_OUT state machine
//! - [`decision`]: STOP / CAUTION / GO recommendation and sizing
//! - [`system`]: System-wide margin and health aggregate

pub mod account;
pub mod compliance;
pub mod decision;
pub mod lockout;
pub mod shared;
pub mod signal;
pub mod system;
