//! Signal Bounded Context
//!
//! Normalizes raw screen-sensor readings (power score, confluence level,
//! direction color) into immutable per-chart signals.

pub mod errors;
pub mod signal;
pub mod value_objects;

pub use errors::SignalError;
pub use signal::{RawSignal, Signal};
pub use value_objects::{ConfluenceLevel, DirectionColor, PowerScore};
