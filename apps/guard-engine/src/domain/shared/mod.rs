//! Shared Domain Types
//!
//! Value objects shared across bounded contexts, plus the trading calendar
//! every context reads session boundaries from.

pub mod calendar;
pub mod value_objects;

pub use calendar::{TradingCalendar, TradingHours};
pub use value_objects::{AccountId, ChartId, Money, RecordId, Timestamp};
