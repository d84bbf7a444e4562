//! Shared value objects.

mod identifiers;
mod money;
mod timestamp;

pub use identifiers::{AccountId, ChartId, RecordId};
pub use money::Money;
pub use timestamp::Timestamp;
