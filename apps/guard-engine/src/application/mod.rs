//! Application Layer
//!
//! The application layer runs the domain on a schedule. It defines:
//!
//! - **Ports**: Interfaces for the sensor, the fill feed and audit persistence
//! - **Services**: Chart workers, the account registry, the aggregator and the engine facade
//! - **Events**: What the engine publishes to external observers

pub mod events;
pub mod ports;
pub mod services;

pub use events::{EngineEvent, SystemWarning};
pub use ports::*;
pub use services::*;
