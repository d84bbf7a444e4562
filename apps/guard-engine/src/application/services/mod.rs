//! Application Services
//!
//! Long-running workers and the facade that ties them together.

mod aggregator;
mod audit;
mod chart_monitor;
mod context;
mod emergency;
mod engine;
mod registry;
mod settings;

pub use aggregator::Aggregator;
pub use audit::AuditRecorder;
pub use chart_monitor::{ChartConfig, ChartMonitor, MonitorTiming};
pub use context::EngineContext;
pub use emergency::EmergencyStop;
pub use engine::{AccountSetup, EngineSetup, EngineTiming, GuardEngine, GuardEngineBuilder};
pub use registry::{AccountRegistry, AccountState};
pub use settings::{RuntimeSettings, SettingsCell};
