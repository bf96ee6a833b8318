//! Alert routing

pub mod alert_manager;

pub use alert_manager::{Alert, AlertKind, AlertLevel, AlertManager, AlertManagerConfig};
