//! Scan scheduling and the operational surface

pub mod command;
pub mod orchestrator;
pub mod view;

pub use command::{spawn_scanner, ScannerCommand, ScannerHandle};
pub use orchestrator::{CycleReport, ScanOrchestrator};
pub use view::{RadarView, ScanStats};
