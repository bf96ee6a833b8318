pub mod adapters;
pub mod cli;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod scanner;
pub mod strategy;
pub mod supervisor;
pub mod tracking;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use domain::{Candidate, InstrumentSnapshot, MarketState, PersistenceTrack, StrategyId};
pub use error::{RadarError, Result};
pub use persistence::{JsonFileStore, PersistedState, StateStore};
pub use scanner::{spawn_scanner, CycleReport, RadarView, ScanOrchestrator, ScannerHandle};
pub use supervisor::{Alert, AlertKind, AlertLevel, AlertManager};
pub use tracking::{PersistenceTracker, TrackEvent};
