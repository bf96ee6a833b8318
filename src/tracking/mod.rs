pub mod snapshots;
pub mod tracker;

pub use snapshots::{CandidateSnapshot, SnapshotEntry, SnapshotLog, SnapshotRecord};
pub use tracker::{PersistenceTracker, TrackEvent};
