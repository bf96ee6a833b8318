//! Read-only view published after every cycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{PersistenceTrack, StrategyId};
use crate::strategy::PreIgnitionCandidate;
use crate::tracking::{CandidateSnapshot, SnapshotEntry};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_batch_size: usize,
    pub last_candidates: usize,
    pub alerts_sent: u64,
    pub last_error: Option<String>,
    pub running: bool,
    pub chain_filter: Option<String>,
}

/// Copy of the radar state for presentation layers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RadarView {
    /// Longest-running first
    pub tracks: Vec<PersistenceTrack>,
    pub latest_snapshot: Option<CandidateSnapshot>,
    /// Snapshot entries seen inside the active window, newest first
    pub active_entries: Vec<SnapshotEntry>,
    pub watch_list: Vec<PreIgnitionCandidate>,
    pub stats: ScanStats,
}

impl RadarView {
    pub fn tracks_for(&self, strategy: StrategyId) -> impl Iterator<Item = &PersistenceTrack> {
        self.tracks.iter().filter(move |t| t.strategy == strategy)
    }

    pub fn track(&self, symbol: &str) -> Option<&PersistenceTrack> {
        self.tracks.iter().find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }
}
