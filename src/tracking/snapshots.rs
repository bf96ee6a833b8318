use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::{Candidate, StrategyId};

/// One candidate as it looked when it entered the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub symbol: String,
    pub name: String,
    pub strategy: StrategyId,
    pub score: Option<u8>,
    pub price: f64,
    pub change_1h: f64,
    pub change_24h: f64,
    pub volume_24h: f64,
    pub market_cap: f64,
    pub early_riser: bool,
    pub trade_url: Option<String>,
    pub contract_address: Option<String>,
    pub seen_at: DateTime<Utc>,
}

impl SnapshotEntry {
    fn from_candidate(c: &Candidate, seen_at: DateTime<Utc>) -> Self {
        let s = &c.snapshot;
        Self {
            symbol: s.symbol.clone(),
            name: s.name.clone(),
            strategy: c.strategy,
            score: c.score(),
            price: s.price,
            change_1h: s.change_1h,
            change_24h: s.change_24h,
            volume_24h: s.volume_24h,
            market_cap: s.market_cap,
            early_riser: c.early_riser,
            trade_url: s.trade_url.clone(),
            contract_address: s.contract_address.clone(),
            seen_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    pub timestamp: DateTime<Utc>,
    pub candidates: Vec<SnapshotEntry>,
}

/// What `SnapshotLog::record` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotRecord {
    Created(usize),
    /// New symbols merged into a recent snapshot
    Merged(usize),
    Skipped,
}

/// Recent merged candidate sets, oldest first
#[derive(Debug, Clone)]
pub struct SnapshotLog {
    snapshots: Vec<CandidateSnapshot>,
    merge_window: Duration,
    retention: Duration,
}

impl SnapshotLog {
    pub fn new(merge_window: Duration, retention: Duration) -> Self {
        Self {
            snapshots: Vec::new(),
            merge_window,
            retention,
        }
    }

    /// Append the cycle's candidates, merging into a snapshot younger than
    /// the merge window when there is one. Empty cycles leave the log as is.
    pub fn record(&mut self, candidates: &[Candidate], now: DateTime<Utc>) -> SnapshotRecord {
        if candidates.is_empty() {
            return SnapshotRecord::Skipped;
        }

        let window = self.merge_window;
        if let Some(recent) = self
            .snapshots
            .iter_mut()
            .find(|s| now - s.timestamp < window)
        {
            let known: HashSet<String> = recent.candidates.iter().map(|e| e.symbol.clone()).collect();
            let mut added = 0;
            for c in candidates.iter().filter(|c| !known.contains(c.symbol())) {
                recent.candidates.push(SnapshotEntry::from_candidate(c, now));
                added += 1;
            }
            return SnapshotRecord::Merged(added);
        }

        self.snapshots.push(CandidateSnapshot {
            timestamp: now,
            candidates: candidates
                .iter()
                .map(|c| SnapshotEntry::from_candidate(c, now))
                .collect(),
        });
        SnapshotRecord::Created(candidates.len())
    }

    /// Drop snapshots older than the retention window
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.timestamp > cutoff);
        before - self.snapshots.len()
    }

    pub fn latest(&self) -> Option<&CandidateSnapshot> {
        self.snapshots.last()
    }

    /// Snapshots restricted to entries seen within `ttl`, newest entries first.
    /// Snapshots left empty are omitted.
    pub fn active(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<CandidateSnapshot> {
        self.snapshots
            .iter()
            .filter_map(|s| {
                let mut entries: Vec<SnapshotEntry> = s
                    .candidates
                    .iter()
                    .filter(|e| now - e.seen_at <= ttl)
                    .cloned()
                    .collect();
                if entries.is_empty() {
                    return None;
                }
                entries.sort_by(|a, b| b.seen_at.cmp(&a.seen_at));
                Some(CandidateSnapshot {
                    timestamp: s.timestamp,
                    candidates: entries,
                })
            })
            .collect()
    }

    pub fn all(&self) -> &[CandidateSnapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn restore(&mut self, snapshots: Vec<CandidateSnapshot>) {
        self.snapshots = snapshots;
    }
}
