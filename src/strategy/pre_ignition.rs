//! Pre-ignition detection
//!
//! Looks only at symbols that have already been tracked for a few cycles, so
//! fresh momentum can be told apart from a move that happened yesterday. A
//! strict pass runs first; when it finds nothing, a relaxed fallback pass
//! runs and its results are flagged as reduced-confidence.
//!
//! The detector keeps the last cycle's watch-list. Symbols on it are
//! protected from TTL eviction, and a watched symbol whose 1h change crosses
//! the graduation threshold leaves the watch-list for good.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{PreIgnitionConfig, PreIgnitionGates};
use crate::domain::{
    Candidate, InstrumentSnapshot, PersistenceTrack, PressureReading, StrategyId, WhaleReport,
};
use crate::strategy::classifier::is_excluded;
use crate::strategy::pressure::detect_pressure_direction;

const NEUTRAL_EPSILON: f64 = 1e-9;

/// A scored pre-ignition candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreIgnitionCandidate {
    pub candidate: Candidate,
    pub pressure: PressureReading,
    /// Found by the relaxed fallback pass
    pub relaxed: bool,
    /// Passed the alert threshold and no alert was sent for this track yet
    pub should_alert: bool,
}

impl PreIgnitionCandidate {
    pub fn symbol(&self) -> &str {
        self.candidate.symbol()
    }

    pub fn score(&self) -> u8 {
        self.candidate.pre_ignition_score.unwrap_or(0)
    }
}

/// A watched symbol that broke out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graduation {
    pub symbol: String,
    pub change_1h: f64,
    pub last_score: u8,
}

#[derive(Debug, Clone, Default)]
pub struct PreIgnitionOutcome {
    pub candidates: Vec<PreIgnitionCandidate>,
    pub graduations: Vec<Graduation>,
    pub relaxed: bool,
}

#[derive(Debug, Clone)]
pub struct PreIgnitionDetector {
    config: PreIgnitionConfig,
    neutral_acceleration: f64,
    watch_list: Vec<PreIgnitionCandidate>,
}

impl PreIgnitionDetector {
    pub fn new(config: PreIgnitionConfig, neutral_acceleration: f64) -> Self {
        Self {
            config,
            neutral_acceleration,
            watch_list: Vec::new(),
        }
    }

    /// Current watch-list, best score first
    pub fn watch_list(&self) -> &[PreIgnitionCandidate] {
        &self.watch_list
    }

    pub fn is_protected(&self, symbol: &str) -> bool {
        self.watch_list.iter().any(|c| c.symbol() == symbol)
    }

    pub fn protected_symbols(&self) -> HashSet<String> {
        self.watch_list.iter().map(|c| c.symbol().to_string()).collect()
    }

    pub fn clear(&mut self) {
        self.watch_list.clear();
    }

    /// Loose screen used to decide which symbols get a whale lookup first
    pub fn whale_screen<'a>(&self, snapshots: &'a [InstrumentSnapshot]) -> Vec<&'a InstrumentSnapshot> {
        snapshots
            .iter()
            .filter(|s| !is_excluded(&s.symbol, &self.config.excluded))
            .filter(|s| passes_gates(s, None, &self.config.whale_screen))
            .collect()
    }

    /// Run one detection pass and replace the watch-list with its result.
    ///
    /// `acceleration` supplies each snapshot's volume acceleration.
    pub fn detect<F>(
        &mut self,
        snapshots: &[InstrumentSnapshot],
        tracks: &HashMap<String, PersistenceTrack>,
        whales: &HashMap<String, WhaleReport>,
        acceleration: F,
    ) -> PreIgnitionOutcome
    where
        F: Fn(&InstrumentSnapshot) -> f64,
    {
        let graduations = self.check_graduations(snapshots);
        let graduated: HashSet<&str> = graduations.iter().map(|g| g.symbol.as_str()).collect();

        let eligible: Vec<(&InstrumentSnapshot, &PersistenceTrack)> = snapshots
            .iter()
            .filter(|s| !is_excluded(&s.symbol, &self.config.excluded))
            .filter(|s| !graduated.contains(s.symbol.as_str()))
            .filter_map(|s| tracks.get(&s.symbol).map(|t| (s, t)))
            .filter(|(_, t)| {
                t.consecutive_hours >= self.config.min_tracked_cycles && !t.is_graduated()
            })
            .collect();

        if eligible.is_empty() {
            debug!("Pre-ignition: no tracked symbols eligible this cycle");
            self.watch_list.clear();
            return PreIgnitionOutcome {
                candidates: Vec::new(),
                graduations,
                relaxed: false,
            };
        }

        let mut relaxed = false;
        let mut matched: Vec<(&InstrumentSnapshot, &PersistenceTrack)> = eligible
            .iter()
            .copied()
            .filter(|(s, t)| passes_gates(s, Some(*t), &self.config.strict))
            .collect();

        if matched.is_empty() {
            relaxed = true;
            matched = eligible
                .iter()
                .copied()
                .filter(|(s, t)| passes_gates(s, Some(*t), &self.config.relaxed))
                .collect();
            warn!(
                eligible = eligible.len(),
                found = matched.len(),
                "Pre-ignition strict pass found nothing; relaxed fallback engaged (reduced confidence)"
            );
        }

        let mut scored: Vec<PreIgnitionCandidate> = matched
            .into_iter()
            .map(|(s, track)| {
                let accel = acceleration(s);
                let score = pre_ignition_score(s, accel);
                let pressure =
                    detect_pressure_direction(s.change_1h, s.change_24h, Some(track.previous_change_1h));

                let threshold = if (accel - self.neutral_acceleration).abs() < NEUTRAL_EPSILON {
                    self.config.fresh_alert_score
                } else {
                    self.config.alert_score
                };

                let mut candidate = Candidate::new(s.clone(), StrategyId::PreIgnition);
                candidate.pre_ignition_score = Some(score);
                candidate.volume_acceleration = Some(accel);
                candidate.whale = whales.get(&s.symbol).cloned();

                PreIgnitionCandidate {
                    candidate,
                    pressure,
                    relaxed,
                    should_alert: track.alert_sent_level < 1 && score >= threshold,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score().cmp(&a.score()));
        scored.truncate(self.config.max_candidates);

        for c in &scored {
            debug!(
                symbol = %c.symbol(),
                score = c.score(),
                pressure = %c.pressure.direction,
                accel = c.candidate.volume_acceleration.unwrap_or_default(),
                change_1h = c.candidate.snapshot.change_1h,
                "Pre-ignition candidate"
            );
        }
        info!(
            count = scored.len(),
            relaxed,
            graduated = graduations.len(),
            "Pre-ignition scan complete"
        );

        self.watch_list = scored.clone();

        PreIgnitionOutcome {
            candidates: scored,
            graduations,
            relaxed,
        }
    }

    /// Watched symbols whose 1h change now exceeds the graduation threshold
    fn check_graduations(&self, snapshots: &[InstrumentSnapshot]) -> Vec<Graduation> {
        let mut out = Vec::new();
        for watched in &self.watch_list {
            let Some(snap) = snapshots.iter().find(|s| s.symbol == watched.symbol()) else {
                continue;
            };
            if snap.change_1h > self.config.graduation_change_1h {
                info!(
                    symbol = %snap.symbol,
                    change_1h = snap.change_1h,
                    "🚀🎓 Graduation: pre-ignition candidate ignited"
                );
                out.push(Graduation {
                    symbol: snap.symbol.clone(),
                    change_1h: snap.change_1h,
                    last_score: watched.score(),
                });
            }
        }
        out
    }
}

fn passes_gates(s: &InstrumentSnapshot, track: Option<&PersistenceTrack>, g: &PreIgnitionGates) -> bool {
    if let Some(t) = track {
        let since_entry = t.change_since_entry(s.price);
        if g.min_change_since_entry.is_some_and(|min| since_entry <= min) {
            return false;
        }
        if g.max_change_since_entry.is_some_and(|max| since_entry >= max) {
            return false;
        }
    }

    if g.min_change_24h.is_some_and(|min| s.change_24h <= min) {
        return false;
    }
    if g.max_change_24h.is_some_and(|max| s.change_24h >= max) {
        return false;
    }

    if s.change_1h <= g.min_change_1h {
        return false;
    }
    if g.max_change_1h.is_some_and(|max| s.change_1h >= max) {
        return false;
    }
    if g.distribution_change_1h.is_some_and(|d| s.change_1h < d) {
        return false;
    }

    let velocity = match s.turnover() {
        Some(turnover) => turnover >= g.min_turnover,
        None => s.volume_24h > g.unknown_cap_min_volume,
    };
    let volume = g.min_volume.is_some_and(|min| s.volume_24h > min);

    velocity || volume
}

/// Pre-ignition score in [1, 100], starting from 50.
pub fn pre_ignition_score(s: &InstrumentSnapshot, acceleration: f64) -> u8 {
    let mut score: f64 = 50.0;

    let volume = s.volume_24h;
    if volume > 1_000_000.0 {
        score += 30.0;
    } else if volume > 500_000.0 {
        score += 20.0;
    } else if volume > 100_000.0 {
        score += 10.0;
    } else if volume < 10_000.0 {
        score -= 20.0;
    }

    if s.change_1h > 3.0 {
        score += 10.0;
    }
    if s.change_24h > 10.0 {
        score += 10.0;
    }
    if s.change_1h < -5.0 {
        score -= 15.0;
    }
    if s.change_24h < -10.0 {
        score -= 15.0;
    }

    match s.turnover() {
        Some(r) if r > 0.5 => score += 20.0,
        Some(r) if r > 0.1 => score += 10.0,
        _ => {}
    }

    if acceleration > 3.0 {
        score += 30.0;
    } else if acceleration > 1.5 {
        score += 15.0;
    }

    score.round().clamp(1.0, 100.0) as u8
}
