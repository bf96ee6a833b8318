//! Persistence tracker
//!
//! Owns every [`PersistenceTrack`]. Per symbol the lifecycle is
//! `absent -> tracked -> evicted`, with in-place strategy promotion that
//! keeps `consecutive_hours`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TrackerConfig;
use crate::domain::{
    AdvisorVerdict, Candidate, PersistenceTrack, StrategyId, TrackPhase, WhaleReport,
};
use crate::strategy::markov::MarkovRegimeClassifier;
use crate::strategy::pre_ignition::PreIgnitionCandidate;

/// Lifecycle change produced while processing a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackEvent {
    Created {
        symbol: String,
        strategy: StrategyId,
    },
    Promoted {
        symbol: String,
        from: StrategyId,
        to: StrategyId,
    },
    /// Volume collapsed against the previous observation
    Disqualified {
        symbol: String,
        volume_change_pct: f64,
    },
    /// Stale beyond the TTL and not protected
    Evicted {
        symbol: String,
        idle_secs: i64,
    },
    Milestone {
        symbol: String,
        hours: u32,
    },
}

pub struct PersistenceTracker {
    config: TrackerConfig,
    markov: MarkovRegimeClassifier,
    tracks: HashMap<String, PersistenceTrack>,
}

impl PersistenceTracker {
    pub fn new(config: TrackerConfig, markov: MarkovRegimeClassifier) -> Self {
        Self {
            config,
            markov,
            tracks: HashMap::new(),
        }
    }

    pub fn tracks(&self) -> &HashMap<String, PersistenceTrack> {
        &self.tracks
    }

    pub fn get(&self, symbol: &str) -> Option<&PersistenceTrack> {
        self.tracks.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Tracks sorted by `consecutive_hours` (desc), optionally one strategy only
    pub fn list(&self, strategy: Option<StrategyId>) -> Vec<PersistenceTrack> {
        let mut list: Vec<PersistenceTrack> = self
            .tracks
            .values()
            .filter(|t| strategy.map_or(true, |s| t.strategy == s))
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            b.consecutive_hours
                .cmp(&a.consecutive_hours)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        list
    }

    pub fn restore(&mut self, tracks: HashMap<String, PersistenceTrack>) {
        self.tracks = tracks;
    }

    /// Evict stale tracks, then create or update one track per candidate.
    ///
    /// `candidates` must already be merged to one entry per symbol.
    /// Symbols in `protected` survive the TTL check.
    pub fn process_cycle(
        &mut self,
        candidates: &[Candidate],
        protected: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> Vec<TrackEvent> {
        let mut events = Vec::new();
        let current: HashSet<&str> = candidates.iter().map(|c| c.symbol()).collect();
        let ttl = Duration::seconds(self.config.ttl_secs);

        let stale: Vec<(String, i64)> = self
            .tracks
            .values()
            .filter(|t| !current.contains(t.symbol.as_str()))
            .filter(|t| !protected.contains(&t.symbol))
            .filter(|t| now - t.last_updated > ttl)
            .map(|t| (t.symbol.clone(), (now - t.last_updated).num_seconds()))
            .collect();

        for (symbol, idle_secs) in stale {
            info!(symbol = %symbol, idle_secs, "📉 Dropped from radar (stale)");
            self.tracks.remove(&symbol);
            events.push(TrackEvent::Evicted { symbol, idle_secs });
        }

        for candidate in candidates {
            match self.tracks.get(candidate.symbol()) {
                None => {
                    let track = PersistenceTrack::from_candidate(candidate, now);
                    info!(
                        symbol = %track.symbol,
                        strategy = track.strategy.label(),
                        "🆕 Entered radar"
                    );
                    events.push(TrackEvent::Created {
                        symbol: track.symbol.clone(),
                        strategy: track.strategy,
                    });
                    self.tracks.insert(track.symbol.clone(), track);
                }
                Some(_) => self.update_existing(candidate, now, &mut events),
            }
        }

        events
    }

    fn update_existing(&mut self, candidate: &Candidate, now: DateTime<Utc>, events: &mut Vec<TrackEvent>) {
        let snap = &candidate.snapshot;
        let Some(track) = self.tracks.get_mut(&snap.symbol) else {
            return;
        };

        let volume_change_pct = track.volume_change_pct(snap.volume_24h);
        if volume_change_pct < -self.config.volume_drop_pct {
            info!(
                symbol = %snap.symbol,
                volume_change_pct = format!("{volume_change_pct:.1}"),
                "⚠️ Disqualified: volume collapsed"
            );
            self.tracks.remove(&snap.symbol);
            events.push(TrackEvent::Disqualified {
                symbol: snap.symbol.clone(),
                volume_change_pct,
            });
            return;
        }

        track.consecutive_hours += 1;
        track.previous_change_1h = track.last_seen_change_1h;
        track.last_seen_price = snap.price;
        track.last_seen_change_1h = snap.change_1h;
        track.last_seen_change_24h = snap.change_24h;
        track.last_seen_volume = snap.volume_24h;
        track.last_seen_market_cap = snap.market_cap;
        track.last_updated = now;

        if snap.trade_url.is_some() {
            track.trade_url = snap.trade_url.clone();
        }
        if snap.contract_address.is_some() {
            track.contract_address = snap.contract_address.clone();
        }
        if snap.logo.is_some() {
            track.logo = snap.logo.clone();
        }
        if candidate.accumulation_score.is_some() {
            track.accumulation_score = candidate.accumulation_score;
        }
        if candidate.volume_acceleration.is_some() {
            track.volume_acceleration = candidate.volume_acceleration;
        }
        if candidate.whale.is_some() {
            track.whale = candidate.whale.clone();
        }

        let interval = Duration::seconds(self.config.history_interval_secs);
        let due = match track.last_history_update {
            Some(last) => now - last >= interval,
            None => true,
        };
        if track.price_history.is_empty() || due {
            track.price_history.push_back(snap.price);
            track.last_history_update = Some(now);
            while track.price_history.len() > self.config.history_capacity {
                track.price_history.pop_front();
            }
        }

        if track.price_history.len() >= self.config.markov_min_points {
            let prices: Vec<f64> = track.price_history.iter().copied().collect();
            let prediction = self.markov.predict(&prices);
            track.markov_state = prediction.predicted_next_state;
        }

        let promoted = track.strategy.promote(candidate.strategy);
        if promoted != track.strategy {
            events.push(TrackEvent::Promoted {
                symbol: track.symbol.clone(),
                from: track.strategy,
                to: promoted,
            });
            track.strategy = promoted;
        }

        debug!(
            symbol = %track.symbol,
            hours = track.consecutive_hours,
            markov = %track.markov_state,
            "✅ Persists"
        );

        for &milestone in &self.config.milestones {
            if track.consecutive_hours == milestone && track.alert_sent_level < milestone {
                track.alert_sent_level = milestone;
                events.push(TrackEvent::Milestone {
                    symbol: track.symbol.clone(),
                    hours: milestone,
                });
            }
        }
    }

    /// Copy a pre-ignition result onto its track and promote it.
    /// Returns a promotion event when the strategy changed.
    pub fn apply_pre_ignition(&mut self, c: &PreIgnitionCandidate) -> Option<TrackEvent> {
        let track = self.tracks.get_mut(c.symbol())?;

        track.pre_ignition_score = c.candidate.pre_ignition_score;
        track.volume_acceleration = c.candidate.volume_acceleration;
        track.pressure_direction = Some(c.pressure.direction);
        track.net_buy_pressure = Some(c.pressure.net_buy_pressure);
        if c.candidate.whale.is_some() {
            track.whale = c.candidate.whale.clone();
        }
        if !track.is_graduated() {
            track.phase = Some(TrackPhase::PreIgnition);
        }

        let promoted = track.strategy.promote(StrategyId::PreIgnition);
        if promoted != track.strategy {
            let from = track.strategy;
            track.strategy = promoted;
            return Some(TrackEvent::Promoted {
                symbol: track.symbol.clone(),
                from,
                to: promoted,
            });
        }
        None
    }

    /// Raise the alert watermark; it never goes down
    pub fn mark_alert_sent(&mut self, symbol: &str, level: u32) {
        if let Some(track) = self.tracks.get_mut(symbol) {
            track.alert_sent_level = track.alert_sent_level.max(level);
        }
    }

    pub fn mark_graduated(&mut self, symbol: &str) {
        if let Some(track) = self.tracks.get_mut(symbol) {
            track.phase = Some(TrackPhase::Pumping);
        }
    }

    pub fn attach_advisor(&mut self, symbol: &str, verdict: AdvisorVerdict) {
        if let Some(track) = self.tracks.get_mut(symbol) {
            track.advisor = Some(verdict);
        }
    }

    pub fn attach_whale(&mut self, symbol: &str, report: WhaleReport) {
        if let Some(track) = self.tracks.get_mut(symbol) {
            track.whale = Some(report);
        }
    }

    /// Price seen on the previous observation, if tracked with a usable price
    pub fn last_seen_price(&self, symbol: &str) -> Option<f64> {
        self.tracks
            .get(symbol)
            .map(|t| t.last_seen_price)
            .filter(|p| *p > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkovConfig;
    use crate::domain::{InstrumentSnapshot, MarketState, PressureDirection, PressureReading};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn tracker() -> PersistenceTracker {
        PersistenceTracker::new(
            TrackerConfig::default(),
            MarkovRegimeClassifier::new(MarkovConfig::default()),
        )
    }

    fn candidate(symbol: &str, price: f64, volume: f64, strategy: StrategyId) -> Candidate {
        Candidate::new(
            InstrumentSnapshot::new(symbol, price, 1.0, 3.0, volume, 2_000_000.0),
            strategy,
        )
    }

    fn none() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn creates_then_updates() {
        let mut t = tracker();
        let c = candidate("FOO", 1.0, 100_000.0, StrategyId::Standard);

        let events = t.process_cycle(&[c.clone()], &none(), t0());
        assert!(matches!(events[0], TrackEvent::Created { .. }));
        assert_eq!(t.get("FOO").map(|x| x.consecutive_hours), Some(1));

        t.process_cycle(&[c], &none(), t0() + Duration::minutes(5));
        let track = t.get("FOO").unwrap();
        assert_eq!(track.consecutive_hours, 2);
        assert_eq!(track.last_updated, t0() + Duration::minutes(5));
    }

    #[test]
    fn ttl_eviction_waits_for_the_window() {
        let mut t = tracker();
        t.process_cycle(&[candidate("FOO", 1.0, 100_000.0, StrategyId::Standard)], &none(), t0());

        t.process_cycle(&[], &none(), t0() + Duration::minutes(4));
        assert!(t.get("FOO").is_some());

        let events = t.process_cycle(&[], &none(), t0() + Duration::minutes(6));
        assert!(t.get("FOO").is_none());
        assert!(matches!(events[0], TrackEvent::Evicted { idle_secs: 360, .. }));
    }

    #[test]
    fn protected_tracks_survive_ttl() {
        let mut t = tracker();
        t.process_cycle(&[candidate("FOO", 1.0, 100_000.0, StrategyId::Standard)], &none(), t0());

        let protected: HashSet<String> = ["FOO".to_string()].into_iter().collect();
        t.process_cycle(&[], &protected, t0() + Duration::hours(2));
        assert!(t.get("FOO").is_some());
    }

    #[test]
    fn volume_collapse_disqualifies_inside_ttl() {
        let mut t = tracker();
        t.process_cycle(&[candidate("FOO", 1.0, 100_000.0, StrategyId::Standard)], &none(), t0());

        let events = t.process_cycle(
            &[candidate("FOO", 1.0, 75_000.0, StrategyId::Standard)],
            &none(),
            t0() + Duration::minutes(1),
        );
        assert!(t.get("FOO").is_none());
        assert!(matches!(events[0], TrackEvent::Disqualified { .. }));
    }

    #[test]
    fn promotion_keeps_hours_and_never_downgrades() {
        let mut t = tracker();
        t.process_cycle(&[candidate("FOO", 1.0, 100_000.0, StrategyId::Standard)], &none(), t0());
        let events = t.process_cycle(
            &[candidate("FOO", 1.0, 100_000.0, StrategyId::MicroVelocity)],
            &none(),
            t0() + Duration::minutes(1),
        );
        assert!(events.iter().any(|e| matches!(e, TrackEvent::Promoted { to: StrategyId::MicroVelocity, .. })));

        t.process_cycle(
            &[candidate("FOO", 1.0, 100_000.0, StrategyId::Standard)],
            &none(),
            t0() + Duration::minutes(2),
        );
        let track = t.get("FOO").unwrap();
        assert_eq!(track.strategy, StrategyId::MicroVelocity);
        assert_eq!(track.consecutive_hours, 3);
    }

    #[test]
    fn milestones_fire_once_at_three_and_six() {
        let mut t = tracker();
        let c = candidate("FOO", 1.0, 100_000.0, StrategyId::Standard);
        let mut fired = Vec::new();

        for cycle in 0..7 {
            let events = t.process_cycle(&[c.clone()], &none(), t0() + Duration::minutes(cycle));
            for e in events {
                if let TrackEvent::Milestone { hours, .. } = e {
                    fired.push((cycle + 1, hours));
                }
            }
        }
        assert_eq!(fired, vec![(3, 3), (6, 6)]);
        assert_eq!(t.get("FOO").unwrap().alert_sent_level, 6);
    }

    #[test]
    fn price_history_is_rate_limited_and_bounded() {
        let mut t = PersistenceTracker::new(
            TrackerConfig {
                history_capacity: 3,
                ..Default::default()
            },
            MarkovRegimeClassifier::default(),
        );
        let mut now = t0();
        t.process_cycle(&[candidate("FOO", 1.0, 100_000.0, StrategyId::Standard)], &none(), now);

        now += Duration::minutes(5);
        t.process_cycle(&[candidate("FOO", 2.0, 100_000.0, StrategyId::Standard)], &none(), now);
        assert_eq!(t.get("FOO").unwrap().price_history.len(), 1);

        for price in [3.0, 4.0, 5.0] {
            now += Duration::minutes(15);
            t.process_cycle(&[candidate("FOO", price, 100_000.0, StrategyId::Standard)], &none(), now);
        }
        let history: Vec<f64> = t.get("FOO").unwrap().price_history.iter().copied().collect();
        assert_eq!(history, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn markov_state_refreshes_with_enough_history() {
        let mut t = tracker();
        let mut now = t0();
        for i in 0..12 {
            let price = 1.0 + i as f64 * 0.01;
            t.process_cycle(&[candidate("FOO", price, 100_000.0, StrategyId::Standard)], &none(), now);
            now += Duration::minutes(15);
        }
        assert_eq!(t.get("FOO").unwrap().markov_state, MarketState::BullishTrend);
    }

    #[test]
    fn pre_ignition_promotes_and_alert_level_is_monotonic() {
        let mut t = tracker();
        t.process_cycle(&[candidate("FOO", 1.0, 100_000.0, StrategyId::Standard)], &none(), t0());

        let mut pc = candidate("FOO", 1.0, 100_000.0, StrategyId::PreIgnition);
        pc.pre_ignition_score = Some(88);
        let pre = PreIgnitionCandidate {
            candidate: pc,
            pressure: PressureReading {
                direction: PressureDirection::Bullish,
                net_buy_pressure: 1.5,
                confidence: 66.7,
            },
            relaxed: false,
            should_alert: true,
        };

        assert!(t.apply_pre_ignition(&pre).is_some());
        t.mark_alert_sent("FOO", 3);
        t.mark_alert_sent("FOO", 1);

        let track = t.get("FOO").unwrap();
        assert_eq!(track.strategy, StrategyId::PreIgnition);
        assert_eq!(track.pre_ignition_score, Some(88));
        assert_eq!(track.alert_sent_level, 3);
        assert_eq!(track.phase, Some(TrackPhase::PreIgnition));

        t.mark_graduated("FOO");
        assert!(t.apply_pre_ignition(&pre).is_none());
        assert!(t.get("FOO").unwrap().is_graduated());
    }

    #[test]
    fn list_sorts_by_hours_and_filters() {
        let mut t = tracker();
        t.process_cycle(&[candidate("OLD", 1.0, 100_000.0, StrategyId::Standard)], &none(), t0());
        t.process_cycle(
            &[
                candidate("OLD", 1.0, 100_000.0, StrategyId::Standard),
                candidate("NEW", 1.0, 100_000.0, StrategyId::MicroVelocity),
            ],
            &none(),
            t0() + Duration::minutes(1),
        );

        let all: Vec<String> = t.list(None).into_iter().map(|x| x.symbol).collect();
        assert_eq!(all, vec!["OLD", "NEW"]);
        let micro = t.list(Some(StrategyId::MicroVelocity));
        assert_eq!(micro.len(), 1);
        assert_eq!(micro[0].symbol, "NEW");
    }
}
