//! Multi-strategy hard-filter classifier
//!
//! Each strategy is an independent, pure pass over the batch. Filters run in
//! a fixed order (cap, volume, turnover, excluded, strategy-specific) so the
//! rejection counters logged per pass are comparable across cycles.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use crate::config::{
    AccumulationConfig, MarketBand, MicroVelocityConfig, StandardConfig, StrategiesConfig,
};
use crate::domain::{Candidate, InstrumentSnapshot, StrategyId, WhaleReport, WhaleTrend};

/// Rejections per filter stage, for the per-pass debug line
#[derive(Debug, Default)]
struct RejectCounts {
    cap: usize,
    volume: usize,
    turnover: usize,
    excluded: usize,
    strategy: usize,
}

/// How a strategy treats instruments without a market cap
#[derive(Debug, Clone, Copy)]
enum UnknownCap {
    Reject,
    RequireVolume(f64),
}

#[derive(Debug, Clone)]
pub struct StrategyClassifier {
    config: StrategiesConfig,
}

impl StrategyClassifier {
    pub fn new(config: StrategiesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategiesConfig {
        &self.config
    }

    /// Standard: sustained change OR early-riser profile
    pub fn classify_standard(&self, snapshots: &[InstrumentSnapshot]) -> Vec<Candidate> {
        let cfg: &StandardConfig = &self.config.standard;
        let mut counts = RejectCounts::default();

        let mut passed: Vec<&InstrumentSnapshot> = snapshots
            .iter()
            .filter(|s| {
                let unknown = UnknownCap::RequireVolume(cfg.unknown_cap_min_volume);
                if !passes_common(s, &cfg.band, unknown, &cfg.excluded, &mut counts) {
                    return false;
                }
                let sustained = s.change_1h >= cfg.sustained_min_change_1h
                    && s.change_24h >= cfg.sustained_min_change_24h;
                let early = s.change_1h >= cfg.early_min_change_1h
                    && s.change_24h < cfg.early_max_change_24h
                    && s.change_24h > cfg.early_min_change_24h;
                if !(sustained || early) {
                    counts.strategy += 1;
                }
                sustained || early
            })
            .collect();

        log_counts(StrategyId::Standard, snapshots.len(), &counts, passed.len());
        rank_by_change_1h(&mut passed);

        passed
            .into_iter()
            .take(cfg.limit)
            .map(|s| {
                let mut c = Candidate::new(s.clone(), StrategyId::Standard);
                c.early_riser =
                    s.change_1h >= cfg.early_min_change_1h && s.change_24h < cfg.early_max_change_24h;
                c
            })
            .collect()
    }

    /// Micro-velocity: strict cap band, bounded 1h/24h dips
    pub fn classify_micro(&self, snapshots: &[InstrumentSnapshot]) -> Vec<Candidate> {
        let cfg: &MicroVelocityConfig = &self.config.micro_velocity;
        let mut counts = RejectCounts::default();

        let mut passed: Vec<&InstrumentSnapshot> = snapshots
            .iter()
            .filter(|s| {
                if !passes_common(s, &cfg.band, UnknownCap::Reject, &cfg.excluded, &mut counts) {
                    return false;
                }
                let ok = s.change_1h >= cfg.min_change_1h && s.change_24h >= cfg.min_change_24h;
                if !ok {
                    counts.strategy += 1;
                }
                ok
            })
            .collect();

        log_counts(StrategyId::MicroVelocity, snapshots.len(), &counts, passed.len());
        rank_by_change_1h(&mut passed);

        passed
            .into_iter()
            .take(cfg.limit)
            .map(|s| Candidate::new(s.clone(), StrategyId::MicroVelocity))
            .collect()
    }

    /// Accumulation: quiet price with warming volume, ranked by score.
    ///
    /// `acceleration` supplies each snapshot's volume acceleration.
    pub fn classify_accumulation<F>(
        &self,
        snapshots: &[InstrumentSnapshot],
        whales: &HashMap<String, WhaleReport>,
        acceleration: F,
    ) -> Vec<Candidate>
    where
        F: Fn(&InstrumentSnapshot) -> f64,
    {
        let cfg: &AccumulationConfig = &self.config.accumulation;
        let mut counts = RejectCounts::default();

        let mut scored: Vec<Candidate> = snapshots
            .iter()
            .filter(|s| {
                if !passes_common(s, &cfg.band, UnknownCap::Reject, &cfg.excluded, &mut counts) {
                    return false;
                }
                let pumped = s.change_24h > cfg.max_change_24h;
                if pumped {
                    counts.strategy += 1;
                }
                !pumped
            })
            .map(|s| {
                let accel = acceleration(s);
                let whale = whales.get(&s.symbol).cloned();
                let mut c = Candidate::new(s.clone(), StrategyId::Accumulation);
                c.accumulation_score = Some(accumulation_score(s, whale.as_ref(), accel));
                c.volume_acceleration = Some(accel);
                c.whale = whale;
                c
            })
            .filter(|c| c.accumulation_score.unwrap_or(0) >= cfg.min_score)
            .collect();

        log_counts(StrategyId::Accumulation, snapshots.len(), &counts, scored.len());
        scored.sort_by(|a, b| b.accumulation_score.cmp(&a.accumulation_score));
        scored.truncate(cfg.limit);
        scored
    }
}

fn passes_common(
    s: &InstrumentSnapshot,
    band: &MarketBand,
    unknown_cap: UnknownCap,
    excluded: &[String],
    counts: &mut RejectCounts,
) -> bool {
    if s.has_unknown_cap() {
        let ok = match unknown_cap {
            UnknownCap::Reject => false,
            UnknownCap::RequireVolume(min) => s.volume_24h >= min,
        };
        if !ok {
            counts.cap += 1;
            return false;
        }
    } else if s.market_cap < band.min_market_cap || s.market_cap > band.max_market_cap {
        counts.cap += 1;
        return false;
    }

    if s.volume_24h < band.min_volume_24h {
        counts.volume += 1;
        return false;
    }

    if let Some(turnover) = s.turnover() {
        if turnover < band.min_turnover {
            counts.turnover += 1;
            return false;
        }
    }

    if is_excluded(&s.symbol, excluded) {
        counts.excluded += 1;
        return false;
    }

    true
}

pub(crate) fn is_excluded(symbol: &str, excluded: &[String]) -> bool {
    excluded.iter().any(|e| e.eq_ignore_ascii_case(symbol))
}

/// Descending 1h change; stable, so ties keep batch order
fn rank_by_change_1h(list: &mut [&InstrumentSnapshot]) {
    list.sort_by(|a, b| {
        b.change_1h
            .partial_cmp(&a.change_1h)
            .unwrap_or(Ordering::Equal)
    });
}

fn log_counts(strategy: StrategyId, total: usize, c: &RejectCounts, passed: usize) {
    debug!(
        strategy = strategy.label(),
        total,
        cap = c.cap,
        volume = c.volume,
        turnover = c.turnover,
        excluded = c.excluded,
        strategy_rules = c.strategy,
        passed,
        "Filter results"
    );
}

/// Accumulation score in [1, 100].
///
/// Whale buying (up to 40), volume acceleration (up to 30), price stability
/// (up to 20) and healthy turnover (10).
pub fn accumulation_score(s: &InstrumentSnapshot, whale: Option<&WhaleReport>, acceleration: f64) -> u8 {
    let mut score: i32 = 0;

    if let Some(w) = whale {
        if w.trend == WhaleTrend::Accumulating {
            score += 30;
        }
        if let Some(conc) = w.top_holders_concentration {
            if (30.0..=70.0).contains(&conc) {
                score += 10;
            }
        }
    }

    if acceleration > 1.5 {
        score += 15;
    }
    if acceleration > 2.0 {
        score += 15;
    }

    if s.change_1h.abs() < 5.0 {
        score += 10;
    }
    if s.change_24h > -5.0 && s.change_24h < 5.0 {
        score += 10;
    }

    if let Some(turnover) = s.turnover() {
        if turnover > 0.08 && turnover < 0.30 {
            score += 10;
        }
    }

    score.clamp(1, 100) as u8
}

/// Merge per-strategy outputs into one candidate per symbol.
///
/// On conflict the higher-priority strategy wins (accumulation over
/// micro-velocity over standard). Output keeps first-appearance order.
pub fn merge_by_priority<I>(groups: I) -> Vec<Candidate>
where
    I: IntoIterator<Item = Vec<Candidate>>,
{
    let mut merged: Vec<Candidate> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for candidate in groups.into_iter().flatten() {
        match index.get(candidate.symbol()) {
            Some(&i) => {
                if candidate.strategy > merged[i].strategy {
                    merged[i] = candidate;
                }
            }
            None => {
                index.insert(candidate.symbol().to_string(), merged.len());
                merged.push(candidate);
            }
        }
    }

    merged
}
