//! Volume acceleration and buy/sell pressure
//!
//! Volume history is kept per symbol and is independent of tracking, so
//! acceleration works for symbols that have never been tracked.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::config::AccelerationConfig;
use crate::domain::{PressureDirection, PressureReading};

/// Net pressure magnitude required before calling a direction
const PRESSURE_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeSample {
    pub timestamp: DateTime<Utc>,
    pub volume: f64,
}

/// Rolling per-symbol volume window
#[derive(Debug, Clone)]
pub struct VolumeHistoryStore {
    config: AccelerationConfig,
    entries: HashMap<String, VecDeque<VolumeSample>>,
}

impl VolumeHistoryStore {
    pub fn new(config: AccelerationConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    /// Append a sample, then drop anything outside the window or over capacity.
    /// Non-positive volumes are ignored.
    pub fn record(&mut self, symbol: &str, volume: f64, now: DateTime<Utc>) {
        if volume.is_nan() || volume <= 0.0 {
            return;
        }

        let cutoff = now - Duration::days(self.config.window_days);
        let max_entries = self.config.max_entries;
        let history = self.entries.entry(symbol.to_string()).or_default();
        history.push_back(VolumeSample {
            timestamp: now,
            volume,
        });

        while history.front().is_some_and(|s| s.timestamp <= cutoff) {
            history.pop_front();
        }
        while history.len() > max_entries {
            history.pop_front();
        }
    }

    pub fn samples(&self, symbol: &str) -> Option<&VecDeque<VolumeSample>> {
        self.entries.get(symbol)
    }

    /// Acceleration of `volume` against this symbol's stored baseline
    pub fn acceleration(&self, symbol: &str, volume: f64, market_cap: f64) -> f64 {
        calculate_volume_acceleration(self.samples(symbol), volume, market_cap, &self.config)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Owned copy for persistence
    pub fn export(&self) -> HashMap<String, Vec<VolumeSample>> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().copied().collect()))
            .collect()
    }

    pub fn restore(&mut self, data: HashMap<String, Vec<VolumeSample>>) {
        self.entries = data
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect();
    }
}

/// Current volume relative to the symbol's rolling mean.
///
/// With fewer than `min_samples` samples a synthetic baseline of
/// `synthetic_turnover * market_cap` is used and the ratio is clamped to
/// `[synthetic_min, synthetic_max]`. With no history and no cap the result is
/// `neutral`. Never negative.
pub fn calculate_volume_acceleration(
    history: Option<&VecDeque<VolumeSample>>,
    current_volume: f64,
    market_cap: f64,
    config: &AccelerationConfig,
) -> f64 {
    let samples = history.map(|h| h.len()).unwrap_or(0);

    if samples < config.min_samples {
        if market_cap > 0.0 {
            let baseline = market_cap * config.synthetic_turnover;
            if baseline > 0.0 {
                return (current_volume / baseline)
                    .clamp(config.synthetic_min, config.synthetic_max);
            }
        }
        return config.neutral;
    }

    let history = match history {
        Some(h) => h,
        None => return config.neutral,
    };
    let avg = history.iter().map(|s| s.volume).sum::<f64>() / history.len() as f64;
    if avg == 0.0 {
        return config.neutral;
    }

    (current_volume / avg).max(0.0)
}

/// Classify buy/sell pressure from price momentum.
///
/// Three signals vote: 1h change, 24h change and the 1h change vs. the
/// previous observation. A direction needs two aligned votes and a net
/// pressure beyond +/-1.0.
pub fn detect_pressure_direction(
    change_1h: f64,
    change_24h: f64,
    previous_change_1h: Option<f64>,
) -> PressureReading {
    let momentum_delta = change_1h - previous_change_1h.unwrap_or(0.0);

    let bullish = [change_1h > 0.0, change_24h > 0.0, momentum_delta > 0.0]
        .iter()
        .filter(|b| **b)
        .count();
    let bearish = [change_1h < 0.0, change_24h < 0.0, momentum_delta < 0.0]
        .iter()
        .filter(|b| **b)
        .count();

    let net_buy_pressure = change_1h * 0.6 + change_24h * 0.3 + momentum_delta * 0.1;

    let (direction, confidence) = if bullish >= 2 && net_buy_pressure > PRESSURE_THRESHOLD {
        (PressureDirection::Bullish, bullish as f64 / 3.0 * 100.0)
    } else if bearish >= 2 && net_buy_pressure < -PRESSURE_THRESHOLD {
        (PressureDirection::Bearish, bearish as f64 / 3.0 * 100.0)
    } else {
        (PressureDirection::Neutral, 50.0)
    };

    PressureReading {
        direction,
        net_buy_pressure,
        confidence: confidence.min(100.0),
    }
}
