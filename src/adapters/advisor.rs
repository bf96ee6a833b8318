//! Rule-based advisor.
//!
//! Scores the trend from the 24h and 1h moves plus volume acceleration and
//! derives a long plan with stops and targets scaled to trend strength.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::StrategyAdvisor;
use crate::domain::{AdvisorVerdict, PersistenceTrack, TradingPlan};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendClass {
    StrongUptrend,
    WeakUptrend,
    Neutral,
    Downtrend,
}

impl TrendClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendClass::StrongUptrend => "Strong Uptrend",
            TrendClass::WeakUptrend => "Weak Uptrend",
            TrendClass::Neutral => "Neutral",
            TrendClass::Downtrend => "Downtrend",
        }
    }
}

/// Trend score in -3..=4
pub fn trend_score(change_1h: f64, change_24h: f64, acceleration: f64) -> i32 {
    let mut score = 0;
    if change_24h > 15.0 {
        score += 2;
    } else if change_24h > 5.0 {
        score += 1;
    } else if change_24h < -10.0 {
        score -= 2;
    } else if change_24h < 0.0 {
        score -= 1;
    }

    if change_1h > 5.0 {
        score += 1;
    } else if change_1h < -5.0 {
        score -= 1;
    }

    if acceleration > 2.0 {
        score += 1;
    }
    score
}

pub fn classify_trend(score: i32) -> TrendClass {
    match score {
        s if s >= 3 => TrendClass::StrongUptrend,
        s if s >= 1 => TrendClass::WeakUptrend,
        s if s >= -1 => TrendClass::Neutral,
        _ => TrendClass::Downtrend,
    }
}

#[derive(Debug, Clone)]
pub struct TrendAdvisor {
    /// Minimum trend score for approval
    pub min_trend_score: i32,
}

impl Default for TrendAdvisor {
    fn default() -> Self {
        Self { min_trend_score: 1 }
    }
}

impl TrendAdvisor {
    pub fn evaluate(&self, track: &PersistenceTrack, now: DateTime<Utc>) -> AdvisorVerdict {
        let accel = track.volume_acceleration.unwrap_or(1.0);
        let score = trend_score(track.last_seen_change_1h, track.last_seen_change_24h, accel);
        let class = classify_trend(score);
        let entry = track.last_seen_price;

        // 0..=100 over the -3..=4 range
        let normalized = ((score + 3) as f64 / 7.0 * 100.0).round().clamp(0.0, 100.0) as u8;

        if entry <= 0.0 {
            return AdvisorVerdict {
                score: normalized,
                approved: false,
                reason: "no usable price".to_string(),
                plan: None,
                analyzed_at: now,
            };
        }

        let (stop, target) = if score >= 2 {
            (entry * 0.95, entry * 1.10)
        } else {
            (entry * 0.97, entry * 1.05)
        };
        let approved = score >= self.min_trend_score;

        AdvisorVerdict {
            score: normalized,
            approved,
            reason: format!("{} (trend score {})", class.as_str(), score),
            plan: approved.then(|| TradingPlan {
                trend: class.as_str().to_string(),
                entry,
                stop_loss: stop,
                take_profit: target,
                summary: format!(
                    "Long {} near {:.6}, invalidate below {:.6}",
                    track.symbol, entry, stop
                ),
            }),
            analyzed_at: now,
        }
    }
}

#[async_trait]
impl StrategyAdvisor for TrendAdvisor {
    async fn advise(&self, track: &PersistenceTrack, now: DateTime<Utc>) -> Result<AdvisorVerdict> {
        Ok(self.evaluate(track, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Candidate, InstrumentSnapshot, StrategyId};
    use chrono::TimeZone;

    fn track(ch1h: f64, ch24h: f64) -> PersistenceTrack {
        let c = Candidate::new(
            InstrumentSnapshot::new("FOO", 2.0, ch1h, ch24h, 100_000.0, 1_000_000.0),
            StrategyId::Standard,
        );
        PersistenceTrack::from_candidate(&c, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn trend_scoring() {
        assert_eq!(trend_score(6.0, 20.0, 2.5), 4);
        assert_eq!(trend_score(0.0, 3.0, 1.0), 0);
        assert_eq!(trend_score(-6.0, -12.0, 1.0), -3);
        assert_eq!(classify_trend(4), TrendClass::StrongUptrend);
        assert_eq!(classify_trend(-2), TrendClass::Downtrend);
    }

    #[test]
    fn strong_trend_gets_wide_targets() {
        let t = track(6.0, 20.0);
        let v = TrendAdvisor::default().evaluate(&t, t.entry_timestamp);
        assert!(v.approved);
        let plan = v.plan.unwrap();
        assert!((plan.stop_loss - 1.9).abs() < 1e-9);
        assert!((plan.take_profit - 2.2).abs() < 1e-9);
    }

    #[test]
    fn flat_market_is_not_approved() {
        let t = track(0.5, 2.0);
        let v = TrendAdvisor::default().evaluate(&t, t.entry_timestamp);
        assert!(!v.approved);
        assert!(v.plan.is_none());
        assert!(v.reason.starts_with("Neutral"));
    }
}
