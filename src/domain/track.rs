use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::market::{Candidate, MarketState, StrategyId};

/// Signed buy/sell pressure label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PressureDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl PressureDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PressureDirection::Bullish => "BULLISH",
            PressureDirection::Bearish => "BEARISH",
            PressureDirection::Neutral => "NEUTRAL",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            PressureDirection::Bullish => "🟢",
            PressureDirection::Bearish => "🔴",
            PressureDirection::Neutral => "⚪",
        }
    }
}

impl std::fmt::Display for PressureDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of pressure estimation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureReading {
    pub direction: PressureDirection,
    /// 0.6 * 1h + 0.3 * 24h + 0.1 * momentum delta
    pub net_buy_pressure: f64,
    /// 0..=100
    pub confidence: f64,
}

/// Lifecycle phase attached by the pre-ignition detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackPhase {
    PreIgnition,
    /// Graduated out of pre-ignition. Never reverts.
    Pumping,
}

/// Holder trend reported by the whale analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhaleTrend {
    Accumulating,
    Distributing,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleReport {
    /// 0..=100
    pub whale_score: u8,
    pub trend: WhaleTrend,
    /// Share of supply held by top holders, in percent
    pub top_holders_concentration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
}

/// Trading plan returned by the advisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPlan {
    pub trend: String,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorVerdict {
    pub score: u8,
    pub approved: bool,
    pub reason: String,
    pub plan: Option<TradingPlan>,
    pub analyzed_at: DateTime<Utc>,
}

/// One tracked instrument. Owned by the tracker, keyed by symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceTrack {
    pub symbol: String,
    pub name: String,
    pub strategy: StrategyId,

    pub first_seen_price: f64,
    pub last_seen_price: f64,
    pub last_seen_change_1h: f64,
    pub last_seen_change_24h: f64,
    pub last_seen_volume: f64,
    pub last_seen_market_cap: f64,
    /// 1h change seen one cycle before `last_seen_change_1h`
    pub previous_change_1h: f64,

    /// Cycles this symbol has been observed
    pub consecutive_hours: u32,
    pub entry_timestamp: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub last_history_update: Option<DateTime<Utc>>,

    pub price_history: VecDeque<f64>,
    pub markov_state: MarketState,
    pub pre_ignition_score: Option<u8>,
    pub accumulation_score: Option<u8>,
    pub volume_acceleration: Option<f64>,
    pub pressure_direction: Option<PressureDirection>,
    pub net_buy_pressure: Option<f64>,

    /// Highest alert level already sent. Never decreases.
    pub alert_sent_level: u32,
    pub phase: Option<TrackPhase>,

    pub advisor: Option<AdvisorVerdict>,
    pub whale: Option<WhaleReport>,
    pub trade_url: Option<String>,
    pub contract_address: Option<String>,
    pub logo: Option<String>,
}

impl PersistenceTrack {
    /// First observation of a qualifying candidate
    pub fn from_candidate(candidate: &Candidate, now: DateTime<Utc>) -> Self {
        let snap = &candidate.snapshot;
        let mut price_history = VecDeque::new();
        price_history.push_back(snap.price);

        Self {
            symbol: snap.symbol.clone(),
            name: snap.name.clone(),
            strategy: candidate.strategy,
            first_seen_price: snap.price,
            last_seen_price: snap.price,
            last_seen_change_1h: snap.change_1h,
            last_seen_change_24h: snap.change_24h,
            last_seen_volume: snap.volume_24h,
            last_seen_market_cap: snap.market_cap,
            previous_change_1h: snap.change_1h,
            consecutive_hours: 1,
            entry_timestamp: now,
            last_updated: now,
            last_history_update: Some(now),
            price_history,
            markov_state: MarketState::Accumulation,
            pre_ignition_score: candidate.pre_ignition_score,
            accumulation_score: candidate.accumulation_score,
            volume_acceleration: candidate.volume_acceleration,
            pressure_direction: None,
            net_buy_pressure: None,
            alert_sent_level: 0,
            phase: None,
            advisor: None,
            whale: candidate.whale.clone(),
            trade_url: snap.trade_url.clone(),
            contract_address: snap.contract_address.clone(),
            logo: snap.logo.clone(),
        }
    }

    /// Percent move since the symbol was first tracked
    pub fn change_since_entry(&self, price: f64) -> f64 {
        if self.first_seen_price > 0.0 {
            (price - self.first_seen_price) / self.first_seen_price * 100.0
        } else {
            0.0
        }
    }

    /// Percent volume change vs. the previous observation
    pub fn volume_change_pct(&self, volume: f64) -> f64 {
        if self.last_seen_volume > 0.0 {
            (volume - self.last_seen_volume) / self.last_seen_volume * 100.0
        } else {
            0.0
        }
    }

    pub fn is_graduated(&self) -> bool {
        self.phase == Some(TrackPhase::Pumping)
    }
}
