use serde::{Deserialize, Serialize};

/// Strategy that qualified an instrument.
///
/// Declaration order is promotion rank: a track's strategy only ever moves
/// towards `PreIgnition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    Standard,
    MicroVelocity,
    Accumulation,
    PreIgnition,
}

impl StrategyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::Standard => "standard",
            StrategyId::MicroVelocity => "micro_velocity",
            StrategyId::Accumulation => "accumulation",
            StrategyId::PreIgnition => "pre_ignition",
        }
    }

    /// Short label for log lines
    pub fn label(&self) -> &'static str {
        match self {
            StrategyId::Standard => "STD",
            StrategyId::MicroVelocity => "MICRO",
            StrategyId::Accumulation => "ACCUM",
            StrategyId::PreIgnition => "PRE-IGN",
        }
    }

    /// Returns whichever of the two ranks higher
    pub fn promote(self, other: StrategyId) -> StrategyId {
        self.max(other)
    }
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StrategyId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "std" => Ok(StrategyId::Standard),
            "micro_velocity" | "micro" => Ok(StrategyId::MicroVelocity),
            "accumulation" => Ok(StrategyId::Accumulation),
            "pre_ignition" => Ok(StrategyId::PreIgnition),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

/// Normalized ticker, one per symbol per cycle.
///
/// Missing numeric fields are zero-filled at the provider boundary, so a
/// broken ticker fails the filters instead of reaching scoring half-formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change_1h: f64,
    pub change_24h: f64,
    pub volume_24h: f64,
    /// 0 when unknown
    pub market_cap: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
}

impl InstrumentSnapshot {
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        change_1h: f64,
        change_24h: f64,
        volume_24h: f64,
        market_cap: f64,
    ) -> Self {
        let symbol = symbol.into().to_uppercase();
        Self {
            name: symbol.clone(),
            symbol,
            price,
            change_1h,
            change_24h,
            volume_24h,
            market_cap,
            logo: None,
            trade_url: None,
            contract_address: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn has_unknown_cap(&self) -> bool {
        self.market_cap <= 0.0
    }

    /// 24h volume / market cap, `None` when the cap is unknown
    pub fn turnover(&self) -> Option<f64> {
        if self.has_unknown_cap() {
            None
        } else {
            Some(self.volume_24h / self.market_cap)
        }
    }
}

/// Snapshot that passed one strategy's hard filters. Lives for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub snapshot: InstrumentSnapshot,
    pub strategy: StrategyId,
    /// Standard candidate that qualified through the early-riser profile
    #[serde(default)]
    pub early_riser: bool,
    pub pre_ignition_score: Option<u8>,
    pub accumulation_score: Option<u8>,
    pub volume_acceleration: Option<f64>,
    pub whale: Option<crate::domain::WhaleReport>,
}

impl Candidate {
    pub fn new(snapshot: InstrumentSnapshot, strategy: StrategyId) -> Self {
        Self {
            snapshot,
            strategy,
            early_riser: false,
            pre_ignition_score: None,
            accumulation_score: None,
            volume_acceleration: None,
            whale: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.snapshot.symbol
    }

    /// Score used for ranking and alert payloads
    pub fn score(&self) -> Option<u8> {
        self.pre_ignition_score.or(self.accumulation_score)
    }
}

/// Discrete market regime assigned to a price window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketState {
    #[default]
    Accumulation,
    BullishTrend,
    BearishTrend,
    Euphoria,
    Panic,
    Uncertain,
}

impl MarketState {
    /// All states in declaration order. Index order of the transition matrix.
    pub const ALL: [MarketState; 6] = [
        MarketState::Accumulation,
        MarketState::BullishTrend,
        MarketState::BearishTrend,
        MarketState::Euphoria,
        MarketState::Panic,
        MarketState::Uncertain,
    ];

    pub fn index(&self) -> usize {
        match self {
            MarketState::Accumulation => 0,
            MarketState::BullishTrend => 1,
            MarketState::BearishTrend => 2,
            MarketState::Euphoria => 3,
            MarketState::Panic => 4,
            MarketState::Uncertain => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketState::Accumulation => "ACCUMULATION",
            MarketState::BullishTrend => "BULLISH_TREND",
            MarketState::BearishTrend => "BEARISH_TREND",
            MarketState::Euphoria => "EUPHORIA",
            MarketState::Panic => "PANIC",
            MarketState::Uncertain => "UNCERTAIN",
        }
    }
}

impl std::fmt::Display for MarketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_promotion_only_upgrades() {
        assert_eq!(
            StrategyId::Standard.promote(StrategyId::MicroVelocity),
            StrategyId::MicroVelocity
        );
        assert_eq!(
            StrategyId::PreIgnition.promote(StrategyId::Standard),
            StrategyId::PreIgnition
        );
    }

    #[test]
    fn strategy_ids_serialize_snake_case() {
        let json = serde_json::to_string(&StrategyId::MicroVelocity).unwrap();
        assert_eq!(json, "\"micro_velocity\"");
        assert_eq!("pre_ignition".parse::<StrategyId>(), Ok(StrategyId::PreIgnition));
    }

    #[test]
    fn turnover_is_none_for_unknown_cap() {
        let snap = InstrumentSnapshot::new("foo", 1.0, 0.0, 0.0, 40_000.0, 0.0);
        assert_eq!(snap.symbol, "FOO");
        assert!(snap.turnover().is_none());

        let snap = InstrumentSnapshot::new("FOO", 1.0, 0.0, 0.0, 300_000.0, 2_000_000.0);
        assert!((snap.turnover().unwrap() - 0.15).abs() < 1e-12);
    }

    #[test]
    fn market_state_labels() {
        assert_eq!(
            serde_json::to_string(&MarketState::BullishTrend).unwrap(),
            "\"BULLISH_TREND\""
        );
        for (i, s) in MarketState::ALL.iter().enumerate() {
            assert_eq!(s.index(), i);
        }
    }
}
