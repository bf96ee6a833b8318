use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Majors, stablecoins and wrapped assets. Their relative moves are noise.
pub const DEFAULT_EXCLUDED_SYMBOLS: &[&str] = &[
    // Majors
    "BTC", "ETH", "SOL", "BNB", "XRP", "ADA", "DOGE", "TRX", "TON", "AVAX", "SHIB", "DOT", "LINK",
    "BCH", "NEAR", "LTC", "MATIC", "UNI", "APT", "ICP", "FIL", "ATOM", "RENDER", "IMX", "INJ", "OP",
    "ARB",
    // Stablecoins
    "USDT", "USDC", "DAI", "BUSD", "TUSD", "USDD", "FDUSD", "PYUSD", "USDE", "FRAX", "USDP", "GUSD",
    "LUSD", "SUSD", "USDK", "USDX", "UST", "USTC", "EURT", "EURS", "EUROC", "XAUT", "PAXG",
    // Wrapped
    "WBTC", "WETH", "STETH", "CBETH", "WAVAX", "WSOL", "WBNB",
];

fn default_excluded() -> Vec<String> {
    DEFAULT_EXCLUDED_SYMBOLS.iter().map(|s| s.to_string()).collect()
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub strategies: StrategiesConfig,
    #[serde(default)]
    pub pre_ignition: PreIgnitionConfig,
    #[serde(default)]
    pub acceleration: AccelerationConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub markov: MarkovConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scheduler settings
///
/// Defaults: 300s interval, no chain filter, whale batch of 10,
/// advisor consulted on new tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub interval_secs: u64,
    /// Narrows the provider query (e.g. "solana")
    pub chain_filter: Option<String>,
    pub whale_batch_limit: usize,
    pub advise_new_tracks: bool,
    /// Upper bound for a single notifier call
    pub notify_timeout_secs: u64,
    pub provider_base_url: String,
    pub provider_timeout_secs: u64,
    /// Tickers requested per provider page
    pub provider_page_size: u32,
    pub provider_pages: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            chain_filter: None,
            whale_batch_limit: 10,
            advise_new_tracks: true,
            notify_timeout_secs: 10,
            provider_base_url: "https://api.coingecko.com/api/v3".to_string(),
            provider_timeout_secs: 15,
            provider_page_size: 250,
            provider_pages: 4,
        }
    }
}

/// Market-cap, volume and turnover gates shared by every strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketBand {
    pub min_market_cap: f64,
    pub max_market_cap: f64,
    pub min_volume_24h: f64,
    /// Minimum 24h volume / market cap. Skipped when the cap is unknown.
    pub min_turnover: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategiesConfig {
    #[serde(default)]
    pub standard: StandardConfig,
    #[serde(default)]
    pub micro_velocity: MicroVelocityConfig,
    #[serde(default)]
    pub accumulation: AccumulationConfig,
}

/// Standard strategy: sustained-change profile OR early-riser profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardConfig {
    pub version: u32,
    pub band: MarketBand,
    /// Unknown-cap instruments need at least this much volume
    pub unknown_cap_min_volume: f64,
    pub sustained_min_change_1h: f64,
    pub sustained_min_change_24h: f64,
    pub early_min_change_1h: f64,
    pub early_max_change_24h: f64,
    pub early_min_change_24h: f64,
    pub excluded: Vec<String>,
    pub limit: usize,
}

impl Default for StandardConfig {
    fn default() -> Self {
        Self {
            version: 1,
            band: MarketBand {
                min_market_cap: 50_000.0,
                max_market_cap: 500_000_000.0,
                min_volume_24h: 2_000.0,
                min_turnover: 0.03,
            },
            unknown_cap_min_volume: 50_000.0,
            sustained_min_change_1h: 0.5,
            sustained_min_change_24h: 1.0,
            early_min_change_1h: 1.0,
            early_max_change_24h: 10.0,
            early_min_change_24h: -20.0,
            excluded: default_excluded(),
            limit: 100,
        }
    }
}

/// Micro-velocity strategy: strict cap band, bounded dips allowed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MicroVelocityConfig {
    pub version: u32,
    pub band: MarketBand,
    pub min_change_1h: f64,
    pub min_change_24h: f64,
    pub excluded: Vec<String>,
    pub limit: usize,
}

impl Default for MicroVelocityConfig {
    fn default() -> Self {
        Self {
            version: 1,
            band: MarketBand {
                min_market_cap: 500_000.0,
                max_market_cap: 50_000_000.0,
                min_volume_24h: 1_000.0,
                min_turnover: 0.02,
            },
            min_change_1h: -5.0,
            min_change_24h: -10.0,
            excluded: default_excluded(),
            limit: 100,
        }
    }
}

/// Accumulation strategy: quiet price, warming volume, whale buying
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulationConfig {
    pub version: u32,
    pub band: MarketBand,
    /// Anything above this 24h change has already pumped
    pub max_change_24h: f64,
    pub min_score: u8,
    pub excluded: Vec<String>,
    pub limit: usize,
}

impl Default for AccumulationConfig {
    fn default() -> Self {
        Self {
            version: 1,
            band: MarketBand {
                min_market_cap: 100_000.0,
                max_market_cap: 100_000_000.0,
                min_volume_24h: 1_000.0,
                min_turnover: 0.0,
            },
            max_change_24h: 10.0,
            min_score: 50,
            excluded: default_excluded(),
            limit: 50,
        }
    }
}

/// One pass of pre-ignition gates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreIgnitionGates {
    /// Exclusive bounds on price change since the track was first seen (%)
    pub min_change_since_entry: Option<f64>,
    pub max_change_since_entry: Option<f64>,
    /// Exclusive bounds on 24h change
    pub min_change_24h: Option<f64>,
    pub max_change_24h: Option<f64>,
    /// Exclusive bounds on 1h change
    pub min_change_1h: f64,
    pub max_change_1h: Option<f64>,
    /// Turnover floor when the cap is known
    pub min_turnover: f64,
    /// Volume floor used instead of turnover when the cap is unknown
    pub unknown_cap_min_volume: f64,
    /// Alternative absolute volume floor, accepted in place of velocity
    pub min_volume: Option<f64>,
    /// 1h change below this means distribution
    pub distribution_change_1h: Option<f64>,
}

/// Pre-ignition detection.
///
/// `relaxed` is a fallback used only when the strict pass finds nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreIgnitionConfig {
    pub min_tracked_cycles: u32,
    pub strict: PreIgnitionGates,
    pub relaxed: PreIgnitionGates,
    pub max_candidates: usize,
    pub alert_score: u8,
    /// Alert score used while acceleration sits at its neutral default
    pub fresh_alert_score: u8,
    pub graduation_change_1h: f64,
    pub excluded: Vec<String>,
    /// Loose screen used to prioritise whale lookups
    pub whale_screen: PreIgnitionGates,
}

impl Default for PreIgnitionConfig {
    fn default() -> Self {
        Self {
            min_tracked_cycles: 2,
            strict: PreIgnitionGates {
                min_change_since_entry: Some(-15.0),
                max_change_since_entry: Some(8.0),
                min_change_24h: None,
                max_change_24h: None,
                min_change_1h: 0.5,
                max_change_1h: Some(25.0),
                min_turnover: 0.08,
                unknown_cap_min_volume: 5_000.0,
                min_volume: Some(3_000.0),
                distribution_change_1h: Some(-5.0),
            },
            relaxed: PreIgnitionGates {
                min_change_since_entry: None,
                max_change_since_entry: None,
                min_change_24h: Some(-15.0),
                max_change_24h: Some(15.0),
                min_change_1h: 0.0,
                max_change_1h: None,
                min_turnover: 0.05,
                unknown_cap_min_volume: 10_000.0,
                min_volume: None,
                distribution_change_1h: None,
            },
            max_candidates: 10,
            alert_score: 70,
            fresh_alert_score: 100,
            graduation_change_1h: 5.0,
            excluded: default_excluded(),
            whale_screen: PreIgnitionGates {
                min_change_since_entry: None,
                max_change_since_entry: None,
                min_change_24h: None,
                max_change_24h: None,
                min_change_1h: -10.0,
                max_change_1h: Some(25.0),
                min_turnover: 0.10,
                unknown_cap_min_volume: 20_000.0,
                min_volume: Some(5_000.0),
                distribution_change_1h: Some(-8.0),
            },
        }
    }
}

/// Volume acceleration.
///
/// The synthetic baseline (turnover * cap) and its clamp are fallbacks for
/// symbols with too little history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelerationConfig {
    pub window_days: i64,
    pub max_entries: usize,
    pub min_samples: usize,
    pub synthetic_turnover: f64,
    pub synthetic_min: f64,
    pub synthetic_max: f64,
    pub neutral: f64,
}

impl Default for AccelerationConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            max_entries: 7 * 24,
            min_samples: 3,
            synthetic_turnover: 0.03,
            synthetic_min: 0.5,
            synthetic_max: 20.0,
            neutral: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub ttl_secs: i64,
    pub history_interval_secs: i64,
    pub history_capacity: usize,
    pub markov_min_points: usize,
    /// Drop (%) vs the previous observation that disqualifies a track
    pub volume_drop_pct: f64,
    /// consecutive_hours values that fire an alert, ascending
    pub milestones: Vec<u32>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            history_interval_secs: 900,
            history_capacity: 96,
            markov_min_points: 5,
            volume_drop_pct: 20.0,
            milestones: vec![3, 6],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkovConfig {
    pub window: usize,
    pub min_points: usize,
    pub high_volatility: f64,
    pub flat_change_pct: f64,
    pub extreme_change_pct: f64,
}

impl Default for MarkovConfig {
    fn default() -> Self {
        Self {
            window: 5,
            min_points: 10,
            high_volatility: 0.02,
            flat_change_pct: 0.5,
            extreme_change_pct: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    /// State file; defaults to the platform data dir
    pub path: Option<PathBuf>,
    /// Snapshot log retention
    pub snapshot_retention_hours: i64,
    /// New candidates merge into a snapshot younger than this
    pub snapshot_merge_secs: i64,
    pub active_snapshot_secs: i64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            snapshot_retention_hours: 48,
            snapshot_merge_secs: 120,
            active_snapshot_secs: 900,
        }
    }
}

impl PersistenceConfig {
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => p.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("momentum-radar")
                .join("state.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("scanner.interval_secs", 300)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overlay (e.g. config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("RADAR_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // RADAR__SCANNER__INTERVAL_SECS, RADAR__TRACKER__TTL_SECS, ...
            .add_source(
                Environment::with_prefix("RADAR")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.scanner.interval_secs == 0 {
            errors.push("scanner.interval_secs must be positive".to_string());
        }
        if self.scanner.provider_pages == 0 || self.scanner.provider_page_size == 0 {
            errors.push("scanner.provider_pages and provider_page_size must be positive".to_string());
        }

        let bands = [
            ("standard", &self.strategies.standard.band),
            ("micro_velocity", &self.strategies.micro_velocity.band),
            ("accumulation", &self.strategies.accumulation.band),
        ];
        for (name, band) in bands {
            if band.min_market_cap > band.max_market_cap {
                errors.push(format!(
                    "strategies.{name}: min_market_cap {} exceeds max_market_cap {}",
                    band.min_market_cap, band.max_market_cap
                ));
            }
            if band.min_volume_24h < 0.0 || band.min_turnover < 0.0 {
                errors.push(format!("strategies.{name}: volume and turnover floors must be >= 0"));
            }
        }

        for (name, limit) in [
            ("standard", self.strategies.standard.limit),
            ("micro_velocity", self.strategies.micro_velocity.limit),
            ("accumulation", self.strategies.accumulation.limit),
        ] {
            if limit == 0 {
                errors.push(format!("strategies.{name}.limit must be positive"));
            }
        }

        if self.strategies.accumulation.min_score > 100 {
            errors.push("strategies.accumulation.min_score must be <= 100".to_string());
        }

        if self.pre_ignition.fresh_alert_score < self.pre_ignition.alert_score {
            errors.push(
                "pre_ignition.fresh_alert_score should not be below alert_score".to_string(),
            );
        }

        let acc = &self.acceleration;
        if acc.synthetic_min > acc.synthetic_max {
            errors.push("acceleration.synthetic_min exceeds synthetic_max".to_string());
        }
        if acc.min_samples == 0 || acc.max_entries == 0 {
            errors.push("acceleration.min_samples and max_entries must be positive".to_string());
        }

        if self.tracker.ttl_secs <= 0 {
            errors.push("tracker.ttl_secs must be positive".to_string());
        }
        if self.tracker.history_capacity == 0 {
            errors.push("tracker.history_capacity must be positive".to_string());
        }
        if self.tracker.milestones.windows(2).any(|w| w[0] >= w[1]) {
            errors.push("tracker.milestones must be strictly ascending".to_string());
        }

        if self.markov.window == 0 || self.markov.min_points <= self.markov.window {
            errors.push("markov.min_points must exceed markov.window (> 0)".to_string());
        }

        let tg = &self.notifier;
        if tg.telegram_bot_token.is_some() != tg.telegram_chat_id.is_some() {
            errors.push(
                "notifier.telegram_bot_token and telegram_chat_id must be set together".to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// [`validate`](Self::validate) folded into one error for callers using `?`
    pub fn ensure_valid(&self) -> crate::error::Result<()> {
        self.validate().map_err(|problems| {
            crate::error::RadarError::Validation(format!(
                "{} problem(s): {}",
                problems.len(),
                problems.join("; ")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.strategies.standard.band.min_market_cap, 50_000.0);
        assert_eq!(cfg.strategies.micro_velocity.band.min_turnover, 0.02);
        assert_eq!(cfg.tracker.milestones, vec![3, 6]);
        assert!(cfg.strategies.standard.excluded.iter().any(|s| s == "USDT"));
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut cfg = AppConfig::default();
        cfg.scanner.interval_secs = 0;
        cfg.strategies.micro_velocity.band.min_market_cap = 1e9;
        cfg.tracker.milestones = vec![6, 3];

        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("micro_velocity")));
    }

    #[test]
    fn ensure_valid_reports_problems_as_validation_error() {
        assert!(AppConfig::default().ensure_valid().is_ok());

        let mut cfg = AppConfig::default();
        cfg.scanner.interval_secs = 0;
        match cfg.ensure_valid() {
            Err(crate::error::RadarError::Validation(msg)) => {
                assert!(msg.starts_with("1 problem(s)"));
                assert!(msg.contains("scanner.interval_secs"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn load_from_reads_default_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            "[scanner]\ninterval_secs = 60\n\n[tracker]\nttl_secs = 120\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(cfg.scanner.interval_secs, 60);
        assert_eq!(cfg.tracker.ttl_secs, 120);
        // untouched sections keep their defaults
        assert_eq!(cfg.tracker.history_capacity, 96);
        assert_eq!(cfg.markov.min_points, 10);
    }
}
