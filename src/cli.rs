use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::{CoinGeckoProvider, TelegramNotifier, TrendAdvisor};
use crate::clock::SystemClock;
use crate::config::AppConfig;
use crate::domain::{PersistenceTrack, StrategyId};
use crate::error::Result;
use crate::persistence::{JsonFileStore, NullStore, StateStore};
use crate::scanner::ScanOrchestrator;
use crate::supervisor::{AlertManager, AlertManagerConfig};

#[derive(Parser)]
#[command(name = "radar")]
#[command(version = "0.1.0")]
#[command(about = "Momentum radar: multi-strategy scanner with persistence tracking", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config directory (default.toml, $RADAR_ENV.toml)
    #[arg(short, long, default_value = "config", env = "RADAR_CONFIG_DIR")]
    pub config: String,

    /// Narrow the provider query to one chain (e.g. solana)
    #[arg(long)]
    pub chain: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler until Ctrl+C
    Run,
    /// Run a single cycle and print tracked instruments
    Scan {
        /// Only show one strategy (standard, micro_velocity, accumulation, pre_ignition)
        #[arg(short, long)]
        strategy: Option<StrategyId>,
    },
    /// Delete all persisted radar state
    Purge,
    /// Print persisted tracked instruments without scanning
    Status {
        #[arg(short, long)]
        strategy: Option<StrategyId>,
    },
}

/// Persistence backend selected by config
pub fn build_store(cfg: &AppConfig) -> Arc<dyn StateStore> {
    if cfg.persistence.enabled {
        Arc::new(JsonFileStore::new(cfg.persistence.resolved_path()))
    } else {
        Arc::new(NullStore)
    }
}

/// Wire the production collaborators around a new orchestrator
pub fn build_orchestrator(cfg: &AppConfig) -> Result<ScanOrchestrator> {
    let provider = Arc::new(CoinGeckoProvider::from_config(&cfg.scanner)?);

    let mut alerts = AlertManager::new(AlertManagerConfig {
        delivery_timeout: Duration::from_secs(cfg.scanner.notify_timeout_secs.max(1)),
        ..Default::default()
    });
    if let Some(telegram) =
        TelegramNotifier::from_config(&cfg.notifier).or_else(TelegramNotifier::from_env)
    {
        alerts = alerts.with_sink(telegram);
    }

    Ok(ScanOrchestrator::new(
        cfg,
        provider,
        Arc::new(SystemClock),
        build_store(cfg),
        Arc::new(alerts),
    )
    .with_advisor(Arc::new(TrendAdvisor::default())))
}

pub fn print_tracks(tracks: &[PersistenceTrack]) {
    if tracks.is_empty() {
        println!("No tracked instruments.");
        return;
    }

    println!(
        "{:<10} {:<6} {:>5} {:>14} {:>8} {:>8} {:>6} {:<14} {:<8}",
        "SYMBOL", "STRAT", "HOURS", "PRICE", "1H%", "24H%", "SCORE", "REGIME", "PRESSURE"
    );
    for t in tracks {
        let score = t
            .pre_ignition_score
            .or(t.accumulation_score)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let pressure = t
            .pressure_direction
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "-".to_string());
        let graduated = if t.is_graduated() { " 🎓" } else { "" };
        println!(
            "{:<10} {:<6} {:>5} {:>14.6} {:>+8.2} {:>+8.2} {:>6} {:<14} {:<8}{}",
            t.symbol,
            t.strategy.label(),
            t.consecutive_hours,
            t.last_seen_price,
            t.last_seen_change_1h,
            t.last_seen_change_24h,
            score,
            t.markov_state.as_str(),
            pressure,
            graduated
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scan_with_strategy_filter() {
        let cli = Cli::parse_from(["radar", "--chain", "solana", "scan", "-s", "micro_velocity"]);
        assert_eq!(cli.chain.as_deref(), Some("solana"));
        match cli.command {
            Some(Commands::Scan { strategy }) => assert_eq!(strategy, Some(StrategyId::MicroVelocity)),
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn disabled_persistence_uses_null_store() {
        let mut cfg = AppConfig::default();
        cfg.persistence.enabled = false;
        assert_eq!(build_store(&cfg).name(), "NullStore");
    }
}
