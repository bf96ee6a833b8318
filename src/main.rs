use anyhow::Context;
use clap::Parser;
use momentum_radar::cli::{self, Cli, Commands};
use momentum_radar::config::AppConfig;
use momentum_radar::scanner::spawn_scanner;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let mut config = AppConfig::load_from(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;
    if args.chain.is_some() {
        config.scanner.chain_filter = args.chain.clone();
    }
    config.ensure_valid().context("invalid configuration")?;

    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            init_logging(&config);
            run_scheduler(&config).await?;
        }
        Commands::Scan { strategy } => {
            init_logging_simple();
            let mut orch = cli::build_orchestrator(&config)?;
            orch.load_state().await;
            let report = orch.run_cycle().await?;
            println!(
                "Scanned {} tickers: {} standard, {} micro, {} accumulation, {} pre-ignition{}",
                report.batch_size,
                report.standard,
                report.micro_velocity,
                report.accumulation,
                report.pre_ignition,
                if report.relaxed_pre_ignition { " (relaxed)" } else { "" }
            );
            cli::print_tracks(&orch.persistence_list(strategy));
        }
        Commands::Purge => {
            init_logging_simple();
            cli::build_store(&config).clear().await?;
            println!("Radar state purged.");
        }
        Commands::Status { strategy } => {
            init_logging_simple();
            let mut tracks: Vec<_> = cli::build_store(&config)
                .load()
                .await?
                .map(|s| s.tracks.into_values().collect())
                .unwrap_or_default();
            tracks.retain(|t: &momentum_radar::domain::PersistenceTrack| {
                strategy.map_or(true, |s| t.strategy == s)
            });
            tracks.sort_by(|a, b| {
                b.consecutive_hours
                    .cmp(&a.consecutive_hours)
                    .then_with(|| a.symbol.cmp(&b.symbol))
            });
            cli::print_tracks(&tracks);
        }
    }

    Ok(())
}

async fn run_scheduler(config: &AppConfig) -> anyhow::Result<()> {
    let orch = cli::build_orchestrator(config)?;
    let (handle, task) = spawn_scanner(orch, true);

    let mut alerts = handle.subscribe_alerts();
    tokio::spawn(async move {
        while let Ok(alert) = alerts.recv().await {
            info!(symbol = %alert.symbol, kind = ?alert.kind, "Alert issued");
        }
    });

    info!("Radar running, press Ctrl+C to stop");
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }

    info!("Shutting down, saving state");
    if let Err(e) = handle.shutdown().await {
        warn!("Scanner already stopped: {}", e);
    }
    task.await.context("scanner task failed")?;
    Ok(())
}

fn init_logging(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},momentum_radar=debug,reqwest=warn",
            config.logging.level
        ))
    });

    // `rolling::daily` aborts on an unwritable directory, so preflight it
    let file_layer = std::env::var("RADAR_LOG_DIR").ok().and_then(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!("Warning: Could not create log directory {log_dir} ({e}), file logging disabled");
            return None;
        }
        let probe = std::path::Path::new(&log_dir).join(".radar_write_test");
        match std::fs::OpenOptions::new().create(true).append(true).open(&probe) {
            Ok(_) => {
                let _ = std::fs::remove_file(&probe);
                let appender = tracing_appender::rolling::daily(&log_dir, "radar.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                // lives for the whole process
                Box::leak(Box::new(guard));
                eprintln!("Logging to: {log_dir}/radar.log");
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!("Warning: Could not write to log directory {log_dir} ({e}), file logging disabled");
                None
            }
        }
    });

    let console_layer = if config.logging.json {
        tracing_subscriber::fmt::layer().json().with_target(true).boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}

fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
