//! Scanner control surface
//!
//! The orchestrator runs on one task. `ScannerHandle` talks to it over an
//! mpsc channel; the loop multiplexes those commands with the scan interval,
//! so a forced scan and a scheduled one can never run at the same time.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{RadarError, Result};
use crate::supervisor::{Alert, AlertManager};

use super::orchestrator::{CycleReport, ScanOrchestrator};
use super::view::RadarView;

/// Commands accepted by the scanner loop
#[derive(Debug)]
pub enum ScannerCommand {
    /// Resume scheduled cycles (runs one immediately)
    Start,
    /// Pause scheduled cycles; commands are still served
    Stop,
    /// Run one cycle now and report it
    ForceScan(oneshot::Sender<Result<CycleReport>>),
    SetFilter(Option<String>),
    Purge(oneshot::Sender<()>),
    /// Save state and exit the loop
    Shutdown(oneshot::Sender<()>),
}

/// Clonable handle to a running scanner
#[derive(Clone)]
pub struct ScannerHandle {
    tx: mpsc::Sender<ScannerCommand>,
    view: Arc<RwLock<RadarView>>,
    alerts: Arc<AlertManager>,
}

impl ScannerHandle {
    async fn send(&self, cmd: ScannerCommand) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| RadarError::ChannelClosed)
    }

    pub async fn start(&self) -> Result<()> {
        self.send(ScannerCommand::Start).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(ScannerCommand::Stop).await
    }

    pub async fn force_scan(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.send(ScannerCommand::ForceScan(tx)).await?;
        rx.await.map_err(|_| RadarError::ChannelClosed)?
    }

    pub async fn set_chain_filter(&self, filter: Option<String>) -> Result<()> {
        self.send(ScannerCommand::SetFilter(filter)).await
    }

    pub async fn purge(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ScannerCommand::Purge(tx)).await?;
        rx.await.map_err(|_| RadarError::ChannelClosed)
    }

    /// Stop after the in-flight cycle and wait until state is saved
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ScannerCommand::Shutdown(tx)).await?;
        rx.await.map_err(|_| RadarError::ChannelClosed)
    }

    /// Copy of the latest published view
    pub async fn view(&self) -> RadarView {
        self.view.read().await.clone()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }
}

/// Spawn the scanner loop. State is loaded before the first cycle.
pub fn spawn_scanner(orchestrator: ScanOrchestrator, autostart: bool) -> (ScannerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(32);
    let handle = ScannerHandle {
        tx,
        view: orchestrator.view_handle(),
        alerts: orchestrator.alerts(),
    };
    let task = tokio::spawn(run_scanner(orchestrator, rx, autostart));
    (handle, task)
}

async fn run_scanner(mut orch: ScanOrchestrator, mut rx: mpsc::Receiver<ScannerCommand>, autostart: bool) {
    orch.load_state().await;

    let mut running = autostart;
    orch.set_running(running);
    orch.publish().await;

    let mut tick = tokio::time::interval(orch.interval());
    // Never burst-fire cycles after a slow one
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval = ?orch.interval(), running, "Scanner loop starting");

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(ScannerCommand::Start) => {
                    if !running {
                        running = true;
                        orch.set_running(true);
                        info!("▶️ Scanner started");
                        let _ = orch.run_cycle().await;
                        tick.reset();
                    }
                }
                Some(ScannerCommand::Stop) => {
                    if running {
                        running = false;
                        orch.set_running(false);
                        orch.publish().await;
                        info!("⏸️ Scanner stopped");
                    }
                }
                Some(ScannerCommand::ForceScan(reply)) => {
                    debug!("Forced scan requested");
                    let result = orch.run_cycle().await;
                    if reply.send(result).is_err() {
                        debug!("Forced scan requester went away");
                    }
                }
                Some(ScannerCommand::SetFilter(filter)) => {
                    orch.set_chain_filter(filter);
                    orch.publish().await;
                }
                Some(ScannerCommand::Purge(reply)) => {
                    orch.purge().await;
                    let _ = reply.send(());
                }
                Some(ScannerCommand::Shutdown(reply)) => {
                    orch.save_state().await;
                    let _ = reply.send(());
                    break;
                }
                None => {
                    warn!("All scanner handles dropped, shutting down");
                    orch.save_state().await;
                    break;
                }
            },

            _ = tick.tick(), if running => {
                // state is untouched on failure; the next tick retries
                if let Err(e) = orch.run_cycle().await {
                    if e.is_provider_failure() {
                        debug!("Provider unavailable, retrying next tick");
                    } else {
                        warn!("Scheduled cycle failed: {}", e);
                    }
                }
            }
        }
    }

    orch.set_running(false);
    orch.publish().await;
    info!("Scanner loop exited");
}
