//! Scan orchestrator
//!
//! One cycle is fetch -> classify -> score -> persist -> prune. The
//! orchestrator owns every piece of mutable radar state and is driven by a
//! single task, so two cycles never overlap. A fetch failure returns before
//! anything is mutated.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::adapters::{MarketSnapshotProvider, StrategyAdvisor, WhaleAnalyzer};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::domain::{Candidate, InstrumentSnapshot, PersistenceTrack, StrategyId, WhaleReport};
use crate::error::Result;
use crate::persistence::{PersistedState, StateStore};
use crate::strategy::{
    merge_by_priority, Graduation, MarkovRegimeClassifier, PreIgnitionDetector, StrategyClassifier,
    VolumeHistoryStore,
};
use crate::supervisor::{Alert, AlertManager};
use crate::tracking::{CandidateSnapshot, PersistenceTracker, SnapshotEntry, SnapshotLog, TrackEvent};

use super::view::{RadarView, ScanStats};

/// What one cycle did
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub started_at: Option<DateTime<Utc>>,
    pub batch_size: usize,
    pub standard: usize,
    pub micro_velocity: usize,
    pub accumulation: usize,
    pub pre_ignition: usize,
    pub relaxed_pre_ignition: bool,
    pub merged: usize,
    pub events: Vec<TrackEvent>,
    pub graduations: Vec<Graduation>,
    pub alerts: usize,
    /// Provider returned nothing; state untouched
    pub skipped: bool,
}

pub struct ScanOrchestrator {
    provider: Arc<dyn MarketSnapshotProvider>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn StateStore>,
    alerts: Arc<AlertManager>,
    whale: Option<Arc<dyn WhaleAnalyzer>>,
    advisor: Option<Arc<dyn StrategyAdvisor>>,

    classifier: StrategyClassifier,
    detector: PreIgnitionDetector,
    tracker: PersistenceTracker,
    volumes: VolumeHistoryStore,
    snapshots: SnapshotLog,

    interval: std::time::Duration,
    chain_filter: Option<String>,
    whale_batch_limit: usize,
    advise_new_tracks: bool,
    active_window: Duration,

    stats: ScanStats,
    view: Arc<RwLock<RadarView>>,
}

impl ScanOrchestrator {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn MarketSnapshotProvider>,
        clock: Arc<dyn Clock>,
        store: Arc<dyn StateStore>,
        alerts: Arc<AlertManager>,
    ) -> Self {
        let markov = MarkovRegimeClassifier::new(config.markov.clone());
        let persistence = &config.persistence;

        Self {
            provider,
            clock,
            store,
            alerts,
            whale: None,
            advisor: None,
            classifier: StrategyClassifier::new(config.strategies.clone()),
            detector: PreIgnitionDetector::new(
                config.pre_ignition.clone(),
                config.acceleration.neutral,
            ),
            tracker: PersistenceTracker::new(config.tracker.clone(), markov),
            volumes: VolumeHistoryStore::new(config.acceleration.clone()),
            snapshots: SnapshotLog::new(
                Duration::seconds(persistence.snapshot_merge_secs),
                Duration::hours(persistence.snapshot_retention_hours),
            ),
            interval: std::time::Duration::from_secs(config.scanner.interval_secs.max(1)),
            chain_filter: config.scanner.chain_filter.clone(),
            whale_batch_limit: config.scanner.whale_batch_limit,
            advise_new_tracks: config.scanner.advise_new_tracks,
            active_window: Duration::seconds(persistence.active_snapshot_secs),
            stats: ScanStats {
                chain_filter: config.scanner.chain_filter.clone(),
                ..Default::default()
            },
            view: Arc::new(RwLock::new(RadarView::default())),
        }
    }

    pub fn with_whale_analyzer(mut self, analyzer: Arc<dyn WhaleAnalyzer>) -> Self {
        self.whale = Some(analyzer);
        self
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn StrategyAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn interval(&self) -> std::time::Duration {
        self.interval
    }

    pub fn alerts(&self) -> Arc<AlertManager> {
        self.alerts.clone()
    }

    /// Shared view, refreshed after every cycle and state change
    pub fn view_handle(&self) -> Arc<RwLock<RadarView>> {
        self.view.clone()
    }

    pub fn chain_filter(&self) -> Option<&str> {
        self.chain_filter.as_deref()
    }

    pub fn set_chain_filter(&mut self, filter: Option<String>) {
        let filter = filter.filter(|f| !f.trim().is_empty());
        info!(chain = ?filter, "Chain filter updated");
        self.stats.chain_filter = filter.clone();
        self.chain_filter = filter;
    }

    pub fn set_running(&mut self, running: bool) {
        self.stats.running = running;
    }

    pub fn tracker(&self) -> &PersistenceTracker {
        &self.tracker
    }

    pub fn detector(&self) -> &PreIgnitionDetector {
        &self.detector
    }

    pub fn volume_history(&self) -> &VolumeHistoryStore {
        &self.volumes
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Tracks sorted by consecutive hours, optionally for one strategy
    pub fn persistence_list(&self, strategy: Option<StrategyId>) -> Vec<PersistenceTrack> {
        self.tracker.list(strategy)
    }

    pub fn latest_snapshot(&self) -> Option<&CandidateSnapshot> {
        self.snapshots.latest()
    }

    /// Entries seen inside the active window, newest first
    pub fn active_snapshot_entries(&self) -> Vec<SnapshotEntry> {
        let now = self.clock.now();
        let mut entries: Vec<SnapshotEntry> = self
            .snapshots
            .active(now, self.active_window)
            .into_iter()
            .flat_map(|s| s.candidates)
            .collect();
        entries.sort_by(|a, b| b.seen_at.cmp(&a.seen_at));
        entries
    }

    /// Run one full cycle.
    ///
    /// Provider errors are returned untouched and leave every piece of state
    /// as it was. Enrichment and notification failures are logged only.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let now = self.clock.now();
        let mut report = CycleReport {
            started_at: Some(now),
            ..Default::default()
        };
        info!(chain = ?self.chain_filter, "🔍 Scan cycle starting");

        let mut batch = match self.provider.fetch(self.chain_filter.as_deref()).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(provider = self.provider.name(), "Scan cycle aborted, provider failed: {}", e);
                self.stats.failed_cycles += 1;
                self.stats.last_error = Some(e.to_string());
                self.publish().await;
                return Err(e);
            }
        };

        if batch.is_empty() {
            warn!("Provider returned an empty batch, skipping cycle");
            report.skipped = true;
            return Ok(report);
        }
        report.batch_size = batch.len();

        self.derive_missing_changes(&mut batch);

        let standard = self.classifier.classify_standard(&batch);
        let micro = self.classifier.classify_micro(&batch);
        let whales = self.run_whale_batch(&batch, &micro).await;

        let volumes = &self.volumes;
        let acceleration =
            |s: &InstrumentSnapshot| volumes.acceleration(&s.symbol, s.volume_24h, s.market_cap);

        let accumulation = self.classifier.classify_accumulation(&batch, &whales, acceleration);
        let outcome = self
            .detector
            .detect(&batch, self.tracker.tracks(), &whales, acceleration);

        report.standard = standard.len();
        report.micro_velocity = micro.len();
        report.accumulation = accumulation.len();
        report.pre_ignition = outcome.candidates.len();
        report.relaxed_pre_ignition = outcome.relaxed;

        let mut merged = merge_by_priority([standard, micro, accumulation]);
        for c in &mut merged {
            if c.volume_acceleration.is_none() {
                c.volume_acceleration = Some(acceleration(&c.snapshot));
            }
            if c.whale.is_none() {
                c.whale = whales.get(c.symbol()).cloned();
            }
        }
        report.merged = merged.len();

        // graduating symbols left the watch-list but must outlive this cycle's TTL pass
        let mut protected = self.detector.protected_symbols();
        protected.extend(outcome.graduations.iter().map(|g| g.symbol.clone()));
        let mut events = self.tracker.process_cycle(&merged, &protected, now);

        for (symbol, whale) in &whales {
            self.tracker.attach_whale(symbol, whale.clone());
        }

        // `should_alert` reflects the watermark before this cycle's milestones
        for c in &outcome.candidates {
            if let Some(event) = self.tracker.apply_pre_ignition(c) {
                events.push(event);
            }
            if c.should_alert {
                self.alerts.alert(Alert::pre_ignition(c, now));
                self.tracker.mark_alert_sent(c.symbol(), 1);
                report.alerts += 1;
            }
        }

        for g in &outcome.graduations {
            self.tracker.mark_graduated(&g.symbol);
            match self.tracker.get(&g.symbol) {
                Some(track) => {
                    self.alerts.alert(Alert::graduation(g, track, now));
                    report.alerts += 1;
                }
                None => warn!(symbol = %g.symbol, "Graduated symbol has no track, alert skipped"),
            }
        }

        for event in &events {
            if let TrackEvent::Milestone { symbol, hours } = event {
                if let Some(track) = self.tracker.get(symbol) {
                    self.alerts.alert(Alert::milestone(track, *hours, now));
                    report.alerts += 1;
                }
            }
        }

        report.alerts += self.advise_new_tracks(&events, now).await;

        for s in &batch {
            self.volumes.record(&s.symbol, s.volume_24h, now);
        }

        let record = self.snapshots.record(&merged, now);
        let pruned = self.snapshots.prune(now);
        debug!(?record, pruned, "Snapshot log updated");

        self.stats.cycles += 1;
        self.stats.last_scan = Some(now);
        self.stats.last_batch_size = batch.len();
        self.stats.last_candidates = merged.len();
        self.stats.alerts_sent = self.alerts.alerts_sent();
        self.stats.last_error = None;

        info!(
            batch = report.batch_size,
            standard = report.standard,
            micro = report.micro_velocity,
            accumulation = report.accumulation,
            pre_ignition = report.pre_ignition,
            tracked = self.tracker.len(),
            alerts = report.alerts,
            "✅ Scan cycle complete"
        );

        report.events = events;
        report.graduations = outcome.graduations;

        self.save_state().await;
        self.publish().await;
        Ok(report)
    }

    /// Fill a missing 1h change from the previous observation of the symbol
    fn derive_missing_changes(&self, batch: &mut [InstrumentSnapshot]) {
        for s in batch.iter_mut().filter(|s| s.change_1h == 0.0 && s.price > 0.0) {
            if let Some(prev) = self.tracker.last_seen_price(&s.symbol) {
                s.change_1h = (s.price - prev) / prev * 100.0;
            }
        }
    }

    /// Whale lookups for the watch-list, the whale screen, then micro
    /// candidates, one symbol at a time up to the batch limit.
    async fn run_whale_batch(
        &self,
        batch: &[InstrumentSnapshot],
        micro: &[Candidate],
    ) -> HashMap<String, WhaleReport> {
        let mut out = HashMap::new();
        let Some(analyzer) = self.whale.clone() else {
            return out;
        };

        let mut seen = HashSet::new();
        let queue: Vec<(String, Option<String>)> = self
            .detector
            .watch_list()
            .iter()
            .map(|c| &c.candidate.snapshot)
            .chain(self.detector.whale_screen(batch))
            .chain(micro.iter().map(|c| &c.snapshot))
            .filter(|s| seen.insert(s.symbol.clone()))
            .take(self.whale_batch_limit)
            .map(|s| (s.symbol.clone(), s.contract_address.clone()))
            .collect();

        for (symbol, contract) in queue {
            match analyzer.analyze(symbol.clone(), contract).await {
                Ok(Some(report)) => {
                    debug!(symbol = %symbol, score = report.whale_score, "Whale analysis");
                    out.insert(symbol, report);
                }
                Ok(None) => debug!(symbol = %symbol, "No whale data"),
                Err(e) => warn!(symbol = %symbol, "Whale analysis failed: {}", e),
            }
        }
        out
    }

    async fn advise_new_tracks(&mut self, events: &[TrackEvent], now: DateTime<Utc>) -> usize {
        let Some(advisor) = self.advisor.clone().filter(|_| self.advise_new_tracks) else {
            return 0;
        };

        let mut alerts = 0;
        for event in events {
            let TrackEvent::Created { symbol, .. } = event else {
                continue;
            };
            let Some(track) = self.tracker.get(symbol).cloned() else {
                continue;
            };

            match advisor.advise(&track, now).await {
                Ok(verdict) => {
                    if verdict.approved && verdict.plan.is_some() {
                        self.alerts.alert(Alert::advisor_pick(&track, &verdict, now));
                        alerts += 1;
                    }
                    self.tracker.attach_advisor(symbol, verdict);
                }
                Err(e) => warn!(symbol = %symbol, "Advisor failed: {}", e),
            }
        }
        alerts
    }

    /// Restore persisted state. Failures leave the radar empty.
    pub async fn load_state(&mut self) {
        match self.store.load().await {
            Ok(Some(state)) => {
                self.tracker.restore(state.tracks);
                self.volumes.restore(state.volume_history);
                self.snapshots.restore(state.snapshots);
                info!(tracked = self.tracker.len(), "Radar state restored");
            }
            Ok(None) => debug!("Starting with empty radar state"),
            Err(e) => warn!("Failed to load radar state, starting empty: {}", e),
        }
        self.publish().await;
    }

    pub fn export_state(&self) -> PersistedState {
        let mut state = PersistedState::empty(self.clock.now());
        state.tracks = self.tracker.tracks().clone();
        state.volume_history = self.volumes.export();
        state.snapshots = self.snapshots.all().to_vec();
        state
    }

    /// Best-effort save; the radar keeps running in memory on failure
    pub async fn save_state(&self) {
        if let Err(e) = self.store.save(&self.export_state()).await {
            warn!("Failed to save radar state: {}", e);
        }
    }

    /// Forget every track, volume sample, snapshot and watch-list entry
    pub async fn purge(&mut self) {
        self.tracker.clear();
        self.volumes.clear();
        self.snapshots.clear();
        self.detector.clear();
        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear persisted state: {}", e);
        }
        self.save_state().await;
        info!("🧹 Radar state purged");
        self.publish().await;
    }

    pub fn build_view(&self) -> RadarView {
        let mut stats = self.stats.clone();
        stats.alerts_sent = self.alerts.alerts_sent();
        RadarView {
            tracks: self.tracker.list(None),
            latest_snapshot: self.snapshots.latest().cloned(),
            active_entries: self.active_snapshot_entries(),
            watch_list: self.detector.watch_list().to_vec(),
            stats,
        }
    }

    pub async fn publish(&self) {
        let view = self.build_view();
        *self.view.write().await = view;
    }
}
