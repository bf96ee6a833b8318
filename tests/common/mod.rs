#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use momentum_radar::adapters::MarketSnapshotProvider;
use momentum_radar::{
    AlertManager, AppConfig, InstrumentSnapshot, ManualClock, RadarError, Result, ScanOrchestrator,
    StateStore,
};

/// Provider that replays queued batches, then returns empty batches
#[derive(Default)]
pub struct ScriptedProvider {
    batches: Mutex<VecDeque<Result<Vec<InstrumentSnapshot>>>>,
    filters: Mutex<Vec<Option<String>>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, batch: Vec<InstrumentSnapshot>) {
        self.batches.lock().unwrap().push_back(Ok(batch));
    }

    pub fn push_error(&self, reason: &str) {
        self.batches
            .lock()
            .unwrap()
            .push_back(Err(RadarError::Provider(reason.to_string())));
    }

    pub fn filters(&self) -> Vec<Option<String>> {
        self.filters.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketSnapshotProvider for ScriptedProvider {
    async fn fetch(&self, chain_filter: Option<&str>) -> Result<Vec<InstrumentSnapshot>> {
        self.filters
            .lock()
            .unwrap()
            .push(chain_filter.map(str::to_string));
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

/// Quiet micro-cap: passes standard, micro and accumulation
pub fn foo() -> InstrumentSnapshot {
    InstrumentSnapshot::new("FOO", 1.0, 1.0, 3.0, 300_000.0, 2_000_000.0)
}

pub fn radar(
    provider: Arc<ScriptedProvider>,
    clock: &ManualClock,
    store: Arc<dyn StateStore>,
) -> ScanOrchestrator {
    ScanOrchestrator::new(
        &AppConfig::default(),
        provider,
        Arc::new(clock.clone()),
        store,
        Arc::new(AlertManager::with_defaults()),
    )
}
