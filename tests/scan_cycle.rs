mod common;

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::broadcast::error::TryRecvError;

use common::{foo, radar, start, ScriptedProvider};
use momentum_radar::config::StrategiesConfig;
use momentum_radar::domain::TrackPhase;
use momentum_radar::persistence::NullStore;
use momentum_radar::strategy::{MarkovRegimeClassifier, StrategyClassifier};
use momentum_radar::{
    AlertKind, InstrumentSnapshot, JsonFileStore, ManualClock, MarketState, StateStore, StrategyId,
    TrackEvent,
};

fn drain_kinds(rx: &mut tokio::sync::broadcast::Receiver<momentum_radar::Alert>) -> Vec<AlertKind> {
    let mut kinds = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(alert) => kinds.push(alert.kind),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    kinds
}

fn coil() -> InstrumentSnapshot {
    InstrumentSnapshot::new("COIL", 1.0, 1.0, 4.0, 600_000.0, 2_000_000.0)
}

fn milestone_hours(rx: &mut tokio::sync::broadcast::Receiver<momentum_radar::Alert>) -> Vec<u32> {
    let mut hours = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(alert) => {
                if let AlertKind::PersistenceMilestone { hours: h } = alert.kind {
                    hours.push(h);
                }
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    hours
}

#[test]
fn quiet_micro_cap_passes_micro_velocity() {
    let classifier = StrategyClassifier::new(StrategiesConfig::default());
    let passed = classifier.classify_micro(&[foo()]);

    assert_eq!(passed.len(), 1);
    assert_eq!(passed[0].strategy, StrategyId::MicroVelocity);
}

#[test]
fn unknown_cap_with_thin_volume_fails_standard() {
    let classifier = StrategyClassifier::new(StrategiesConfig::default());
    let thin = InstrumentSnapshot::new("THIN", 0.5, 2.0, 4.0, 40_000.0, 0.0);

    assert!(classifier.classify_standard(&[thin.clone()]).is_empty());
    assert!(classifier.classify_micro(&[thin]).is_empty());
}

#[test]
fn transition_rows_are_distributions() {
    let markov = MarkovRegimeClassifier::default();
    let states = [
        MarketState::Accumulation,
        MarketState::BullishTrend,
        MarketState::BullishTrend,
        MarketState::Euphoria,
        MarketState::Panic,
        MarketState::BearishTrend,
        MarketState::Accumulation,
    ];
    let matrix = markov.build_transition_matrix(&states);

    for from in MarketState::ALL {
        let sum: f64 = matrix.row(from).iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "{from:?} row sums to {sum}");
    }
    // never left
    assert_eq!(matrix.probability(MarketState::Uncertain, MarketState::Uncertain), 1.0);
}

#[tokio::test]
async fn milestones_alert_once_each() {
    let provider = ScriptedProvider::new();
    for _ in 0..7 {
        provider.push(vec![foo()]);
    }
    let clock = ManualClock::new(start());
    let mut orch = radar(provider, &clock, Arc::new(NullStore));
    let mut rx = orch.alerts().subscribe();

    let mut fired = Vec::new();
    for cycle in 1..=7u32 {
        orch.run_cycle().await.unwrap();
        fired.push((cycle, milestone_hours(&mut rx)));
        clock.advance(Duration::minutes(1));
    }

    assert_eq!(orch.tracker().get("FOO").unwrap().consecutive_hours, 7);
    let with_alerts: Vec<_> = fired.into_iter().filter(|(_, h)| !h.is_empty()).collect();
    assert_eq!(with_alerts, vec![(3, vec![3]), (6, vec![6])]);
}

#[tokio::test]
async fn absent_track_survives_ttl_then_evicts() {
    let bar = InstrumentSnapshot::new("BAR", 2.0, 1.0, 3.0, 400_000.0, 3_000_000.0);
    let provider = ScriptedProvider::new();
    provider.push(vec![foo()]);
    provider.push(vec![bar.clone()]);
    provider.push(vec![bar]);
    let clock = ManualClock::new(start());
    let mut orch = radar(provider, &clock, Arc::new(NullStore));

    orch.run_cycle().await.unwrap();

    clock.advance(Duration::minutes(4));
    orch.run_cycle().await.unwrap();
    assert!(orch.tracker().get("FOO").is_some());

    clock.advance(Duration::minutes(2));
    let report = orch.run_cycle().await.unwrap();
    assert!(orch.tracker().get("FOO").is_none());
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, TrackEvent::Evicted { symbol, .. } if symbol == "FOO")));
}

#[tokio::test]
async fn volume_collapse_disqualifies() {
    let mut drained = foo();
    drained.volume_24h = 225_000.0;
    let provider = ScriptedProvider::new();
    provider.push(vec![foo()]);
    provider.push(vec![drained]);
    let clock = ManualClock::new(start());
    let mut orch = radar(provider, &clock, Arc::new(NullStore));

    orch.run_cycle().await.unwrap();
    clock.advance(Duration::minutes(1));
    let report = orch.run_cycle().await.unwrap();

    assert!(orch.tracker().get("FOO").is_none());
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, TrackEvent::Disqualified { symbol, .. } if symbol == "FOO")));
}

#[tokio::test]
async fn graduation_is_one_way() {
    let base = InstrumentSnapshot::new("COIL", 1.0, 1.0, 4.0, 600_000.0, 2_000_000.0);
    let mut coiled = base.clone();
    coiled.price = 1.02;
    let mut ignited = coiled.clone();
    ignited.change_1h = 7.0;

    let provider = ScriptedProvider::new();
    provider.push(vec![base.clone()]);
    provider.push(vec![base]);
    provider.push(vec![coiled.clone()]);
    provider.push(vec![ignited]);
    provider.push(vec![coiled]);
    let clock = ManualClock::new(start());
    let mut orch = radar(provider, &clock, Arc::new(NullStore));

    for _ in 0..2 {
        orch.run_cycle().await.unwrap();
        clock.advance(Duration::minutes(1));
    }

    let watched = orch.run_cycle().await.unwrap();
    assert_eq!(watched.pre_ignition, 1);
    assert!(!watched.relaxed_pre_ignition);
    assert!(orch.detector().is_protected("COIL"));
    clock.advance(Duration::minutes(1));

    let ignition = orch.run_cycle().await.unwrap();
    assert_eq!(ignition.graduations.len(), 1);
    assert_eq!(ignition.graduations[0].symbol, "COIL");
    let track = orch.tracker().get("COIL").unwrap();
    assert_eq!(track.phase, Some(TrackPhase::Pumping));
    assert!(track.is_graduated());
    clock.advance(Duration::minutes(1));

    // calm again, still never re-enters the watch-list
    let after = orch.run_cycle().await.unwrap();
    assert_eq!(after.pre_ignition, 0);
    assert!(orch.tracker().get("COIL").unwrap().is_graduated());
}

#[tokio::test]
async fn provider_failure_leaves_state_intact() {
    let provider = ScriptedProvider::new();
    provider.push(vec![foo()]);
    provider.push_error("503 from upstream");
    let clock = ManualClock::new(start());
    let mut orch = radar(provider, &clock, Arc::new(NullStore));

    orch.run_cycle().await.unwrap();
    let before = orch.tracker().get("FOO").cloned().unwrap();
    let samples = orch.volume_history().samples("FOO").map(|s| s.len());

    clock.advance(Duration::minutes(1));
    assert!(orch.run_cycle().await.is_err());

    assert_eq!(orch.tracker().get("FOO"), Some(&before));
    assert_eq!(orch.volume_history().samples("FOO").map(|s| s.len()), samples);
    assert_eq!(orch.stats().failed_cycles, 1);
    assert_eq!(orch.stats().cycles, 1);
    assert!(orch.stats().last_error.is_some());
}

#[tokio::test]
async fn empty_batch_skips_cycle() {
    let provider = ScriptedProvider::new();
    provider.push(vec![foo()]);
    provider.push(Vec::new());
    let clock = ManualClock::new(start());
    let mut orch = radar(provider, &clock, Arc::new(NullStore));

    orch.run_cycle().await.unwrap();
    // long enough to evict FOO if the empty batch were processed
    clock.advance(Duration::minutes(10));
    let report = orch.run_cycle().await.unwrap();

    assert!(report.skipped);
    assert_eq!(orch.tracker().len(), 1);
    assert_eq!(orch.stats().cycles, 1);
}

#[tokio::test]
async fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radar.json");
    let clock = ManualClock::new(start());

    let provider = ScriptedProvider::new();
    provider.push(vec![foo()]);
    provider.push(vec![foo()]);
    let mut first = radar(provider, &clock, Arc::new(JsonFileStore::new(&path)));
    first.run_cycle().await.unwrap();
    clock.advance(Duration::minutes(1));
    first.run_cycle().await.unwrap();
    drop(first);

    let mut second = radar(
        ScriptedProvider::new(),
        &clock,
        Arc::new(JsonFileStore::new(&path)),
    );
    second.load_state().await;

    let track = second.tracker().get("FOO").unwrap();
    assert_eq!(track.consecutive_hours, 2);
    assert_eq!(second.volume_history().samples("FOO").map(|s| s.len()), Some(2));
    assert!(second.latest_snapshot().is_some());
}

#[tokio::test]
async fn purge_forgets_everything() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("radar.json")));
    let provider = ScriptedProvider::new();
    provider.push(vec![foo()]);
    let clock = ManualClock::new(start());
    let mut orch = radar(provider, &clock, store.clone());

    orch.run_cycle().await.unwrap();
    assert!(!orch.tracker().is_empty());

    orch.purge().await;

    assert!(orch.tracker().is_empty());
    assert!(orch.volume_history().is_empty());
    assert!(orch.latest_snapshot().is_none());
    assert!(orch.detector().watch_list().is_empty());
    let persisted = store.load().await.unwrap().expect("purge saves an empty state");
    assert!(persisted.is_empty());
}

#[tokio::test]
async fn steady_pre_ignition_alerts_exactly_once() {
    let provider = ScriptedProvider::new();
    for _ in 0..6 {
        provider.push(vec![coil()]);
    }
    let clock = ManualClock::new(start());
    let mut orch = radar(provider, &clock, Arc::new(NullStore));
    let mut rx = orch.alerts().subscribe();

    let mut pre_ignition = Vec::new();
    let mut milestones = Vec::new();
    for cycle in 1..=6u32 {
        orch.run_cycle().await.unwrap();
        for kind in drain_kinds(&mut rx) {
            match kind {
                AlertKind::PreIgnition => pre_ignition.push(cycle),
                AlertKind::PersistenceMilestone { hours } => milestones.push(hours),
                _ => {}
            }
        }
        clock.advance(Duration::minutes(1));
    }

    // first eligible cycle, alongside the 3h milestone
    assert_eq!(pre_ignition, vec![3]);
    assert_eq!(milestones, vec![3, 6]);
    let track = orch.tracker().get("COIL").unwrap();
    assert_eq!(track.strategy, StrategyId::PreIgnition);
    assert_eq!(track.alert_sent_level, 6);
}

#[tokio::test]
async fn graduation_outlives_ttl_when_symbol_stops_qualifying() {
    let mut coiled = coil();
    coiled.price = 1.02;
    // cap above every strategy band, so it is absent from the merged set
    let mut ignited = coiled.clone();
    ignited.change_1h = 7.0;
    ignited.market_cap = 600_000_000.0;

    let provider = ScriptedProvider::new();
    provider.push(vec![coil()]);
    provider.push(vec![coil()]);
    provider.push(vec![coiled]);
    provider.push(vec![ignited]);
    let clock = ManualClock::new(start());
    let mut orch = radar(provider, &clock, Arc::new(NullStore));
    let mut rx = orch.alerts().subscribe();

    for _ in 0..3 {
        orch.run_cycle().await.unwrap();
        clock.advance(Duration::minutes(1));
    }
    assert!(orch.detector().is_protected("COIL"));
    drain_kinds(&mut rx);

    // past the 5 minute TTL since the last update
    clock.advance(Duration::minutes(6));
    let report = orch.run_cycle().await.unwrap();

    assert_eq!(report.merged, 0);
    assert_eq!(report.graduations.len(), 1);
    assert!(!report
        .events
        .iter()
        .any(|e| matches!(e, TrackEvent::Evicted { symbol, .. } if symbol == "COIL")));
    assert!(orch.tracker().get("COIL").unwrap().is_graduated());
    assert!(drain_kinds(&mut rx)
        .iter()
        .any(|k| matches!(k, AlertKind::Graduation)));
}
