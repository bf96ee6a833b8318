mod common;

use std::sync::Arc;

use common::{foo, radar, start, ScriptedProvider};
use momentum_radar::persistence::NullStore;
use momentum_radar::{spawn_scanner, ManualClock, RadarError};

#[tokio::test]
async fn forced_scan_publishes_view() {
    let provider = ScriptedProvider::new();
    provider.push(vec![foo()]);
    let clock = ManualClock::new(start());
    let orch = radar(provider.clone(), &clock, Arc::new(NullStore));

    let (handle, task) = spawn_scanner(orch, false);

    let report = handle.force_scan().await.unwrap();
    assert_eq!(report.batch_size, 1);

    let view = handle.view().await;
    assert!(!view.stats.running);
    assert_eq!(view.stats.cycles, 1);
    assert!(view.track("FOO").is_some());
    assert_eq!(view.active_entries.len(), 1);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn chain_filter_reaches_provider() {
    let provider = ScriptedProvider::new();
    provider.push(vec![foo()]);
    let clock = ManualClock::new(start());
    let (handle, task) = spawn_scanner(radar(provider.clone(), &clock, Arc::new(NullStore)), false);

    handle.set_chain_filter(Some("solana".into())).await.unwrap();
    handle.force_scan().await.unwrap();

    assert_eq!(provider.filters(), vec![Some("solana".to_string())]);
    assert_eq!(handle.view().await.stats.chain_filter.as_deref(), Some("solana"));

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn purge_through_handle_empties_view() {
    let provider = ScriptedProvider::new();
    provider.push(vec![foo()]);
    let clock = ManualClock::new(start());
    let (handle, task) = spawn_scanner(radar(provider, &clock, Arc::new(NullStore)), false);

    handle.force_scan().await.unwrap();
    handle.purge().await.unwrap();

    let view = handle.view().await;
    assert!(view.tracks.is_empty());
    assert!(view.latest_snapshot.is_none());

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn commands_fail_after_shutdown() {
    let clock = ManualClock::new(start());
    let (handle, task) = spawn_scanner(
        radar(ScriptedProvider::new(), &clock, Arc::new(NullStore)),
        false,
    );

    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert!(matches!(handle.force_scan().await, Err(RadarError::ChannelClosed)));
}
