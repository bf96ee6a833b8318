//! Alert Manager
//!
//! Every alert is broadcast to in-process subscribers and, when a sink is
//! configured, handed to it on a spawned task bounded by a timeout. The scan
//! cycle never waits for delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::adapters::AlertSink;
use crate::domain::{AdvisorVerdict, PersistenceTrack, StrategyId};
use crate::strategy::{Graduation, PreIgnitionCandidate};

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
}

impl AlertLevel {
    pub fn emoji(&self) -> &'static str {
        match self {
            AlertLevel::Info => "\u{2139}\u{fe0f}",
            AlertLevel::Warning => "\u{1f525}",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertKind {
    PersistenceMilestone { hours: u32 },
    PreIgnition,
    Graduation,
    AdvisorPick,
}

impl AlertKind {
    pub fn title(&self) -> String {
        match self {
            AlertKind::PersistenceMilestone { hours } => format!("Persistent momentum ({hours}h)"),
            AlertKind::PreIgnition => "Pre-ignition".to_string(),
            AlertKind::Graduation => "Graduated to pumping".to_string(),
            AlertKind::AdvisorPick => "Advisor pick".to_string(),
        }
    }
}

/// Alert payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub symbol: String,
    pub strategy: StrategyId,
    pub score: Option<u8>,
    pub price: f64,
    pub change_1h: f64,
    pub change_24h: f64,
    pub volume_24h: f64,
    pub market_cap: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    fn from_track(kind: AlertKind, level: AlertLevel, t: &PersistenceTrack, now: DateTime<Utc>) -> Self {
        Self {
            kind,
            level,
            symbol: t.symbol.clone(),
            strategy: t.strategy,
            score: t.pre_ignition_score.or(t.accumulation_score),
            price: t.last_seen_price,
            change_1h: t.last_seen_change_1h,
            change_24h: t.last_seen_change_24h,
            volume_24h: t.last_seen_volume,
            market_cap: t.last_seen_market_cap,
            message: String::new(),
            timestamp: now,
        }
    }

    pub fn milestone(track: &PersistenceTrack, hours: u32, now: DateTime<Utc>) -> Self {
        let mut alert = Self::from_track(
            AlertKind::PersistenceMilestone { hours },
            AlertLevel::Info,
            track,
            now,
        );
        alert.message = format!(
            "{} has held {} momentum for {} consecutive cycles",
            track.symbol,
            track.strategy.label(),
            hours
        );
        alert
    }

    pub fn pre_ignition(c: &PreIgnitionCandidate, now: DateTime<Utc>) -> Self {
        let s = &c.candidate.snapshot;
        let accel = c.candidate.volume_acceleration.unwrap_or(1.0);
        Self {
            kind: AlertKind::PreIgnition,
            level: AlertLevel::Warning,
            symbol: s.symbol.clone(),
            strategy: StrategyId::PreIgnition,
            score: Some(c.score()),
            price: s.price,
            change_1h: s.change_1h,
            change_24h: s.change_24h,
            volume_24h: s.volume_24h,
            market_cap: s.market_cap,
            message: format!(
                "Coiling with {:.1}x volume, pressure {} {:+.1}{}",
                accel,
                c.pressure.direction,
                c.pressure.net_buy_pressure,
                if c.relaxed { " (relaxed pass)" } else { "" }
            ),
            timestamp: now,
        }
    }

    pub fn graduation(g: &Graduation, track: &PersistenceTrack, now: DateTime<Utc>) -> Self {
        let mut alert = Self::from_track(AlertKind::Graduation, AlertLevel::Warning, track, now);
        alert.score = Some(g.last_score);
        alert.change_1h = g.change_1h;
        alert.message = format!("{} broke out {:+.1}% in 1h", g.symbol, g.change_1h);
        alert
    }

    pub fn advisor_pick(track: &PersistenceTrack, verdict: &AdvisorVerdict, now: DateTime<Utc>) -> Self {
        let mut alert = Self::from_track(AlertKind::AdvisorPick, AlertLevel::Info, track, now);
        alert.score = Some(verdict.score);
        alert.message = match &verdict.plan {
            Some(plan) => format!(
                "{} | entry {} SL {} TP {}",
                plan.trend,
                format_price(plan.entry),
                format_price(plan.stop_loss),
                format_price(plan.take_profit)
            ),
            None => verdict.reason.clone(),
        };
        alert
    }

    /// Plain-text rendering used by chat sinks
    pub fn format_text(&self) -> String {
        let score = self
            .score
            .map(|s| format!(" | Score: {s}/100"))
            .unwrap_or_default();
        format!(
            "{} {} | {} [{}]\nPrice: ${} | 1h: {:+.2}% | 24h: {:+.2}%\nVol: ${:.0} | MCap: ${:.0}{}\n{}",
            self.level.emoji(),
            self.kind.title(),
            self.symbol,
            self.strategy.label(),
            format_price(self.price),
            self.change_1h,
            self.change_24h,
            self.volume_24h,
            self.market_cap,
            score,
            self.message
        )
    }
}

fn format_price(p: f64) -> String {
    if p < 1.0 {
        format!("{p:.6}")
    } else {
        format!("{p:.2}")
    }
}

/// Configuration for alert manager
#[derive(Debug, Clone)]
pub struct AlertManagerConfig {
    /// Upper bound for a single sink delivery (default: 10s)
    pub delivery_timeout: Duration,
    /// Broadcast buffer for in-process subscribers
    pub channel_capacity: usize,
}

impl Default for AlertManagerConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(10),
            channel_capacity: 64,
        }
    }
}

pub struct AlertManager {
    config: AlertManagerConfig,
    sink: Option<Arc<dyn AlertSink>>,
    event_tx: broadcast::Sender<Alert>,
    sent: AtomicU64,
}

impl AlertManager {
    pub fn new(config: AlertManagerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            config,
            sink: None,
            event_tx,
            sent: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(AlertManagerConfig::default())
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.event_tx.subscribe()
    }

    /// Alerts issued since startup
    pub fn alerts_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Broadcast and dispatch without waiting for the sink
    pub fn alert(&self, alert: Alert) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        info!(
            symbol = %alert.symbol,
            strategy = %alert.strategy,
            level = %alert.level,
            "{}: {}",
            alert.kind.title(),
            alert.message
        );

        // No subscribers is fine
        let _ = self.event_tx.send(alert.clone());

        let Some(sink) = self.sink.clone() else {
            return;
        };
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                warn!(symbol = %alert.symbol, "No runtime available, alert not delivered");
                return;
            }
        };

        let timeout = self.config.delivery_timeout;
        handle.spawn(async move {
            match tokio::time::timeout(timeout, sink.deliver(&alert)).await {
                Ok(Ok(())) => debug!(symbol = %alert.symbol, "Alert delivered"),
                Ok(Err(e)) => warn!(symbol = %alert.symbol, "Alert delivery failed: {}", e),
                Err(_) => warn!(
                    symbol = %alert.symbol,
                    "Alert delivery timed out after {:?}", timeout
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAlertSink;
    use crate::domain::{Candidate, InstrumentSnapshot};
    use crate::error::RadarError;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn track() -> PersistenceTrack {
        let c = Candidate::new(
            InstrumentSnapshot::new("foo", 0.0123, 1.5, 3.0, 300_000.0, 2_000_000.0),
            StrategyId::MicroVelocity,
        );
        PersistenceTrack::from_candidate(&c, now())
    }

    #[test]
    fn alert_level_ordering() {
        assert!(AlertLevel::Info < AlertLevel::Warning);
    }

    #[test]
    fn milestone_text_carries_metrics() {
        let alert = Alert::milestone(&track(), 3, now());
        let text = alert.format_text();
        assert_eq!(alert.kind, AlertKind::PersistenceMilestone { hours: 3 });
        assert!(text.contains("FOO"));
        assert!(text.contains("MICRO"));
        assert!(text.contains("0.012300"));
        assert!(text.contains("+1.50%"));
    }

    #[tokio::test]
    async fn subscribers_receive_every_alert() {
        let manager = AlertManager::with_defaults();
        let mut rx = manager.subscribe();

        manager.alert(Alert::milestone(&track(), 3, now()));
        manager.alert(Alert::milestone(&track(), 6, now()));

        assert_eq!(rx.recv().await.unwrap().kind, AlertKind::PersistenceMilestone { hours: 3 });
        assert_eq!(rx.recv().await.unwrap().kind, AlertKind::PersistenceMilestone { hours: 6 });
        assert_eq!(manager.alerts_sent(), 2);
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let mut sink = MockAlertSink::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = std::sync::Mutex::new(Some(tx));
        sink.expect_deliver().times(1).returning(move |_| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
            Err(RadarError::Notification("chat not found".into()))
        });

        let manager = AlertManager::with_defaults().with_sink(Arc::new(sink));
        manager.alert(Alert::milestone(&track(), 3, now()));

        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("sink called")
            .unwrap();
        assert_eq!(manager.alerts_sent(), 1);
    }
}
