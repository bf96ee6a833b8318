//! External collaborators
//!
//! The scanner only sees these traits. Concrete adapters live in the
//! submodules; enrichment and alerting are optional and may be absent.

pub mod advisor;
pub mod coingecko;
pub mod telegram;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{AdvisorVerdict, InstrumentSnapshot, PersistenceTrack, WhaleReport};
use crate::error::Result;
use crate::supervisor::Alert;

pub use advisor::TrendAdvisor;
pub use coingecko::{CoinGeckoProvider, RawTicker};
pub use telegram::TelegramNotifier;

/// Source of normalized ticker batches
#[async_trait]
pub trait MarketSnapshotProvider: Send + Sync {
    /// One batch per call. `chain_filter` narrows the query when supported.
    async fn fetch(&self, chain_filter: Option<&str>) -> Result<Vec<InstrumentSnapshot>>;

    fn name(&self) -> &str {
        "MarketSnapshotProvider"
    }
}

/// On-chain holder and flow analysis
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WhaleAnalyzer: Send + Sync {
    /// `Ok(None)` when the symbol cannot be analyzed
    async fn analyze(
        &self,
        symbol: String,
        contract_address: Option<String>,
    ) -> Result<Option<WhaleReport>>;
}

/// Produces a verdict and optional trading plan for a new track
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StrategyAdvisor: Send + Sync {
    async fn advise(&self, track: &PersistenceTrack, now: DateTime<Utc>) -> Result<AdvisorVerdict>;
}

/// Outbound alert delivery (chat, webhook, ...)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> Result<()>;
}
