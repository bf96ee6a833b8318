//! CoinGecko `/coins/markets` provider.
//!
//! Tickers are paged, normalized at the boundary (missing numbers become 0)
//! and handed to the scanner as `InstrumentSnapshot`s.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use super::MarketSnapshotProvider;
use crate::config::ScannerConfig;
use crate::domain::InstrumentSnapshot;
use crate::error::{RadarError, Result};

const PAGE_DELAY: Duration = Duration::from_millis(2500);

/// Raw market row as returned by CoinGecko
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTicker {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_1h_in_currency: Option<f64>,
    #[serde(default)]
    pub contract_address: Option<String>,
}

fn finite_or_zero(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite()).unwrap_or(0.0)
}

impl RawTicker {
    /// Zero-fill missing numeric fields. Rows without a symbol are dropped.
    pub fn normalize(self) -> Option<InstrumentSnapshot> {
        let symbol = self.symbol.filter(|s| !s.trim().is_empty())?;

        let mut snap = InstrumentSnapshot::new(
            symbol.trim(),
            finite_or_zero(self.current_price),
            finite_or_zero(self.price_change_percentage_1h_in_currency),
            finite_or_zero(self.price_change_percentage_24h),
            finite_or_zero(self.total_volume),
            finite_or_zero(self.market_cap),
        );
        if let Some(name) = self.name {
            snap = snap.with_name(name);
        }
        snap.logo = self.image;
        snap.trade_url = self
            .id
            .map(|id| format!("https://www.coingecko.com/en/coins/{id}"));
        snap.contract_address = self.contract_address;
        Some(snap)
    }
}

/// Map a chain filter onto a CoinGecko category id
pub fn chain_category(chain: &str) -> String {
    match chain.trim().to_lowercase().as_str() {
        "solana" | "sol" => "solana-ecosystem".to_string(),
        "ethereum" | "eth" => "ethereum-ecosystem".to_string(),
        "base" => "base-ecosystem".to_string(),
        "bsc" | "bnb" => "binance-smart-chain".to_string(),
        "arbitrum" | "arb" => "arbitrum-ecosystem".to_string(),
        "polygon" => "polygon-ecosystem".to_string(),
        other => other.to_string(),
    }
}

#[derive(Clone)]
pub struct CoinGeckoProvider {
    http: Client,
    base_url: String,
    page_size: u32,
    pages: u32,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str, timeout: Duration, page_size: u32, pages: u32) -> Result<Self> {
        let http = Client::builder()
            .user_agent("momentum-radar/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| RadarError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size: page_size.max(1),
            pages: pages.max(1),
        })
    }

    pub fn from_config(cfg: &ScannerConfig) -> Result<Self> {
        Self::new(
            &cfg.provider_base_url,
            Duration::from_secs(cfg.provider_timeout_secs),
            cfg.provider_page_size,
            cfg.provider_pages,
        )
    }

    fn page_url(&self, page: u32, category: Option<&str>) -> String {
        let mut url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page={}&sparkline=false&price_change_percentage=1h,24h",
            self.base_url, self.page_size, page
        );
        if let Some(cat) = category {
            url.push_str("&category=");
            url.push_str(cat);
        }
        url
    }

    async fn fetch_page(&self, page: u32, category: Option<&str>) -> Result<Vec<RawTicker>> {
        let url = self.page_url(page, category);
        let resp = self.http.get(&url).send().await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RadarError::RateLimited(format!("CoinGecko page {page}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RadarError::Provider(format!("HTTP {}: {}", status, body)));
        }

        Ok(resp.json::<Vec<RawTicker>>().await?)
    }
}

#[async_trait]
impl MarketSnapshotProvider for CoinGeckoProvider {
    async fn fetch(&self, chain_filter: Option<&str>) -> Result<Vec<InstrumentSnapshot>> {
        let category = chain_filter.map(chain_category);
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for page in 1..=self.pages {
            if page > 1 {
                tokio::time::sleep(PAGE_DELAY).await;
            }

            let rows = match self.fetch_page(page, category.as_deref()).await {
                Ok(rows) => rows,
                // The first page is the batch; later pages are best-effort
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(page, "CoinGecko page failed, keeping {} tickers: {}", out.len(), e);
                    break;
                }
            };

            if rows.is_empty() {
                debug!(page, "CoinGecko returned an empty page");
                break;
            }
            for snap in rows.into_iter().filter_map(RawTicker::normalize) {
                if seen.insert(snap.symbol.clone()) {
                    out.push(snap);
                }
            }
        }

        debug!(count = out.len(), "Fetched CoinGecko tickers");
        Ok(out)
    }

    fn name(&self) -> &str {
        "CoinGecko"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_zero_fills_missing_numbers() {
        let raw: RawTicker = serde_json::from_str(
            r#"{"id":"foo-token","symbol":"foo","name":"Foo","current_price":1.5,"total_volume":null}"#,
        )
        .unwrap();
        let snap = raw.normalize().unwrap();

        assert_eq!(snap.symbol, "FOO");
        assert_eq!(snap.name, "Foo");
        assert_eq!(snap.price, 1.5);
        assert_eq!(snap.volume_24h, 0.0);
        assert_eq!(snap.market_cap, 0.0);
        assert_eq!(snap.change_1h, 0.0);
        assert!(snap.has_unknown_cap());
        assert_eq!(
            snap.trade_url.as_deref(),
            Some("https://www.coingecko.com/en/coins/foo-token")
        );
    }

    #[test]
    fn rows_without_symbol_are_dropped() {
        assert!(RawTicker::default().normalize().is_none());
        let blank = RawTicker {
            symbol: Some("  ".into()),
            ..Default::default()
        };
        assert!(blank.normalize().is_none());
    }

    #[test]
    fn chain_filter_maps_to_category() {
        assert_eq!(chain_category("Solana"), "solana-ecosystem");
        assert_eq!(chain_category("bsc"), "binance-smart-chain");
        assert_eq!(chain_category("meme-token"), "meme-token");
    }

    #[test]
    fn page_url_carries_category() {
        let p = CoinGeckoProvider::new("https://example.test/api/v3/", Duration::from_secs(1), 100, 2)
            .unwrap();
        let url = p.page_url(2, Some("solana-ecosystem"));
        assert!(url.starts_with("https://example.test/api/v3/coins/markets?"));
        assert!(url.contains("per_page=100&page=2"));
        assert!(url.ends_with("&category=solana-ecosystem"));
    }
}
