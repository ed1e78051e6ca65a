// Universe Refresher - periodic rebuild of both symbol sets
// Sole writer of the UniverseStore; fetch failures retain the stale universe

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::core::UniverseConfig;
use crate::layer1::bybit_client::BybitRestClient;
use crate::layer1::rest_client::{BinanceRestClient, RestClientError};
use crate::layer2::universe_store::{SymbolUniverse, UniverseStore};

// ============================================================================
// Snapshot Sources
// ============================================================================

/// One symbol with its 24h traded quote volume.
#[derive(Debug, Clone)]
pub struct SymbolVolume {
    pub symbol: String,
    pub quote_volume: f64,
}

/// Volume-ranked ticker snapshot from the primary venue.
#[async_trait]
pub trait VolumeTickerSource: Send + Sync {
    async fn ticker_volumes(&self) -> Result<Vec<SymbolVolume>, RestClientError>;
}

/// Linear-contract symbol list from the secondary venue.
#[async_trait]
pub trait LinearTickerSource: Send + Sync {
    async fn linear_symbols(&self) -> Result<Vec<String>, RestClientError>;
}

#[async_trait]
impl VolumeTickerSource for BinanceRestClient {
    async fn ticker_volumes(&self) -> Result<Vec<SymbolVolume>, RestClientError> {
        let tickers = self.ticker_24hr().await?;
        Ok(tickers
            .into_iter()
            .map(|ticker| {
                let quote_volume = ticker.quote_volume_usd();
                SymbolVolume { symbol: ticker.symbol, quote_volume }
            })
            .collect())
    }
}

#[async_trait]
impl LinearTickerSource for BybitRestClient {
    async fn linear_symbols(&self) -> Result<Vec<String>, RestClientError> {
        let tickers = self.linear_tickers().await?;
        Ok(tickers.into_iter().map(|ticker| ticker.symbol).collect())
    }
}

// ============================================================================
// Universe Selection
// ============================================================================

/// Top `count` symbols ending in `quote_suffix`, ranked by quote volume.
pub fn select_top_by_volume(
    mut volumes: Vec<SymbolVolume>,
    quote_suffix: &str,
    count: usize,
) -> HashSet<String> {
    volumes.retain(|entry| entry.symbol.ends_with(quote_suffix));
    volumes.sort_by(|a, b| b.quote_volume.total_cmp(&a.quote_volume));
    volumes
        .into_iter()
        .take(count)
        .map(|entry| entry.symbol)
        .collect()
}

/// Linear symbols containing `needle` (the quote asset).
pub fn select_linear_symbols(symbols: Vec<String>, needle: &str) -> HashSet<String> {
    symbols
        .into_iter()
        .filter(|symbol| symbol.contains(needle))
        .collect()
}

// ============================================================================
// Refresher
// ============================================================================

/// Refresher statistics
#[derive(Debug, Clone)]
pub struct RefresherStats {
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
}

impl fmt::Display for RefresherStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Refresher(ok={}, failed={})",
            self.cycles_succeeded, self.cycles_failed
        )
    }
}

/// Periodic task that rebuilds both symbol sets and swaps them into the
/// store. A failed cycle leaves the previous universe in place; the next
/// attempt happens a full period later.
pub struct UniverseRefresher {
    store: Arc<UniverseStore>,
    volume_source: Arc<dyn VolumeTickerSource>,
    linear_source: Arc<dyn LinearTickerSource>,
    config: UniverseConfig,

    cycles_succeeded: RwLock<u64>,
    cycles_failed: RwLock<u64>,
}

impl UniverseRefresher {
    pub fn new(
        store: Arc<UniverseStore>,
        volume_source: Arc<dyn VolumeTickerSource>,
        linear_source: Arc<dyn LinearTickerSource>,
        config: UniverseConfig,
    ) -> Self {
        Self {
            store,
            volume_source,
            linear_source,
            config,
            cycles_succeeded: RwLock::new(0),
            cycles_failed: RwLock::new(0),
        }
    }

    /// One refresh cycle: fetch both snapshots, rebuild, swap.
    /// The store is only touched when both fetches succeed.
    pub async fn refresh_once(&self) -> Result<(), RestClientError> {
        let volumes = self.volume_source.ticker_volumes().await?;
        let linear = self.linear_source.linear_symbols().await?;

        let binance_top = select_top_by_volume(
            volumes,
            &self.config.quote_suffix,
            self.config.top_symbol_count,
        );
        let bybit_linear = select_linear_symbols(linear, &self.config.quote_suffix);

        let universe = SymbolUniverse::new(binance_top, bybit_linear);
        info!(%universe, "Universe refreshed");
        self.store.replace(universe);
        *self.cycles_succeeded.write() += 1;

        Ok(())
    }

    /// Periodic loop. Expects the caller to have run the initial refresh
    /// already (the startup readiness barrier), so it sleeps first.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let period = Duration::from_secs(self.config.refresh_interval_secs);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Universe refresher stopped");
                        return;
                    }
                }
            }

            if let Err(e) = self.refresh_once().await {
                *self.cycles_failed.write() += 1;
                warn!(error = %e, "Universe refresh failed, keeping stale universe");
            }
        }
    }

    pub fn get_stats(&self) -> RefresherStats {
        RefresherStats {
            cycles_succeeded: *self.cycles_succeeded.read(),
            cycles_failed: *self.cycles_failed.read(),
        }
    }
}
