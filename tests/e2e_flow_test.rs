// End-to-End Flow Tests for Liquidation Watch
//
// These tests exercise the full alert path without network connections:
//   raw feed frame -> Parser -> Classifier -> Dispatcher -> recording sink
// plus the refresher -> store path with mock snapshot sources.
//
// Run with: cargo test --test e2e_flow_test

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

use liquidation_watch::core::types::{Alert, AlertVariant, Direction};
use liquidation_watch::core::{BinanceConfig, UniverseConfig};
use liquidation_watch::layer1::websocket::LiquidationStream;
use liquidation_watch::layer1::RestClientError;
use liquidation_watch::layer2::refresher::{
    LinearTickerSource, SymbolVolume, UniverseRefresher, VolumeTickerSource,
};
use liquidation_watch::layer2::universe_store::{SymbolUniverse, UniverseStore};
use liquidation_watch::layer3::classifier::EventClassifier;
use liquidation_watch::layer3::notifier::{AlertDispatcher, AlertSink, NotifyError};
use liquidation_watch::AlertPipeline;

const CHANNEL_ID: i64 = -1002304776308;
const MIN_NOTIONAL: f64 = 15_000.0;

// ============================================================================
// Helpers
// ============================================================================

/// Build a forceOrder frame the way the live feed sends it.
fn make_liquidation_json(symbol: &str, side: &str, qty: &str, price: &str) -> String {
    format!(
        r#"{{"e":"forceOrder","E":1700000000000,"o":{{"s":"{symbol}","S":"{side}","o":"LIMIT","f":"IOC","q":"{qty}","p":"{price}","ap":"{price}","X":"FILLED","l":"{qty}","z":"{qty}","T":1700000000000}}}}"#,
    )
}

fn universe(top: &[&str], bybit: &[&str]) -> SymbolUniverse {
    SymbolUniverse::new(
        top.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
        bybit.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
    )
}

struct RecordingSink {
    sent: RwLock<Vec<Alert>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self { sent: RwLock::new(Vec::new()) })
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.sent.write().push(alert.clone());
        Ok(())
    }
}

/// Pipeline wired to a recording sink. The store starts empty unless a
/// universe is supplied.
fn build_pipeline(
    seed: Option<SymbolUniverse>,
) -> (AlertPipeline, Arc<RecordingSink>, Arc<UniverseStore>) {
    let store = Arc::new(UniverseStore::new());
    if let Some(u) = seed {
        store.replace(u);
    }

    let sink = RecordingSink::new();
    let pipeline = AlertPipeline::new(
        Arc::new(LiquidationStream::from_config(&BinanceConfig::default())),
        EventClassifier::new(store.clone(), MIN_NOTIONAL, CHANNEL_ID),
        AlertDispatcher::new(sink.clone()),
    );
    (pipeline, sink, store)
}

// ============================================================================
// TEST 1 - Frames without a liquidation order never dispatch
// ============================================================================

#[tokio::test]
async fn test_non_liquidation_frames_never_dispatch() {
    let (pipeline, sink, _store) = build_pipeline(Some(universe(&[], &[])));

    pipeline.process_message(r#"{"result":null,"id":1}"#).await;
    pipeline.process_message(r#"{"e":"aggTrade","E":1,"s":"BTCUSDT"}"#).await;
    pipeline.process_message(r#"{}"#).await;

    assert!(sink.sent.read().is_empty());
    let stats = pipeline.get_stats();
    assert_eq!(stats.parser.frames_ignored, 3);
    assert_eq!(stats.classifier.events_seen, 0);
}

// ============================================================================
// TEST 2 - Notional threshold
// ============================================================================

#[tokio::test]
async fn test_below_threshold_never_dispatches() {
    // DOGEUSDT is in neither set; size alone decides.
    let (pipeline, sink, _store) = build_pipeline(Some(universe(&["BTCUSDT"], &["DOGEUSDT"])));

    // 1000 * 0.2 = 200 USD, far below the limit.
    pipeline
        .process_message(&make_liquidation_json("DOGEUSDT", "BUY", "1000", "0.2"))
        .await;

    assert!(sink.sent.read().is_empty());
    assert_eq!(pipeline.get_stats().classifier.suppressed_below_threshold, 1);
}

// ============================================================================
// TEST 3 - Top-volume suppression
// ============================================================================

#[tokio::test]
async fn test_top_symbol_suppressed_even_when_large() {
    let (pipeline, sink, _store) = build_pipeline(Some(universe(&["BTCUSDT"], &[])));

    // 100 * 50000 = 5M USD, still suppressed by universe membership.
    pipeline
        .process_message(&make_liquidation_json("BTCUSDT", "SELL", "100", "50000"))
        .await;

    assert!(sink.sent.read().is_empty());
    assert_eq!(pipeline.get_stats().classifier.suppressed_top_symbol, 1);
}

// ============================================================================
// TEST 4 - Direction mapping
// ============================================================================

#[tokio::test]
async fn test_direction_mapping_buy_short_sell_long() {
    let (pipeline, sink, _store) = build_pipeline(Some(universe(&[], &[])));

    pipeline
        .process_message(&make_liquidation_json("ARBUSDT", "BUY", "20000", "1.0"))
        .await;
    pipeline
        .process_message(&make_liquidation_json("OPUSDT", "SELL", "20000", "1.0"))
        .await;

    let sent = sink.sent.read();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].symbol, "ARBUSDT");
    assert_eq!(sent[0].direction, Direction::Short);
    assert_eq!(sent[1].symbol, "OPUSDT");
    assert_eq!(sent[1].direction, Direction::Long);
}

// ============================================================================
// TEST 5 - Variant selection by Bybit listing
// ============================================================================

#[tokio::test]
async fn test_variant_selection() {
    let (pipeline, sink, _store) =
        build_pipeline(Some(universe(&["BTCUSDT"], &["DOGEUSDT"])));

    pipeline
        .process_message(&make_liquidation_json("DOGEUSDT", "BUY", "100000", "0.2"))
        .await;
    pipeline
        .process_message(&make_liquidation_json("PEPEUSDT", "BUY", "2000000000", "0.00001"))
        .await;

    let sent = sink.sent.read();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].variant, AlertVariant::BinanceBybit);
    assert_eq!(sent[1].variant, AlertVariant::BinanceOnly);
}

// ============================================================================
// TEST 6 - Reference scenario from the feed
// ============================================================================

#[tokio::test]
async fn test_doge_scenario_dispatches_cross_listed_short() {
    let (pipeline, sink, _store) =
        build_pipeline(Some(universe(&["BTCUSDT", "ETHUSDT"], &["DOGEUSDT"])));

    pipeline
        .process_message(r#"{"o":{"s":"DOGEUSDT","S":"BUY","q":"100000","p":"0.2"}}"#)
        .await;

    let sent = sink.sent.read();
    assert_eq!(sent.len(), 1);
    let alert = &sent[0];
    assert_eq!(alert.channel_id, CHANNEL_ID);
    assert_eq!(alert.symbol, "DOGEUSDT");
    assert_eq!(alert.direction, Direction::Short);
    assert_eq!(alert.notional_usd, "20000.00");
    assert_eq!(alert.price, 0.2);
    assert_eq!(alert.variant, AlertVariant::BinanceBybit);
}

#[tokio::test]
async fn test_doge_scenario_small_quantity_no_dispatch() {
    let (pipeline, sink, _store) =
        build_pipeline(Some(universe(&["BTCUSDT", "ETHUSDT"], &["DOGEUSDT"])));

    pipeline
        .process_message(r#"{"o":{"s":"DOGEUSDT","S":"BUY","q":"1000","p":"0.2"}}"#)
        .await;

    assert!(sink.sent.read().is_empty());
}

// ============================================================================
// TEST 7 - Events before the first refresh are dropped
// ============================================================================

#[tokio::test]
async fn test_events_dropped_until_store_ready() {
    let (pipeline, sink, store) = build_pipeline(None);

    pipeline
        .process_message(&make_liquidation_json("DOGEUSDT", "BUY", "100000", "0.2"))
        .await;
    assert!(sink.sent.read().is_empty());
    assert_eq!(pipeline.get_stats().classifier.dropped_not_ready, 1);

    // Once a universe lands, the same event dispatches.
    store.replace(universe(&[], &["DOGEUSDT"]));
    pipeline
        .process_message(&make_liquidation_json("DOGEUSDT", "BUY", "100000", "0.2"))
        .await;
    assert_eq!(sink.sent.read().len(), 1);
}

// ============================================================================
// TEST 8 - Refresher end-to-end with mock snapshot sources
// ============================================================================

struct MockVolumeSource {
    rows: Vec<(String, f64)>,
    fail: bool,
}

#[async_trait]
impl VolumeTickerSource for MockVolumeSource {
    async fn ticker_volumes(&self) -> Result<Vec<SymbolVolume>, RestClientError> {
        if self.fail {
            return Err(RestClientError::Api { code: -1, message: "snapshot down".to_string() });
        }
        Ok(self
            .rows
            .iter()
            .map(|(symbol, quote_volume)| SymbolVolume {
                symbol: symbol.clone(),
                quote_volume: *quote_volume,
            })
            .collect())
    }
}

struct MockLinearSource {
    symbols: Vec<String>,
}

#[async_trait]
impl LinearTickerSource for MockLinearSource {
    async fn linear_symbols(&self) -> Result<Vec<String>, RestClientError> {
        Ok(self.symbols.clone())
    }
}

#[tokio::test]
async fn test_refresher_selects_top_fifty_of_sixty() {
    let rows: Vec<(String, f64)> = (0..60)
        .map(|i| (format!("SYM{:02}USDT", i), 1000.0 + i as f64))
        .collect();

    let store = Arc::new(UniverseStore::new());
    let refresher = UniverseRefresher::new(
        store.clone(),
        Arc::new(MockVolumeSource { rows, fail: false }),
        Arc::new(MockLinearSource { symbols: vec![] }),
        UniverseConfig::default(),
    );

    refresher.refresh_once().await.unwrap();

    let top = &store.snapshot().binance_top;
    assert_eq!(top.len(), 50);
    // The ten lowest-volume symbols are the ones cut.
    for i in 0..10 {
        assert!(!top.contains(&format!("SYM{:02}USDT", i)));
    }
    for i in 10..60 {
        assert!(top.contains(&format!("SYM{:02}USDT", i)));
    }
}

#[tokio::test]
async fn test_refresher_failure_keeps_previous_universe() {
    let store = Arc::new(UniverseStore::new());

    let good = UniverseRefresher::new(
        store.clone(),
        Arc::new(MockVolumeSource {
            rows: vec![("BTCUSDT".to_string(), 9e9)],
            fail: false,
        }),
        Arc::new(MockLinearSource { symbols: vec!["DOGEUSDT".to_string()] }),
        UniverseConfig::default(),
    );
    good.refresh_once().await.unwrap();

    let bad = UniverseRefresher::new(
        store.clone(),
        Arc::new(MockVolumeSource { rows: vec![], fail: true }),
        Arc::new(MockLinearSource { symbols: vec![] }),
        UniverseConfig::default(),
    );
    assert!(bad.refresh_once().await.is_err());

    let current = store.snapshot();
    assert!(current.is_top_symbol("BTCUSDT"));
    assert!(current.is_bybit_listed("DOGEUSDT"));
    assert_eq!(store.get_stats().replace_count, 1);
}

// ============================================================================
// TEST 9 - Refreshed universe drives classification
// ============================================================================

#[tokio::test]
async fn test_refresh_then_classify_flow() {
    let store = Arc::new(UniverseStore::new());
    let refresher = UniverseRefresher::new(
        store.clone(),
        Arc::new(MockVolumeSource {
            rows: vec![
                ("BTCUSDT".to_string(), 9e9),
                ("DOGEUSDT".to_string(), 1e6),
                ("ETHBTC".to_string(), 5e9), // wrong quote asset, filtered out
            ],
            fail: false,
        }),
        Arc::new(MockLinearSource {
            symbols: vec!["DOGEUSDT".to_string(), "BTCUSD".to_string()],
        }),
        UniverseConfig {
            top_symbol_count: 1,
            ..UniverseConfig::default()
        },
    );
    refresher.refresh_once().await.unwrap();

    let sink = RecordingSink::new();
    let pipeline = AlertPipeline::new(
        Arc::new(LiquidationStream::from_config(&BinanceConfig::default())),
        EventClassifier::new(store, MIN_NOTIONAL, CHANNEL_ID),
        AlertDispatcher::new(sink.clone()),
    );

    // BTCUSDT is the single top symbol: suppressed.
    pipeline
        .process_message(&make_liquidation_json("BTCUSDT", "BUY", "10", "50000"))
        .await;
    // DOGEUSDT survives the filter and is Bybit-listed.
    pipeline
        .process_message(&make_liquidation_json("DOGEUSDT", "BUY", "100000", "0.2"))
        .await;

    let sent = sink.sent.read();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].symbol, "DOGEUSDT");
    assert_eq!(sent[0].variant, AlertVariant::BinanceBybit);
}
