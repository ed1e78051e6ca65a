// Event Filter & Classifier
// Universe suppression, notional threshold, direction and template selection

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::core::types::{Alert, AlertVariant, Direction, LiquidationEvent};
use crate::layer2::universe_store::UniverseStore;

/// Classifier statistics
#[derive(Debug, Clone, Default)]
pub struct ClassifierStats {
    pub events_seen: u64,
    pub dropped_not_ready: u64,
    pub suppressed_below_threshold: u64,
    pub suppressed_top_symbol: u64,
    pub alerts_produced: u64,
}

impl fmt::Display for ClassifierStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Classifier(seen={}, not_ready={}, below_threshold={}, top_symbol={}, alerts={})",
            self.events_seen,
            self.dropped_not_ready,
            self.suppressed_below_threshold,
            self.suppressed_top_symbol,
            self.alerts_produced
        )
    }
}

/// Turns liquidation events into alerts.
///
/// An alert comes out iff the notional clears the threshold and the symbol
/// is not one of the top-volume Binance pairs. The template variant depends
/// on whether the symbol is also a Bybit linear contract.
pub struct EventClassifier {
    store: Arc<UniverseStore>,
    min_notional_usd: f64,
    channel_id: i64,
    stats: RwLock<ClassifierStats>,
}

impl EventClassifier {
    pub fn new(store: Arc<UniverseStore>, min_notional_usd: f64, channel_id: i64) -> Self {
        Self {
            store,
            min_notional_usd,
            channel_id,
            stats: RwLock::new(ClassifierStats::default()),
        }
    }

    pub fn classify(&self, event: &LiquidationEvent) -> Option<Alert> {
        let mut stats = self.stats.write();
        stats.events_seen += 1;

        // Until the first refresh lands there is no universe to filter
        // against, and everything would come out as a Binance-only alert.
        if !self.store.is_ready() {
            stats.dropped_not_ready += 1;
            debug!(symbol = %event.symbol, "Universe not ready, dropping event");
            return None;
        }

        let notional = event.notional_usd();
        if notional < self.min_notional_usd {
            stats.suppressed_below_threshold += 1;
            return None;
        }

        let universe = self.store.snapshot();
        if universe.is_top_symbol(&event.symbol) {
            stats.suppressed_top_symbol += 1;
            debug!(symbol = %event.symbol, "Top-volume symbol, suppressed");
            return None;
        }

        let direction = Direction::from_order_side(event.side);
        let variant = if universe.is_bybit_listed(&event.symbol) {
            AlertVariant::BinanceBybit
        } else {
            AlertVariant::BinanceOnly
        };

        stats.alerts_produced += 1;
        Some(Alert {
            channel_id: self.channel_id,
            symbol: event.symbol.clone(),
            direction,
            notional_usd: format!("{:.2}", notional),
            price: event.price,
            variant,
        })
    }

    pub fn get_stats(&self) -> ClassifierStats {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OrderSide;
    use crate::layer2::universe_store::SymbolUniverse;
    use std::collections::HashSet;

    const CHANNEL: i64 = -1002304776308;

    fn ready_store(top: &[&str], bybit: &[&str]) -> Arc<UniverseStore> {
        let store = Arc::new(UniverseStore::new());
        store.replace(SymbolUniverse::new(
            top.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
            bybit.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
        ));
        store
    }

    fn doge_event(quantity: f64) -> LiquidationEvent {
        LiquidationEvent::new("DOGEUSDT".to_string(), OrderSide::Buy, quantity, 0.2)
    }

    #[test]
    fn test_not_ready_store_drops_events() {
        let classifier = EventClassifier::new(Arc::new(UniverseStore::new()), 15_000.0, CHANNEL);
        assert!(classifier.classify(&doge_event(100_000.0)).is_none());
        assert_eq!(classifier.get_stats().dropped_not_ready, 1);
    }

    #[test]
    fn test_below_threshold_suppressed() {
        let store = ready_store(&["BTCUSDT"], &["DOGEUSDT"]);
        let classifier = EventClassifier::new(store, 15_000.0, CHANNEL);
        // 1000 * 0.2 = 200 USD
        assert!(classifier.classify(&doge_event(1_000.0)).is_none());
        assert_eq!(classifier.get_stats().suppressed_below_threshold, 1);
    }

    #[test]
    fn test_top_symbol_suppressed_regardless_of_size() {
        let store = ready_store(&["BTCUSDT"], &[]);
        let classifier = EventClassifier::new(store, 15_000.0, CHANNEL);
        let event =
            LiquidationEvent::new("BTCUSDT".to_string(), OrderSide::Sell, 100.0, 50_000.0);
        assert!(classifier.classify(&event).is_none());
        assert_eq!(classifier.get_stats().suppressed_top_symbol, 1);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let store = ready_store(&[], &[]);
        let classifier = EventClassifier::new(store, 15_000.0, CHANNEL);
        // Exactly 15000 USD qualifies.
        let event = LiquidationEvent::new("XRPUSDT".to_string(), OrderSide::Sell, 5_000.0, 3.0);
        let alert = classifier.classify(&event).expect("alert expected");
        assert_eq!(alert.notional_usd, "15000.00");
    }

    #[test]
    fn test_direction_mapping() {
        let store = ready_store(&[], &[]);
        let classifier = EventClassifier::new(store, 15_000.0, CHANNEL);

        let buy = classifier.classify(&doge_event(100_000.0)).unwrap();
        assert_eq!(buy.direction, Direction::Short);

        let sell = classifier
            .classify(&LiquidationEvent::new(
                "DOGEUSDT".to_string(),
                OrderSide::Sell,
                100_000.0,
                0.2,
            ))
            .unwrap();
        assert_eq!(sell.direction, Direction::Long);
    }

    #[test]
    fn test_variant_selection() {
        let store = ready_store(&["BTCUSDT"], &["DOGEUSDT"]);
        let classifier = EventClassifier::new(store, 15_000.0, CHANNEL);

        let cross_listed = classifier.classify(&doge_event(100_000.0)).unwrap();
        assert_eq!(cross_listed.variant, AlertVariant::BinanceBybit);
        assert_eq!(cross_listed.notional_usd, "20000.00");
        assert_eq!(cross_listed.channel_id, CHANNEL);

        let binance_only = classifier
            .classify(&LiquidationEvent::new(
                "PEPEUSDT".to_string(),
                OrderSide::Buy,
                2_000_000_000.0,
                0.00001,
            ))
            .unwrap();
        assert_eq!(binance_only.variant, AlertVariant::BinanceOnly);
    }
}
