// Symbol Universe Store - the one piece of state shared across tasks
// Single writer (the refresher), many readers, whole-value replacement

use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// The two symbol sets the classifier filters against.
///
/// Replaced wholesale on every refresh; never mutated in place, so a reader
/// can never observe a half-built universe.
#[derive(Debug, Clone, Default)]
pub struct SymbolUniverse {
    /// Top-N Binance futures symbols by 24h quote volume.
    pub binance_top: HashSet<String>,
    /// All Bybit linear symbols quoted in USDT.
    pub bybit_linear: HashSet<String>,
}

impl SymbolUniverse {
    pub fn new(binance_top: HashSet<String>, bybit_linear: HashSet<String>) -> Self {
        Self { binance_top, bybit_linear }
    }

    pub fn is_top_symbol(&self, symbol: &str) -> bool {
        self.binance_top.contains(symbol)
    }

    pub fn is_bybit_listed(&self, symbol: &str) -> bool {
        self.bybit_linear.contains(symbol)
    }
}

impl fmt::Display for SymbolUniverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SymbolUniverse(binance_top={}, bybit_linear={})",
            self.binance_top.len(),
            self.bybit_linear.len()
        )
    }
}

/// Statistics snapshot from the universe store
#[derive(Debug, Clone)]
pub struct UniverseStoreStats {
    pub binance_top_count: usize,
    pub bybit_linear_count: usize,
    pub replace_count: u64,
    pub last_refresh_ms: Option<i64>,
}

impl fmt::Display for UniverseStoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UniverseStore(top={}, bybit={}, refreshes={})",
            self.binance_top_count, self.bybit_linear_count, self.replace_count
        )
    }
}

/// Thread-safe holder for the current universe.
///
/// Readers clone an `Arc` pointer; the writer swaps the pointer. Both sides
/// hold the lock for O(1) work only.
pub struct UniverseStore {
    universe: RwLock<Arc<SymbolUniverse>>,
    replace_count: RwLock<u64>,
    last_refresh_ms: RwLock<Option<i64>>,
}

impl UniverseStore {
    pub fn new() -> Self {
        Self {
            universe: RwLock::new(Arc::new(SymbolUniverse::default())),
            replace_count: RwLock::new(0),
            last_refresh_ms: RwLock::new(None),
        }
    }

    /// Current universe snapshot. Cheap; does not clone the sets.
    pub fn snapshot(&self) -> Arc<SymbolUniverse> {
        self.universe.read().clone()
    }

    /// Atomically install a freshly built universe.
    pub fn replace(&self, universe: SymbolUniverse) {
        *self.universe.write() = Arc::new(universe);
        *self.replace_count.write() += 1;
        *self.last_refresh_ms.write() = Some(chrono::Utc::now().timestamp_millis());
    }

    /// True once the first refresh has landed. Before that the classifier
    /// must treat the (empty) universe as not ready.
    pub fn is_ready(&self) -> bool {
        *self.replace_count.read() > 0
    }

    pub fn get_stats(&self) -> UniverseStoreStats {
        let universe = self.snapshot();
        UniverseStoreStats {
            binance_top_count: universe.binance_top.len(),
            bybit_linear_count: universe.bybit_linear.len(),
            replace_count: *self.replace_count.read(),
            last_refresh_ms: *self.last_refresh_ms.read(),
        }
    }
}

impl Default for UniverseStore {
    fn default() -> Self {
        Self::new()
    }
}
