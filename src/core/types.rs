// Core Type Definitions for Liquidation Watch
// Shared domain types for the stream -> classify -> dispatch pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            _ => Err(format!("Invalid OrderSide: '{}'. Expected 'BUY' or 'SELL'", s)),
        }
    }
}

/// Which side of a position was forced closed.
///
/// A liquidated short is bought back by the engine (side BUY), a liquidated
/// long is sold (side SELL). The mapping is the inverse of the order side on
/// purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn from_order_side(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => Direction::Short,
            OrderSide::Sell => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Which message template the dispatcher uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertVariant {
    /// Symbol trades on Binance futures only.
    BinanceOnly,
    /// Symbol is also listed as a Bybit linear contract.
    BinanceBybit,
}

impl fmt::Display for AlertVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// LiquidationEvent
// ============================================================================

/// A single forced-liquidation order from the feed. Constructed per message,
/// consumed immediately, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
}

impl LiquidationEvent {
    pub fn new(symbol: String, side: OrderSide, quantity: f64, price: f64) -> Self {
        Self { symbol, side, quantity, price }
    }

    /// USD-equivalent size of the liquidation.
    pub fn notional_usd(&self) -> f64 {
        self.quantity * self.price
    }
}

impl fmt::Display for LiquidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LiquidationEvent(symbol={}, side={}, qty={:.4}, price={:.4})",
            self.symbol, self.side, self.quantity, self.price
        )
    }
}

// ============================================================================
// Alert
// ============================================================================

/// A classified liquidation ready for dispatch. Produced by the classifier,
/// consumed by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub channel_id: i64,
    pub symbol: String,
    pub direction: Direction,
    /// Notional formatted to exactly two decimal places.
    pub notional_usd: String,
    pub price: f64,
    pub variant: AlertVariant,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Alert(symbol={}, direction={}, notional=${}, variant={})",
            self.symbol, self.direction, self.notional_usd, self.variant
        )
    }
}
