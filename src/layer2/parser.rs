// Message Parser for the force-order feed
// One frame in, at most one LiquidationEvent out

use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

use crate::core::types::{LiquidationEvent, OrderSide};

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Invalid field {field}: '{value}'")]
    InvalidField { field: &'static str, value: String },
}

// ============================================================================
// Serde Structures (Raw Binance JSON)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawLiquidationOrder {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "S")]
    side: String,
    #[serde(rename = "q")]
    quantity: String,
    #[serde(rename = "p")]
    price: String,
}

/// Frames that carry a liquidation have an `o` object; everything else on
/// the socket (subscribe acks, heartbeats) does not.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "o")]
    order: Option<RawLiquidationOrder>,
}

fn parse_f64_field(value: &str, field: &'static str) -> Result<f64, ParseError> {
    value.parse::<f64>().map_err(|_| ParseError::InvalidField {
        field,
        value: value.to_string(),
    })
}

// ============================================================================
// MessageParser - Stateful parser with stats
// ============================================================================

/// Parser statistics
#[derive(Debug, Clone, Default)]
pub struct ParserStats {
    pub frames_seen: u64,
    pub liquidations_parsed: u64,
    pub frames_ignored: u64,
    pub parse_errors: u64,
}

impl ParserStats {
    pub fn error_rate(&self) -> f64 {
        if self.frames_seen > 0 {
            self.parse_errors as f64 / self.frames_seen as f64
        } else {
            0.0
        }
    }
}

/// Stateful parser for raw feed frames.
pub struct MessageParser {
    pub stats: ParserStats,
}

impl MessageParser {
    pub fn new() -> Self {
        Self { stats: ParserStats::default() }
    }

    /// Parse one raw frame.
    ///
    /// Returns `Ok(None)` for frames without a liquidation order; those are
    /// normal control traffic, not errors. Malformed liquidation payloads
    /// return `Err` and must not kill the caller's loop.
    pub fn parse(&mut self, raw_json: &str) -> Result<Option<LiquidationEvent>, ParseError> {
        self.stats.frames_seen += 1;

        let frame: RawFrame = serde_json::from_str(raw_json).map_err(|e| {
            self.stats.parse_errors += 1;
            ParseError::InvalidJson(e.to_string())
        })?;

        let order = match frame.order {
            Some(order) => order,
            None => {
                self.stats.frames_ignored += 1;
                return Ok(None);
            }
        };

        let event = self.parse_order(order).map_err(|e| {
            self.stats.parse_errors += 1;
            e
        })?;
        self.stats.liquidations_parsed += 1;
        Ok(Some(event))
    }

    fn parse_order(&self, order: RawLiquidationOrder) -> Result<LiquidationEvent, ParseError> {
        let side = OrderSide::from_str(&order.side).map_err(|_| ParseError::InvalidField {
            field: "side",
            value: order.side.clone(),
        })?;
        let quantity = parse_f64_field(&order.quantity, "quantity")?;
        let price = parse_f64_field(&order.price, "price")?;

        Ok(LiquidationEvent::new(order.symbol, side, quantity, price))
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}
