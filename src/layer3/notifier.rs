// Alert Dispatcher and Telegram notification transport
// Send failures are logged and swallowed; the stream loop never sees them

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::core::types::{Alert, AlertVariant};

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error: {0}")]
    Api(String),
}

// ============================================================================
// Alert Sink
// ============================================================================

/// Outbound notification capability. The pipeline only ever talks to this
/// trait; the concrete transport lives behind it.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError>;
}

// ============================================================================
// Message Formatting
// ============================================================================

/// Render the outbound message text for an alert.
pub fn format_alert(alert: &Alert) -> String {
    match alert.variant {
        AlertVariant::BinanceOnly => format!(
            "#{} | {} liquidation\nNotional: {} USDT\nPrice: {}\nVenue: Binance futures",
            alert.symbol, alert.direction, alert.notional_usd, alert.price
        ),
        AlertVariant::BinanceBybit => format!(
            "#{} | {} liquidation\nNotional: {} USDT\nPrice: {}\nVenue: Binance futures (also listed on Bybit)",
            alert.symbol, alert.direction, alert.notional_usd, alert.price
        ),
    }
}

// ============================================================================
// Telegram Transport
// ============================================================================

/// Telegram Bot API implementation of [`AlertSink`].
pub struct TelegramNotifier {
    api_base_url: String,
    bot_token: String,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(
        api_base_url: &str,
        bot_token: &str,
        timeout_seconds: u64,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            api_base_url: api_base_url.to_string(),
            bot_token: bot_token.to_string(),
            client,
        })
    }

    pub fn from_config(config: &crate::core::TelegramConfig) -> Result<Self, NotifyError> {
        Self::new(
            &config.api_base_url,
            &config.bot_token,
            config.request_timeout_seconds,
        )
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base_url, self.bot_token)
    }
}

#[async_trait]
impl AlertSink for TelegramNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "chat_id": alert.channel_id,
            "text": format_alert(alert),
        });

        let response = self
            .client
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: serde_json::Value = response.json().await.unwrap_or_default();
        let ok = payload.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
        if !ok {
            let description = payload
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("no description");
            return Err(NotifyError::Api(format!("HTTP {}: {}", status, description)));
        }

        Ok(())
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Dispatcher statistics
#[derive(Debug, Clone, Default)]
pub struct DispatcherStats {
    pub alerts_sent: u64,
    pub send_failures: u64,
}

impl fmt::Display for DispatcherStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dispatcher(sent={}, failed={})",
            self.alerts_sent, self.send_failures
        )
    }
}

/// Sends alerts through a sink. Transport errors are terminal for the event
/// (no retry, no queue) but never for the pipeline.
pub struct AlertDispatcher {
    sink: Arc<dyn AlertSink>,
    stats: RwLock<DispatcherStats>,
}

impl AlertDispatcher {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self {
            sink,
            stats: RwLock::new(DispatcherStats::default()),
        }
    }

    pub async fn dispatch(&self, alert: &Alert) {
        match self.sink.send(alert).await {
            Ok(()) => {
                self.stats.write().alerts_sent += 1;
                info!(
                    symbol = %alert.symbol,
                    direction = %alert.direction,
                    notional = %alert.notional_usd,
                    variant = %alert.variant,
                    "Alert dispatched"
                );
            }
            Err(e) => {
                self.stats.write().send_failures += 1;
                error!(symbol = %alert.symbol, error = %e, "Alert send failed, event lost");
            }
        }
    }

    pub fn get_stats(&self) -> DispatcherStats {
        self.stats.read().clone()
    }
}
