// REST Client for the Binance Futures public API
// Rate-limited HTTP client with retry logic; only public market data is used

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum RestClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("Max retries exceeded")]
    MaxRetries,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Rate Limiter
// ============================================================================

/// Token bucket rate limiter for API requests.
/// Used behind Arc<Mutex<RateLimiter>>, so no internal lock needed.
pub struct RateLimiter {
    tokens: f64,
    pub max_tokens: f64,
    rate_per_sec: f64,
    last_update: f64,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute as f64;
        Self {
            tokens: rpm,
            max_tokens: rpm,
            rate_per_sec: rpm / 60.0,
            last_update: now_secs(),
        }
    }

    /// Wait until a token is available (caller must hold the Mutex).
    pub async fn acquire(&mut self) {
        loop {
            self.add_tokens();

            if self.tokens >= 1.0 {
                self.tokens -= 1.0;
                return;
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    fn add_tokens(&mut self) {
        let now = now_secs();
        let elapsed = now - self.last_update;
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.max_tokens);
        self.last_update = now;
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ============================================================================
// Response Models
// ============================================================================

/// One row of the 24hr ticker statistics endpoint. Volumes arrive as numeric
/// strings and are parsed lazily.
#[derive(Debug, Clone, Deserialize)]
pub struct Ticker24hr {
    pub symbol: String,
    #[serde(rename = "quoteVolume")]
    pub quote_volume: String,
}

impl Ticker24hr {
    pub fn quote_volume_usd(&self) -> f64 {
        self.quote_volume.parse::<f64>().unwrap_or(0.0)
    }
}

impl fmt::Display for Ticker24hr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticker24hr(symbol={}, quoteVolume={})", self.symbol, self.quote_volume)
    }
}

// ============================================================================
// Binance REST Client
// ============================================================================

/// REST API client for Binance Futures public endpoints.
///
/// Features:
/// - Token bucket rate limiting
/// - Automatic retries with exponential backoff
/// - Bounded request timeout
pub struct BinanceRestClient {
    base_url: String,
    client: Client,
    limiter: Arc<Mutex<RateLimiter>>,
    max_retries: u32,
}

impl BinanceRestClient {
    pub fn new(
        base_url: &str,
        requests_per_minute: u32,
        timeout_seconds: u64,
    ) -> Result<Self, RestClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            base_url: base_url.to_string(),
            client,
            limiter: Arc::new(Mutex::new(RateLimiter::new(requests_per_minute))),
            max_retries: 3,
        })
    }

    pub fn from_config(config: &crate::core::BinanceConfig) -> Result<Self, RestClientError> {
        Self::new(
            &config.base_url,
            config.requests_per_minute,
            config.request_timeout_seconds,
        )
    }

    /// GET an endpoint and deserialize the body, retrying transient failures.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<T, RestClientError> {
        self.limiter.lock().await.acquire().await;

        let url = format!("{}{}", self.base_url, endpoint);

        for attempt in 0..=self.max_retries {
            match self.client.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::OK {
                        return Ok(response.json::<T>().await?);
                    }

                    let body: serde_json::Value = response.json().await.unwrap_or_default();
                    let code = body.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
                    let message = body
                        .get("msg")
                        .and_then(|m| m.as_str())
                        .unwrap_or("Unknown error")
                        .to_string();

                    if attempt < self.max_retries {
                        let delay = 2u64.pow(attempt);
                        warn!(
                            attempt = attempt + 1,
                            status = status.as_u16(),
                            error_code = code,
                            error_msg = %message,
                            delay_secs = delay,
                            "Request failed, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(delay)).await;
                        continue;
                    }

                    return Err(RestClientError::Api { code, message });
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        let delay = 2u64.pow(attempt);
                        warn!(attempt = attempt + 1, error = %e, delay_secs = delay, "Network error, retrying");
                        tokio::time::sleep(Duration::from_secs(delay)).await;
                        continue;
                    }
                    return Err(RestClientError::Http(e));
                }
            }
        }

        Err(RestClientError::MaxRetries)
    }

    /// 24hr ticker statistics for every futures symbol.
    pub async fn ticker_24hr(&self) -> Result<Vec<Ticker24hr>, RestClientError> {
        self.get_json("/fapi/v1/ticker/24hr").await
    }
}
