// REST Client for the Bybit V5 API
// HMAC-SHA256 signed requests; only the linear tickers endpoint is used

use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

use crate::layer1::rest_client::{now_millis, RateLimiter, RestClientError};

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// Response Models
// ============================================================================

/// Bybit V5 response envelope.
#[derive(Debug, Deserialize)]
struct BybitEnvelope<T> {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg")]
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TickerListResult {
    list: Vec<BybitTicker>,
}

/// One row of the V5 market tickers endpoint. Only the symbol matters here;
/// the rest of the row is ignored on deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct BybitTicker {
    pub symbol: String,
}

// ============================================================================
// Bybit REST Client
// ============================================================================

/// REST API client for Bybit V5 market endpoints.
///
/// Requests carry the V5 auth headers: the signature is HMAC-SHA256 over
/// `timestamp + api_key + recv_window + query_string`.
pub struct BybitRestClient {
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
    client: Client,
    limiter: Arc<Mutex<RateLimiter>>,
    max_retries: u32,
}

impl BybitRestClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        api_secret: &str,
        recv_window_ms: u64,
        requests_per_minute: u32,
        timeout_seconds: u64,
    ) -> Result<Self, RestClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            recv_window_ms,
            client,
            limiter: Arc::new(Mutex::new(RateLimiter::new(requests_per_minute))),
            max_retries: 3,
        })
    }

    pub fn from_config(config: &crate::core::BybitConfig) -> Result<Self, RestClientError> {
        Self::new(
            &config.base_url,
            &config.api_key,
            &config.api_secret,
            config.recv_window_ms,
            config.requests_per_minute,
            config.request_timeout_seconds,
        )
    }

    /// V5 signature over `timestamp + api_key + recv_window + query_string`.
    fn sign(&self, timestamp_ms: u64, query_string: &str) -> String {
        let payload = format!(
            "{}{}{}{}",
            timestamp_ms, self.api_key, self.recv_window_ms, query_string
        );
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC key can be any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Signed GET with retries; unwraps the V5 envelope.
    async fn get_signed<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query_string: &str,
    ) -> Result<T, RestClientError> {
        self.limiter.lock().await.acquire().await;

        let url = format!("{}{}?{}", self.base_url, endpoint, query_string);

        for attempt in 0..=self.max_retries {
            let timestamp = now_millis();
            let signature = self.sign(timestamp, query_string);

            let result = self
                .client
                .get(&url)
                .header("X-BAPI-API-KEY", &self.api_key)
                .header("X-BAPI-TIMESTAMP", timestamp.to_string())
                .header("X-BAPI-RECV-WINDOW", self.recv_window_ms.to_string())
                .header("X-BAPI-SIGN", signature)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status != StatusCode::OK {
                        if attempt < self.max_retries {
                            let delay = 2u64.pow(attempt);
                            warn!(
                                attempt = attempt + 1,
                                status = status.as_u16(),
                                delay_secs = delay,
                                "Bybit request failed, retrying"
                            );
                            tokio::time::sleep(Duration::from_secs(delay)).await;
                            continue;
                        }
                        return Err(RestClientError::Api {
                            code: status.as_u16() as i64,
                            message: format!("HTTP {}", status),
                        });
                    }

                    let envelope: BybitEnvelope<T> = response.json().await?;
                    if envelope.ret_code != 0 {
                        return Err(RestClientError::Api {
                            code: envelope.ret_code,
                            message: envelope.ret_msg,
                        });
                    }
                    return envelope.result.ok_or(RestClientError::Api {
                        code: envelope.ret_code,
                        message: "Empty result".to_string(),
                    });
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

    /// All active linear (USDⓈ perpetual) tickers.
    pub async fn linear_tickers(&self) -> Result<Vec<BybitTicker>, RestClientError> {
        let result: TickerListResult = self
            .get_signed("/v5/market/tickers", "category=linear")
            .await?;
        Ok(result.list)
    }
}
