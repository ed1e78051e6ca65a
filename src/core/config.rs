// Configuration Management for Liquidation Watch
// JSON file sections merged with environment overrides, loaded once at startup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

// ============================================================================
// Configuration Structures
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinanceConfig {
    pub base_url: String,
    pub ws_base_url: String,

    // Connection settings
    pub request_timeout_seconds: u64,
    pub ws_ping_interval_secs: u64,
    pub reconnect_max_backoff_secs: u64,
    pub reconnect_jitter_cap_ms: u64,

    // Rate limiting
    pub requests_per_minute: u32,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://fapi.binance.com".to_string(),
            ws_base_url: "wss://fstream.binance.com".to_string(),
            request_timeout_seconds: 10,
            ws_ping_interval_secs: 180,
            reconnect_max_backoff_secs: 60,
            reconnect_jitter_cap_ms: 1000,
            requests_per_minute: 1200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BybitConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub request_timeout_seconds: u64,
    pub recv_window_ms: u64,
    pub requests_per_minute: u32,
}

impl Default for BybitConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            base_url: "https://api.bybit.com".to_string(),
            request_timeout_seconds: 10,
            recv_window_ms: 5000,
            requests_per_minute: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub channel_id: i64,
    pub api_base_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: -1002304776308,
            api_base_url: "https://api.telegram.org".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Seconds between universe rebuilds.
    pub refresh_interval_secs: u64,
    /// How many top-volume Binance symbols are suppressed.
    pub top_symbol_count: usize,
    /// Quote-asset suffix a Binance symbol must end with to qualify.
    pub quote_suffix: String,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 24 * 60 * 60,
            top_symbol_count: 50,
            quote_suffix: "USDT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Minimum liquidation notional (USD) worth alerting on.
    pub min_notional_usd: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { min_notional_usd: 15_000.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub log_json: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            log_json: false,
        }
    }
}

// ============================================================================
// App Config
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub binance: BinanceConfig,
    pub bybit: BybitConfig,
    pub telegram: TelegramConfig,
    pub universe: UniverseConfig,
    pub alert: AlertConfig,
    pub monitoring: MonitoringConfig,
}

impl AppConfig {
    /// Build from an optional JSON file, then apply environment overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path {
            config.load_from_file(path)?;
        }
        config.load_from_env();

        info!("Configuration initialized");
        Ok(config)
    }

    /// Merge sections from a JSON file. Missing sections keep their defaults.
    pub fn load_from_file(&mut self, config_path: &str) -> Result<(), ConfigError> {
        let path = Path::new(config_path);
        if !path.exists() {
            warn!(path = config_path, "Config file not found");
            return Ok(());
        }

        let content = fs::read_to_string(path)?;
        let sections: HashMap<String, serde_json::Value> = serde_json::from_str(&content)?;

        if let Some(value) = sections.get("binance") {
            self.binance = serde_json::from_value(value.clone())?;
        }
        if let Some(value) = sections.get("bybit") {
            self.bybit = serde_json::from_value(value.clone())?;
        }
        if let Some(value) = sections.get("telegram") {
            self.telegram = serde_json::from_value(value.clone())?;
        }
        if let Some(value) = sections.get("universe") {
            self.universe = serde_json::from_value(value.clone())?;
        }
        if let Some(value) = sections.get("alert") {
            self.alert = serde_json::from_value(value.clone())?;
        }
        if let Some(value) = sections.get("monitoring") {
            self.monitoring = serde_json::from_value(value.clone())?;
        }

        info!(path = config_path, "Configuration loaded");
        Ok(())
    }

    /// Sensitive values come from the environment, never the config file.
    pub fn load_from_env(&mut self) {
        if let Ok(api_key) = std::env::var("BYBIT_API_KEY") {
            self.bybit.api_key = api_key;
        }
        if let Ok(api_secret) = std::env::var("BYBIT_API_SECRET") {
            self.bybit.api_secret = api_secret;
        }
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Ok(channel) = std::env::var("TELEGRAM_CHANNEL_ID") {
            match channel.parse::<i64>() {
                Ok(id) => self.telegram.channel_id = id,
                Err(_) => warn!(value = %channel, "TELEGRAM_CHANNEL_ID is not an integer, ignored"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.bybit.api_key.is_empty() {
            errors.push("Bybit API key is required (BYBIT_API_KEY)".to_string());
        }
        if self.bybit.api_secret.is_empty() {
            errors.push("Bybit API secret is required (BYBIT_API_SECRET)".to_string());
        }
        if self.telegram.bot_token.is_empty() {
            errors.push("Telegram bot token is required (TELEGRAM_BOT_TOKEN)".to_string());
        }
        if self.telegram.channel_id == 0 {
            errors.push("Telegram channel id must be non-zero".to_string());
        }
        if self.alert.min_notional_usd <= 0.0 {
            errors.push("alert.min_notional_usd must be positive".to_string());
        }
        if self.universe.top_symbol_count == 0 {
            errors.push("universe.top_symbol_count must be at least 1".to_string());
        }
        if self.universe.refresh_interval_secs == 0 {
            errors.push("universe.refresh_interval_secs must be at least 1".to_string());
        }

        if errors.is_empty() {
            info!("Configuration validated");
            Ok(())
        } else {
            for error in &errors {
                warn!(error = %error, "Config validation error");
            }
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.binance.base_url, "https://fapi.binance.com");
        assert_eq!(config.binance.ws_base_url, "wss://fstream.binance.com");
        assert_eq!(config.universe.top_symbol_count, 50);
        assert_eq!(config.universe.refresh_interval_secs, 86_400);
        assert_eq!(config.alert.min_notional_usd, 15_000.0);
        assert_eq!(config.universe.quote_suffix, "USDT");
    }

    #[test]
    fn test_validation_requires_credentials() {
        let config = AppConfig::default();
        // Default config carries no credentials, so validation must fail.
        let err = config.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("BYBIT_API_KEY"));
        assert!(message.contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn test_validation_passes_with_credentials() {
        let mut config = AppConfig::default();
        config.bybit.api_key = "key".to_string();
        config.bybit.api_secret = "secret".to_string();
        config.telegram.bot_token = "123:abc".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_section_merge_keeps_other_defaults() {
        let mut config = AppConfig::default();
        let json = r#"{"alert": {"min_notional_usd": 25000.0}}"#;
        let sections: HashMap<String, serde_json::Value> = serde_json::from_str(json).unwrap();
        if let Some(value) = sections.get("alert") {
            config.alert = serde_json::from_value(value.clone()).unwrap();
        }
        assert_eq!(config.alert.min_notional_usd, 25_000.0);
        assert_eq!(config.universe.top_symbol_count, 50);
    }
}
