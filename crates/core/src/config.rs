//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::{Channel, ConfigError, ConfigResult, DEFAULT_LOG_CAPACITY};

/// Environment prefix for overrides, e.g. `MONITOR__ENDPOINT__URL`
pub const ENV_PREFIX: &str = "MONITOR";

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "monitor.toml";

/// Pub/sub endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub url: String,
    pub client_name: String,
    pub token: Option<String>,
    pub handshake_timeout_ms: u64,
    /// Grace period added to the server ping interval before the
    /// connection is considered dead
    pub max_ping_delay_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8085/connection/websocket".to_string(),
            client_name: "trading-monitor".to_string(),
            token: None,
            handshake_timeout_ms: 5_000,
            max_ping_delay_ms: 10_000,
        }
    }
}

impl EndpointConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn max_ping_delay(&self) -> Duration {
        Duration::from_millis(self.max_ping_delay_ms)
    }
}

/// Channel names on the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub kline: String,
    pub signals: String,
    pub wallet: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            kline: Channel::Kline.default_name().to_string(),
            signals: Channel::Signals.default_name().to_string(),
            wallet: Channel::Wallet.default_name().to_string(),
        }
    }
}

impl ChannelConfig {
    pub fn name(&self, channel: Channel) -> &str {
        match channel {
            Channel::Kline => &self.kline,
            Channel::Signals => &self.signals,
            Channel::Wallet => &self.wallet,
        }
    }
}

/// Reconnect with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// 0 means retry forever
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: 500,
            max_delay_ms: 20_000,
            multiplier: 2.0,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = delay.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Whether another attempt is allowed after `attempts` failures
    pub fn allows(&self, attempts: u32) -> bool {
        self.enabled && (self.max_attempts == 0 || attempts < self.max_attempts)
    }
}

/// Activity log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub capacity: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Dashboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub headless: bool,
    /// Where tracing output goes while the terminal UI owns stdout
    pub log_file: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            headless: false,
            log_file: "trading-monitor.log".to_string(),
        }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub endpoint: EndpointConfig,
    pub channels: ChannelConfig,
    pub reconnect: ReconnectConfig,
    pub log: LogConfig,
    pub ui: UiConfig,
}

impl MonitorConfig {
    /// Layer defaults, an optional TOML file and `MONITOR__*` environment
    /// variables, then validate.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let file = match path {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let loaded: MonitorConfig = ::config::Config::builder()
            .add_source(file)
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let url = self.endpoint.url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("endpoint.url is empty".to_string()));
        }
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "endpoint.url must use ws:// or wss://, got {}",
                url
            )));
        }
        if self.log.capacity == 0 {
            return Err(ConfigError::Invalid("log.capacity must be positive".to_string()));
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "reconnect.multiplier must be >= 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for channel in Channel::ALL {
            let name = self.channels.name(channel);
            if name.is_empty() {
                return Err(ConfigError::Invalid(format!("channel name for {} is empty", channel)));
            }
            if !seen.insert(name) {
                return Err(ConfigError::Invalid(format!("duplicate channel name {}", name)));
            }
        }

        Ok(())
    }
}
