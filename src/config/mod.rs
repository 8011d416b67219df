//! Configuration module for the bridge

mod template;

use crate::engine::backoff::BackoffPolicy;
use crate::market_data::{Credentials, SessionTiming, Subscription};
use crate::utils::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub use template::generate_commented_config_template;

/// Symbol used when nothing is configured against the test feed.
pub const TEST_FEED_SYMBOL: &str = "FAKEPACA";
/// Symbol used when nothing is configured against a live feed.
pub const LIVE_FEED_SYMBOL: &str = "AAPL";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Upstream market-data feed
    #[serde(default)]
    pub feed: FeedConfig,

    /// Destination topic
    #[serde(default)]
    pub kafka: KafkaConfig,

    /// Connection and liveness timings
    #[serde(default)]
    pub session: SessionConfig,

    /// Reconnect schedule
    #[serde(default)]
    pub backoff: BackoffConfig,
}

/// Feed configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// WebSocket base URL; the feed name is appended as the last path segment
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Feed environment, e.g. "test", "iex" or "sip"
    #[serde(default = "default_feed")]
    pub feed: String,

    /// Value of the `source` field on every envelope
    #[serde(default = "default_source")]
    pub source: String,

    /// API key id. Prefer the ALPACA_KEY_ID environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    /// API secret. Prefer the ALPACA_SECRET_KEY environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Symbols for the trades and quotes channels
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Also subscribe to minute bars for the same symbols
    #[serde(default)]
    pub subscribe_bars: bool,
}

/// Kafka configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KafkaConfig {
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,

    #[serde(default = "default_topic")]
    pub topic: String,

    /// Opportunistic batching window
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,

    /// How long a single publish may wait for its acknowledgement
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
    #[serde(default = "default_read_deadline_secs")]
    pub read_deadline_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    /// Healthy streaming time after which the schedule starts over. 0 disables.
    #[serde(default = "default_reset_after_secs")]
    pub reset_after_secs: u64,
    /// Minimum delay after the feed rejects our credentials
    #[serde(default = "default_auth_failure_delay_secs")]
    pub auth_failure_delay_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            feed: default_feed(),
            source: default_source(),
            key_id: None,
            secret_key: None,
            symbols: Vec::new(),
            subscribe_bars: false,
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topic: default_topic(),
            linger_ms: default_linger_ms(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: default_handshake_timeout_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
            read_deadline_secs: default_read_deadline_secs(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
            reset_after_secs: default_reset_after_secs(),
            auth_failure_delay_secs: default_auth_failure_delay_secs(),
        }
    }
}

fn default_base_url() -> String {
    "wss://stream.data.alpaca.markets/v2".to_string()
}
fn default_feed() -> String {
    "test".to_string()
}
fn default_source() -> String {
    "alpaca".to_string()
}
fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}
fn default_topic() -> String {
    "alpaca.marketdata".to_string()
}
fn default_linger_ms() -> u64 {
    50
}
fn default_delivery_timeout_ms() -> u64 {
    30_000
}
fn default_handshake_timeout_secs() -> u64 {
    10
}
fn default_ping_interval_secs() -> u64 {
    20
}
fn default_ping_timeout_secs() -> u64 {
    5
}
fn default_read_deadline_secs() -> u64 {
    60
}
fn default_initial_ms() -> u64 {
    1_000
}
fn default_max_ms() -> u64 {
    30_000
}
fn default_reset_after_secs() -> u64 {
    300
}
fn default_auth_failure_delay_secs() -> u64 {
    30
}

impl Config {
    /// Serialize default config to TOML string
    pub fn default_toml() -> Result<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }

    /// Load configuration from a specific file path, then apply the environment
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut cfg: Self = toml::from_str(&content)?;
        cfg.merge_env();
        Ok(cfg)
    }

    /// Load from `path` when given, otherwise defaults plus the environment
    pub fn load(path: Option<&std::path::Path>) -> Result<Self> {
        match path {
            | Some(path) => Self::from_file(path),
            | None => {
                let mut config = Self::default();
                config.merge_env();
                Ok(config)
            }
        }
    }

    /// Merge environment variables into the configuration. Blank values are ignored.
    pub fn merge_env(&mut self) {
        if let Some(key_id) = env_nonempty("ALPACA_KEY_ID") {
            self.feed.key_id = Some(key_id);
        }
        if let Some(secret) = env_nonempty("ALPACA_SECRET_KEY") {
            self.feed.secret_key = Some(secret);
        }
        if let Some(feed) = env_nonempty("FEED") {
            self.feed.feed = feed;
        }
        if let Some(base_url) = env_nonempty("FEED_BASE_URL") {
            self.feed.base_url = base_url;
        }
        if let Some(symbols) = env_nonempty("SYMBOLS") {
            self.feed.symbols = symbols.split(',').map(str::to_string).collect();
        }
        if let Some(bars) = env_nonempty("SUBSCRIBE_BARS") {
            self.feed.subscribe_bars = matches!(bars.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(brokers) = env_nonempty("KAFKA_BROKERS") {
            self.kafka.brokers = brokers
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(topic) = env_nonempty("KAFKA_TOPIC") {
            self.kafka.topic = topic;
        }
    }

    /// Validate the configuration for required fields and reasonable values
    pub fn validate(&self) -> Result<()> {
        self.credentials()?;

        let url = url::Url::parse(&self.feed_url())
            .map_err(|e| Error::Config(format!("Invalid feed URL {}: {}", self.feed_url(), e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::Config(format!("Feed URL must be ws:// or wss://, got {}", url)));
        }
        if self.feed_name().is_empty() {
            return Err(Error::Config("feed.feed must be set".to_string()));
        }
        if self.kafka.brokers.is_empty() {
            return Err(Error::Config("At least one Kafka broker must be set".to_string()));
        }
        if self.kafka.topic.trim().is_empty() {
            return Err(Error::Config("Kafka topic must be set".to_string()));
        }
        let timings = [
            ("handshake_timeout_secs", self.session.handshake_timeout_secs),
            ("ping_interval_secs", self.session.ping_interval_secs),
            ("ping_timeout_secs", self.session.ping_timeout_secs),
        ];
        if let Some((name, _)) = timings.iter().find(|(_, secs)| *secs == 0) {
            return Err(Error::Config(format!("session.{} must be > 0", name)));
        }
        if self.session.read_deadline_secs <= self.session.ping_interval_secs {
            return Err(Error::Config(
                "session.read_deadline_secs must exceed ping_interval_secs".to_string(),
            ));
        }
        if self.backoff.initial_ms == 0 || self.backoff.max_ms < self.backoff.initial_ms {
            return Err(Error::Config("backoff needs 0 < initial_ms <= max_ms".to_string()));
        }
        Ok(())
    }

    /// Credential pair; missing values are a startup error.
    pub fn credentials(&self) -> Result<Credentials> {
        match (&self.feed.key_id, &self.feed.secret_key) {
            | (Some(key), Some(secret)) if !key.trim().is_empty() && !secret.trim().is_empty() => {
                Ok(Credentials::new(key.trim(), secret.trim()))
            }
            | _ => Err(Error::Config("Missing ALPACA_KEY_ID or ALPACA_SECRET_KEY".to_string())),
        }
    }

    /// Feed environment as used on the wire: trimmed and lower-cased.
    pub fn feed_name(&self) -> String {
        self.feed.feed.trim().to_lowercase()
    }

    pub fn feed_url(&self) -> String {
        format!("{}/{}", self.feed.base_url.trim_end_matches('/'), self.feed_name())
    }

    /// Normalized symbol list, never empty.
    pub fn symbols(&self) -> Vec<String> {
        normalize_symbols(&self.feed.symbols, &self.feed_name())
    }

    pub fn subscription(&self) -> Subscription {
        let symbols = self.symbols();
        let subscription = Subscription::trades_and_quotes(&symbols);
        if self.feed.subscribe_bars {
            subscription.with_bars(&symbols)
        } else {
            subscription
        }
    }

    pub fn session_timing(&self) -> SessionTiming {
        SessionTiming {
            handshake_timeout: Duration::from_secs(self.session.handshake_timeout_secs),
            ping_interval: Duration::from_secs(self.session.ping_interval_secs),
            ping_timeout: Duration::from_secs(self.session.ping_timeout_secs),
            read_deadline: Duration::from_secs(self.session.read_deadline_secs),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(self.backoff.initial_ms),
            max: Duration::from_millis(self.backoff.max_ms),
            reset_after: match self.backoff.reset_after_secs {
                | 0 => None,
                | secs => Some(Duration::from_secs(secs)),
            },
            auth_failure_delay: Duration::from_secs(self.backoff.auth_failure_delay_secs),
        }
    }
}

/// Trim and upper-case symbols, dropping blanks. An empty result falls back to
/// the feed's default symbol.
pub fn normalize_symbols(raw: &[String], feed: &str) -> Vec<String> {
    let symbols: Vec<String> = raw
        .iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    if !symbols.is_empty() {
        return symbols;
    }
    let fallback = if feed == "test" { TEST_FEED_SYMBOL } else { LIVE_FEED_SYMBOL };
    vec![fallback.to_string()]
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
