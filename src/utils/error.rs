//! Error handling for the bridge.

use thiserror::Error;

/// Main error type for the bridge
#[derive(Debug, Error)]
pub enum Error {
    /// The feed transport could not be established
    #[error("Connect error: {0}")]
    Connect(String),

    /// Writing one of the handshake messages failed
    #[error("Handshake error: {0}")]
    Handshake(String),

    /// The feed rejected our credentials
    #[error("Auth error: {0}")]
    Auth(String),

    /// Read failure, deadline expiry or remote close on an open session
    #[error("Session error: {0}")]
    Session(String),

    /// The message queue rejected or timed out a publish
    #[error("Publish error: {0}")]
    Publish(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unreadable configuration file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed configuration file
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Short, stable label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            | Error::Connect(_) => "connect",
            | Error::Handshake(_) => "handshake",
            | Error::Auth(_) => "auth",
            | Error::Session(_) => "session",
            | Error::Publish(_) => "publish",
            | Error::Config(_) => "config",
            | Error::Io(_) => "io",
            | Error::Json(_) => "json",
            | Error::Toml(_) | Error::TomlSerialize(_) => "toml",
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

/// Result type for the bridge
pub type Result<T> = std::result::Result<T, Error>;
