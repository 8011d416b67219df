//! Feed wire messages for the auth/subscribe handshake.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Marker the feed embeds in any control message that reports a failure.
const ERROR_MARKER: &str = r#""T":"error""#;

/// API key pair, only used while a session authenticates.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { key: key.into(), secret: secret.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("key", &self.key).field("secret", &"<redacted>").finish()
    }
}

/// Channels and symbols requested once per session after auth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscription {
    pub trades: Vec<String>,
    pub quotes: Vec<String>,
    pub bars: Vec<String>,
}

impl Subscription {
    /// Trades and quotes for every symbol.
    pub fn trades_and_quotes(symbols: &[String]) -> Self {
        Self { trades: symbols.to_vec(), quotes: symbols.to_vec(), bars: Vec::new() }
    }

    pub fn with_bars(mut self, symbols: &[String]) -> Self {
        self.bars = symbols.to_vec();
        self
    }
}

#[derive(Debug, Serialize)]
pub struct AuthRequest<'a> {
    action: &'static str,
    key: &'a str,
    secret: &'a str,
}

impl<'a> AuthRequest<'a> {
    pub fn new(credentials: &'a Credentials) -> Self {
        Self { action: "auth", key: &credentials.key, secret: &credentials.secret }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscribeRequest<'a> {
    action: &'static str,
    #[serde(skip_serializing_if = "no_symbols")]
    trades: &'a [String],
    #[serde(skip_serializing_if = "no_symbols")]
    quotes: &'a [String],
    #[serde(skip_serializing_if = "no_symbols")]
    bars: &'a [String],
}

fn no_symbols(symbols: &&[String]) -> bool {
    symbols.is_empty()
}

impl<'a> SubscribeRequest<'a> {
    pub fn new(subscription: &'a Subscription) -> Self {
        Self {
            action: "subscribe",
            trades: &subscription.trades,
            quotes: &subscription.quotes,
            bars: &subscription.bars,
        }
    }
}

/// True when an auth response reports an error, either as a single object or
/// inside a batch. Non-JSON responses fall back to a textual marker check.
pub fn is_error_response(response: &str) -> bool {
    fn is_error(v: &Value) -> bool {
        v.get("T").and_then(Value::as_str) == Some("error")
    }
    match serde_json::from_str::<Value>(response) {
        | Ok(Value::Array(items)) => items.iter().any(is_error),
        | Ok(v) => is_error(&v),
        | Err(_) => response.contains(ERROR_MARKER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_request_wire_shape() {
        let creds = Credentials::new("AK123", "s3cret");
        let json = serde_json::to_value(AuthRequest::new(&creds)).unwrap();
        assert_eq!(json, serde_json::json!({"action": "auth", "key": "AK123", "secret": "s3cret"}));
    }

    #[test]
    fn subscribe_request_omits_empty_channels() {
        let symbols = vec!["AAPL".to_string(), "MSFT".to_string()];
        let sub = Subscription::trades_and_quotes(&symbols);
        let json = serde_json::to_value(SubscribeRequest::new(&sub)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"action": "subscribe", "trades": ["AAPL", "MSFT"], "quotes": ["AAPL", "MSFT"]})
        );

        let with_bars = sub.with_bars(&symbols[..1]);
        let json = serde_json::to_value(SubscribeRequest::new(&with_bars)).unwrap();
        assert_eq!(json["bars"], serde_json::json!(["AAPL"]));
    }

    #[test]
    fn detects_error_marker() {
        assert!(is_error_response(r#"[{"T":"error","code":402,"msg":"auth failed"}]"#));
        assert!(is_error_response(r#"{"T":"error","code":406,"msg":"connection limit exceeded"}"#));
        assert!(is_error_response(r#"garbled "T":"error" text"#));
        assert!(!is_error_response(r#"[{"T":"success","msg":"authenticated"}]"#));
        assert!(!is_error_response("ok"));
    }

    #[test]
    fn debug_redacts_secret() {
        let creds = Credentials::new("AK123", "s3cret");
        let dbg = format!("{:?}", creds);
        assert!(dbg.contains("AK123"));
        assert!(!dbg.contains("s3cret"));
    }
}
