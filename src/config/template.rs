//! Configuration template generation

use std::fs;
use std::path::Path;

const COMMENTED_TEMPLATE: &str = r#"# marketbridge configuration
# Every value below is the built-in default. Environment variables
# (ALPACA_KEY_ID, ALPACA_SECRET_KEY, FEED, FEED_BASE_URL, SYMBOLS,
# SUBSCRIBE_BARS, KAFKA_BROKERS, KAFKA_TOPIC) override the file.

[feed]
# WebSocket base URL; the feed name is appended to it
base_url = "wss://stream.data.alpaca.markets/v2"

# Feed environment: "test", "iex" or "sip"
feed = "test"

# Written into the `source` field of every envelope
source = "alpaca"

# Credentials are best supplied through the environment
# key_id = ""
# secret_key = ""

# Empty means FAKEPACA on the test feed and AAPL otherwise
symbols = []

# Also subscribe to minute bars
subscribe_bars = false

[kafka]
brokers = ["localhost:9092"]
topic = "alpaca.marketdata"

# Opportunistic batching window in milliseconds
linger_ms = 50

# Upper bound on waiting for an acknowledgement
delivery_timeout_ms = 30000

[session]
handshake_timeout_secs = 10
ping_interval_secs = 20
ping_timeout_secs = 5

# Must exceed ping_interval_secs
read_deadline_secs = 60

[backoff]
initial_ms = 1000
max_ms = 30000

# Streaming this long without failure restarts the schedule; 0 never resets
reset_after_secs = 300

# Minimum wait after the feed rejects the credentials
auth_failure_delay_secs = 30
"#;

/// Write a configuration file with comments explaining each field
pub fn generate_commented_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, COMMENTED_TEMPLATE)
}
