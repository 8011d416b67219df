//! Log output for the bridge process.

use std::io::Write;

use chrono::Utc;
use env_logger::{Builder, Env, Target};

/// Dependencies that log every frame or broker round-trip at debug.
const CHATTY_TARGETS: [&str; 3] = ["tungstenite", "tokio_tungstenite", "rdkafka"];

/// Filter used when `MARKETBRIDGE_LOG` is unset: `level` for the bridge,
/// `warn` for the chatty transport crates.
pub fn default_filter(level: &str) -> String {
    let mut filter = level.to_string();
    for target in CHATTY_TARGETS {
        filter.push_str(&format!(",{}=warn", target));
    }
    filter
}

/// Last path segment of a log target, e.g. `session` for
/// `marketbridge::market_data::session`.
pub fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

/// Install the process logger. `MARKETBRIDGE_LOG` replaces the filter built
/// from `level`; calling this again is a no-op.
pub fn init_logging(level: &str) {
    let env = Env::default()
        .filter_or("MARKETBRIDGE_LOG", default_filter(level))
        .write_style_or("MARKETBRIDGE_LOG_STYLE", "auto");

    let installed = Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:5} {:<10} {}",
                Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                buf.default_styled_level(record.level()),
                short_target(record.target()),
                record.args()
            )
        })
        .target(Target::Stdout)
        .try_init()
        .is_ok();

    if installed {
        log::debug!("logging at {}", level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_quiets_transport_crates() {
        assert_eq!(default_filter("debug"), "debug,tungstenite=warn,tokio_tungstenite=warn,rdkafka=warn");
    }

    #[test]
    fn short_target_keeps_module_name() {
        assert_eq!(short_target("marketbridge::market_data::session"), "session");
        assert_eq!(short_target("marketbridge::engine::supervisor"), "supervisor");
        assert_eq!(short_target("marketbridge"), "marketbridge");
    }

    #[test]
    fn init_logging_twice_is_harmless() {
        init_logging("debug");
        init_logging("info");
        log::warn!("still logging after a second init");
    }
}
