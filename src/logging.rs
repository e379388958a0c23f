//! Log subscriber setup
//!
//! Engine internals log through `tracing`. The level comes from the
//! `FRAMETEST_LOG` env var (a `Targets` spec such as `debug` or
//! `frametest::engine=trace`), defaulting to `warn`. Logs go to stderr so
//! JSON output on stdout stays clean.

use std::sync::Once;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::Targets, layer::SubscriberExt, util::SubscriberInitExt, Layer};

pub const LOG_ENV: &str = "FRAMETEST_LOG";

static INIT_LOGGER: Once = Once::new();

/// Install the stderr subscriber. Later calls are no-ops.
pub fn init() {
    INIT_LOGGER.call_once(|| {
        let targets = parse_targets(std::env::var(LOG_ENV).ok().as_deref());
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(targets);

        // Another subscriber may already be installed by the host
        let _ = tracing_subscriber::registry().with(layer).try_init();
    });
}

/// Parse a `Targets` spec; empty or invalid specs fall back to `warn`.
pub fn parse_targets(spec: Option<&str>) -> Targets {
    let default = Targets::new().with_default(LevelFilter::WARN);
    match spec {
        None | Some("") => default,
        Some(spec) => spec.parse().unwrap_or_else(|e| {
            eprintln!("[frametest] Ignoring invalid {}: {}", LOG_ENV, e);
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_default_level_is_warn() {
        let targets = parse_targets(None);
        assert!(targets.would_enable("frametest::engine", &Level::WARN));
        assert!(!targets.would_enable("frametest::engine", &Level::DEBUG));
    }

    #[test]
    fn test_explicit_spec() {
        let targets = parse_targets(Some("frametest::engine=debug"));
        assert!(targets.would_enable("frametest::engine", &Level::DEBUG));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init();
    }
}
