//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the `[logging].level` directive from
//! the config file is used. Logs go to stderr so that `--json` output on
//! stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber. Calling it twice is harmless: the second
/// call keeps the first subscriber.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
