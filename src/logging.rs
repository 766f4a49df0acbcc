//! Tracing setup
//!
//! JSON lines on stderr so stdout stays free for whatever wraps the harness.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Build the filter: `RUST_LOG` wins, otherwise `log_level`
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Initialize the global subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init_tracing(log_level: &str) {
    let console_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter(log_level));

    let _ = tracing_subscriber::registry().with(console_layer).try_init();
}
