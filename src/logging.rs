//! Logging and tracing utilities.
//!
//! Logs are written to **stderr**; stdout belongs to the plugin host.
//! Every remote API call is logged at `debug` with its operation name, and
//! the HTTP client logs request variables and raw responses at `trace`.
//! Credential headers are never logged.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `debug`, `montecarlo_provider=trace`)
//!
//! # Examples
//!
//! ```bash
//! # Show every GraphQL operation the provider issues
//! RUST_LOG=montecarlo_provider=debug ./provider
//!
//! # Include request variables and response bodies
//! RUST_LOG=montecarlo_provider::client=trace ./provider
//! ```

use tracing_subscriber::{fmt, prelude::*, registry::Registry, EnvFilter};

/// Initialize the default logging subscriber.
///
/// Reads `RUST_LOG` and falls back to `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level.
///
/// Like [`init_logging`], but uses `default_level` when `RUST_LOG` is not set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this function does not panic if a subscriber
/// has already been set, which makes it safe to call from tests.
pub fn try_init_logging() -> bool {
    subscriber("info").try_init().is_ok()
}

fn subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    Registry::default().with(env_filter(default_level)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}
