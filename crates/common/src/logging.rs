//! Tracing subscriber setup.
//!
//! Library crates only emit `tracing` events; the embedding application
//! decides where they go by calling one of these once at startup.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Build the filter: `RUST_LOG` wins over the configured level.
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber described by `config`.
///
/// Returns `false` when a global subscriber was already installed; the
/// existing one is left in place.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let builder = fmt::Subscriber::builder().with_env_filter(env_filter(config));

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().with_current_span(false).finish())
    } else {
        tracing::subscriber::set_global_default(
            builder
                .with_target(true)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false)
                .finish(),
        )
    };

    installed.is_ok()
}

/// Initialize logging with defaults.
pub fn init_default_logging() -> bool {
    init_logging(&LoggingConfig::default())
}

/// Route logs through the test harness's captured output.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    let _ = fmt::Subscriber::builder()
        .with_env_filter(env_filter(&LoggingConfig {
            level: "debug".to_string(),
            json: false,
        }))
        .with_test_writer()
        .try_init();
}
