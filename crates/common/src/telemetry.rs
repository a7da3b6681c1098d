//! Tracing subscriber setup shared by the workspace binaries

use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, LogFormat};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` from the environment wins over the configured default filter.
/// Calling this twice is harmless; the second install is ignored.
pub fn init_tracing(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.rust_log));

    let result = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
