//! Structured logging infrastructure for telemesh services.
//!
//! `RUST_LOG` takes precedence over the configured filter directive.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

fn filter_for(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

/// Initialize the global subscriber for a service.
///
/// Returns an error if a subscriber is already installed, which happens when
/// tests start several services in one process.
///
/// # Example
/// ```no_run
/// use telemesh_core::{config::LoggingConfig, logging};
///
/// logging::init(&LoggingConfig::default()).ok();
/// tracing::info!(role = "leader", "service started");
/// ```
pub fn init(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let registry = tracing_subscriber::registry().with(filter_for(config));
    match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init(),
    }
}
