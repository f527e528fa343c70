//! Tracing subscriber setup

use crate::config::LoggingConfig;
use crate::error::{InterceptorError, InterceptorResult};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level. Calling this again after a
/// subscriber is installed is a no-op.
pub fn init_logging(config: &LoggingConfig) -> InterceptorResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            InterceptorError::config(format!("Invalid log level '{}': {}", config.level, e))
        })?,
    };

    let result = if config.json {
        Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        Registry::default()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()
    };

    // Already initialised elsewhere (tests, embedding binary)
    if result.is_err() {
        tracing::debug!("Global tracing subscriber already set");
    }
    Ok(())
}
