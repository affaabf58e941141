//! Logging initialization.
//!
//! Installs a `tracing-subscriber` fmt layer behind an [`EnvFilter`]. The
//! filter comes from `RUST_LOG` when set, otherwise from the configured
//! directive, otherwise [`DEFAULT_FILTER`].

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// Filter used when neither `RUST_LOG` nor the config names one.
pub const DEFAULT_FILTER: &str = "info,diversity=debug";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter {filter:?}: {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Failed to set global subscriber: {0}")]
    SetSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Build the filter: `RUST_LOG` first, then `configured`, then the default.
pub fn build_filter(configured: Option<&str>) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directive = configured.unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directive).map_err(|source| TelemetryError::InvalidFilter {
        filter: directive.to_string(),
        source,
    })
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(configured: Option<&str>) -> Result<(), TelemetryError> {
    let env_filter = build_filter(configured)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false);

    let subscriber = Registry::default().with(env_filter).with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_directive() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = build_filter(Some("info,diversity=loudest")).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidFilter { .. }));
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(build_filter(None).is_ok());
        assert!(build_filter(Some("warn,diversity_freeze=trace")).is_ok());
    }
}
