// Logging module for structured logging using the tracing crate

use serde::{Deserialize, Serialize};
use std::error::Error;
use tracing_subscriber::EnvFilter;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, for log aggregation systems
    #[default]
    Json,
    /// Human-readable multi-line output for local development
    Pretty,
}

/// Initialize the tracing subscriber for structured logging
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Output goes to
/// stdout for container deployments.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use kagami::logging::{init_subscriber, LogFormat};
///
/// init_subscriber(LogFormat::Json).expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
pub fn init_subscriber(format: LogFormat) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().try_init()?,
        LogFormat::Pretty => builder.pretty().try_init()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_yaml() {
        let json: LogFormat = serde_yaml::from_str("json").unwrap();
        let pretty: LogFormat = serde_yaml::from_str("pretty").unwrap();
        assert_eq!(json, LogFormat::Json);
        assert_eq!(pretty, LogFormat::Pretty);
        assert!(serde_yaml::from_str::<LogFormat>("xml").is_err());
    }

    #[test]
    fn test_init_subscriber_twice_fails() {
        // Only one global subscriber can be installed per process
        let _ = init_subscriber(LogFormat::Json);
        assert!(init_subscriber(LogFormat::Pretty).is_err());
    }
}
