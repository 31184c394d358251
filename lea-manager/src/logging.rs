//! Logging bootstrap
//!
//! Thin wrapper around `tracing-subscriber` so applications can pick an
//! output profile without wiring layers themselves. Library code only ever
//! uses the `tracing` macros; installing a subscriber is the application's
//! choice.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Output profile for the tracing subscriber.
#[derive(Debug, Clone, Copy)]
pub enum LoggingMode {
    /// No subscriber; all logs are dropped.
    Silent,
    /// Compact stderr output for development.
    Development,
    /// Verbose output with source locations.
    Debug,
}

/// Logging configuration error.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Initialize logging with the given mode. Call once, early.
///
/// The filter honors `LEA_LOG_LEVEL`, then `RUST_LOG`, then the mode's
/// default level.
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let subscriber = Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(env_filter("info"));
            subscriber
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let subscriber = Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(env_filter("debug"));
            subscriber
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize from the `LEA_LOG_MODE` environment variable
/// ("development" / "debug"); anything else stays silent.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("LEA_LOG_MODE").as_deref() {
        Ok("development") => LoggingMode::Development,
        Ok("debug") => LoggingMode::Debug,
        _ => LoggingMode::Silent,
    };
    init_logging(mode)
}

fn env_filter(default_level: &str) -> EnvFilter {
    if let Ok(filter) = std::env::var("LEA_LOG_LEVEL") {
        EnvFilter::new(filter)
    } else if let Ok(filter) = std::env::var("RUST_LOG") {
        EnvFilter::new(filter)
    } else {
        EnvFilter::new(default_level)
    }
}
