#![forbid(unsafe_code)]

//! `tracing` subscriber setup for hosts embedding imodal.
//!
//! The library itself only emits events and spans; installing a subscriber is
//! the host's call. [`init_logging`] is a convenience for hosts that do not
//! already configure `tracing`.
//!
//! The filter is read from `IMODAL_LOG`, then `RUST_LOG`, falling back to
//! `info`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Environment variable consulted first for the log filter.
pub const LOG_ENV: &str = "IMODAL_LOG";

const DEFAULT_FILTER: &str = "info";

/// Output format for [`init_logging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human oriented.
    Pretty,
    /// Single-line, human oriented.
    #[default]
    Compact,
    /// One JSON object per event. Requires the `tracing-json` feature.
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter `{directive}`: {source}")]
    InvalidFilter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("JSON log output requires the `tracing-json` feature")]
    JsonUnavailable,

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Resolve the filter directive from the environment.
#[must_use]
pub fn filter_directive() -> String {
    filter_directive_from(
        std::env::var(LOG_ENV).ok().as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
    )
}

fn filter_directive_from(imodal_log: Option<&str>, rust_log: Option<&str>) -> String {
    [imodal_log, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

/// Install a global `tracing` subscriber writing to stderr.
///
/// Returns [`LoggingError::AlreadyInstalled`] instead of panicking when a
/// subscriber is already set.
pub fn init_logging(format: LogFormat) -> Result<(), LoggingError> {
    let directive = filter_directive();
    let filter = EnvFilter::try_new(&directive).map_err(|source| LoggingError::InvalidFilter {
        directive: directive.clone(),
        source,
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        #[cfg(feature = "tracing-json")]
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        #[cfg(not(feature = "tracing-json"))]
        LogFormat::Json => return Err(LoggingError::JsonUnavailable),
    };

    installed.map_err(|_| LoggingError::AlreadyInstalled)
}
