//! Structured logging setup.
//!
//! The library only emits `tracing` events; binaries decide where they go.
//!
//! - `LOG_FORMAT`: `json` (default) or `text`
//! - `RUST_LOG`: filter directives (default `info`)
//!
//! ```no_run
//! use astor_web::logging::{init_logging, LoggingConfig};
//!
//! init_logging(&LoggingConfig::from_env()).expect("logging already initialised");
//! ```

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::Error;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    /// One JSON object per event (production).
    #[default]
    Json,
    /// Human-readable lines (development).
    Text,
}

impl LogFormat {
    /// `text` / `pretty` select [`LogFormat::Text`]; anything else is JSON.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Self::Text,
            _ => Self::Json,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives, e.g. `info` or `astor_web=debug,hyper=warn`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: LogFormat::Json, filter: "info".to_owned() }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            format: std::env::var("LOG_FORMAT").map(|v| LogFormat::parse(&v)).unwrap_or_default(),
            filter: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned()),
        }
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Error> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| Error::other(e).context("parsing log filter"))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
    }
    .map_err(|e| Error::other(e).context("installing tracing subscriber"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing() {
        assert_eq!(LogFormat::parse("TEXT"), LogFormat::Text);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Json);
    }

    #[test]
    fn bad_filter_is_an_error() {
        let config = LoggingConfig { format: LogFormat::Text, filter: "astor_web=loud".to_owned() };
        assert!(init_logging(&config).is_err());
    }
}
