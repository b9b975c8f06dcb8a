//! Server configuration from the environment.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `ASTOR_ADDR` | `0.0.0.0:3000` | listen address |
//! | `ASTOR_SHUTDOWN_TIMEOUT_SECS` | `30` | how long in-flight connections may drain |
//!
//! Unparseable values fall back to the default with a warning rather than
//! refusing to start.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::warn;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for [`Server`](crate::Server).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Upper bound on the drain phase after a shutdown request. Keep it
    /// above your slowest request and below the orchestrator's kill timeout.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let addr = match lookup("ASTOR_ADDR") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(value = %raw, error = %e, default = DEFAULT_ADDR, "invalid ASTOR_ADDR");
                defaults.addr
            }),
            None => defaults.addr,
        };

        let shutdown_timeout = match lookup("ASTOR_SHUTDOWN_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map(Duration::from_secs).unwrap_or_else(|e| {
                warn!(value = %raw, error = %e, "invalid ASTOR_SHUTDOWN_TIMEOUT_SECS");
                defaults.shutdown_timeout
            }),
            None => defaults.shutdown_timeout,
        };

        Self { addr, shutdown_timeout }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), ServerConfig::default());
        assert_eq!(ServerConfig::default().addr.to_string(), DEFAULT_ADDR);
    }

    #[test]
    fn reads_values() {
        let c = config(&[("ASTOR_ADDR", "127.0.0.1:8080"), ("ASTOR_SHUTDOWN_TIMEOUT_SECS", "5")]);
        assert_eq!(c.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(c.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_values_fall_back() {
        let c = config(&[("ASTOR_ADDR", "nowhere"), ("ASTOR_SHUTDOWN_TIMEOUT_SECS", "-1")]);
        assert_eq!(c, ServerConfig::default());
    }
}
