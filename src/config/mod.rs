//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

/// Default port when neither `PORT` nor `SERVER_ADDR` is set
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:3000";

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated). `None` allows any.
    pub client_origin: Option<String>,
    /// Seed for track and color generation. `None` picks one at startup.
    pub race_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = resolve_server_addr(env::var("PORT").ok(), env::var("SERVER_ADDR").ok())?;

        let race_seed = match env::var("RACE_SEED") {
            Ok(raw) => Some(raw.trim().parse().map_err(|_| ConfigError::InvalidSeed(raw))?),
            Err(_) => None,
        };

        Ok(Self {
            server_addr,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),
            race_seed,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3000))),
            log_level: "info".to_string(),
            client_origin: None,
            race_seed: None,
        }
    }
}

/// Hosting platforms provide PORT; fall back to SERVER_ADDR, then the default
fn resolve_server_addr(
    port: Option<String>,
    server_addr: Option<String>,
) -> Result<SocketAddr, ConfigError> {
    let raw = match (port, server_addr) {
        (Some(port), _) => format!("0.0.0.0:{}", port.trim()),
        (None, Some(addr)) => addr,
        (None, None) => DEFAULT_SERVER_ADDR.to_string(),
    };

    raw.parse().map_err(|_| ConfigError::InvalidAddress(raw))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("RACE_SEED must be an unsigned integer, got {0:?}")]
    InvalidSeed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_takes_precedence() {
        let addr = resolve_server_addr(Some("8081".into()), Some("127.0.0.1:9000".into())).unwrap();
        assert_eq!(addr, "0.0.0.0:8081".parse().unwrap());
    }

    #[test]
    fn server_addr_used_without_port() {
        let addr = resolve_server_addr(None, Some("127.0.0.1:9000".into())).unwrap();
        assert_eq!(addr, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn defaults_to_port_3000() {
        let addr = resolve_server_addr(None, None).unwrap();
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn rejects_garbage_port() {
        let err = resolve_server_addr(Some("abc".into()), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress(_)));
    }
}
