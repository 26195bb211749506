//! Peer configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use twentyfour::SessionConfig;

/// Default address a hosting peer listens on
pub const DEFAULT_BIND: &str = "127.0.0.1:6969";

/// Complete peer configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Address a hosting peer listens on; guests connect to it
    pub bind: SocketAddr,
    /// Session settings
    pub session: SessionConfig,
}

impl PeerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `auto_override` - Optional auto-advance override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        auto_override: Option<bool>,
    ) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), bind_override, auto_override)
    }

    /// Same as [`PeerConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        bind_override: Option<SocketAddr>,
        auto_override: Option<bool>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => {
                let raw = lookup("TF_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
                raw.parse().map_err(|_| ConfigError::Invalid {
                    var: "TF_BIND".to_string(),
                    reason: format!("'{raw}' is not a socket address"),
                })?
            }
        };

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            host_capacity: parse_or(&lookup, "TF_HOST_CAPACITY", defaults.host_capacity),
            auto_advance: auto_override
                .unwrap_or_else(|| parse_or(&lookup, "TF_AUTO_ADVANCE", defaults.auto_advance)),
            tick_ms: parse_or(&lookup, "TF_TICK_MS", defaults.tick_ms),
            inbox_capacity: defaults.inbox_capacity,
        };

        let config = PeerConfig { bind, session };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.host_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "TF_HOST_CAPACITY".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.session.tick_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "TF_TICK_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        self.session
            .validate()
            .map_err(|reason| ConfigError::Invalid {
                var: "session".to_string(),
                reason,
            })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse a variable with default fallback
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
