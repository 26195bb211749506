//! Session configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::constants::DEFAULT_HOST_CAPACITY;

/// Default delay between host-side auto-advance ticks.
pub const DEFAULT_TICK_MS: u64 = 200;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Guests a host admits into its room (default: 1)
    pub host_capacity: usize,

    /// Whether the host drives housekeeping phases on its own
    pub auto_advance: bool,

    /// Delay between auto-advance ticks, in milliseconds
    pub tick_ms: u64,

    /// Capacity of the session's command inbox
    pub inbox_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host_capacity: DEFAULT_HOST_CAPACITY,
            auto_advance: true,
            tick_ms: DEFAULT_TICK_MS,
            inbox_capacity: 100,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.host_capacity == 0 {
            return Err("Host capacity must be at least 1".to_string());
        }
        if self.tick_ms == 0 {
            return Err("Tick interval must be at least 1ms".to_string());
        }
        if self.inbox_capacity == 0 {
            return Err("Inbox capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.host_capacity, 1);
        assert!(config.auto_advance);
        assert_eq!(config.tick_interval(), Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let config = SessionConfig {
            host_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            tick_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
    }
}
