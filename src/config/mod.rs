//! # Message Bus Configuration
//!
//! Runtime tuning for the dispatch engine. Every field has a default, so
//! `MessageBusConfig::default()` is a complete configuration; [`ConfigLoader`]
//! layers an optional TOML file and `MESSAGE_BUS__*` environment variables on
//! top of those defaults.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use message_system::config::ConfigLoader;
//! use message_system::MessageBus;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load()?;
//! let bus = MessageBus::with_config(config)?;
//! assert!(!bus.is_active());
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BusError, BusResult};

pub use loader::ConfigLoader;

/// Root configuration structure mirroring `config/message_bus.toml`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MessageBusConfig {
    /// Longest time the background loop sleeps on an empty queue before
    /// re-checking; sends and deactivation wake it earlier
    pub idle_poll_interval_ms: u64,

    /// Buffer size of the broadcast channel carrying callback failures
    pub failure_channel_capacity: usize,

    /// Emit a debug event for every dispatched message
    pub log_dispatch: bool,
}

impl Default for MessageBusConfig {
    fn default() -> Self {
        Self {
            idle_poll_interval_ms: 50,
            failure_channel_capacity: 256,
            log_dispatch: true,
        }
    }
}

impl MessageBusConfig {
    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    pub fn validate(&self) -> BusResult<()> {
        if self.idle_poll_interval_ms == 0 {
            return Err(BusError::Configuration(
                "idle_poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.failure_channel_capacity == 0 {
            return Err(BusError::Configuration(
                "failure_channel_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
