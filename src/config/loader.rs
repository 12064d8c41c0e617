//! Configuration Loader
//!
//! Layers built-in defaults, an optional TOML file and environment variables,
//! then validates the merged result.
//!
//! Resolution order (later wins):
//! 1. `MessageBusConfig::default()`
//! 2. `config/message_bus.toml`, or the file named by `MESSAGE_BUS_CONFIG`
//! 3. `MESSAGE_BUS__<FIELD>` environment variables

use std::env;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use super::MessageBusConfig;
use crate::error::BusResult;

const DEFAULT_CONFIG_PATH: &str = "config/message_bus.toml";
const CONFIG_PATH_VAR: &str = "MESSAGE_BUS_CONFIG";
const ENV_PREFIX: &str = "MESSAGE_BUS";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the default locations.
    pub fn load() -> BusResult<MessageBusConfig> {
        let path = env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_path(&path)
    }

    /// Load configuration using `path` as the (optional) file layer.
    pub fn load_from_path(path: &Path) -> BusResult<MessageBusConfig> {
        let defaults = Config::try_from(&MessageBusConfig::default())?;

        let merged = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: MessageBusConfig = merged.try_deserialize()?;
        config.validate()?;

        debug!(
            path = %path.display(),
            config = %serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string()),
            "Message bus configuration loaded"
        );

        Ok(config)
    }
}
