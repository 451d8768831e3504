use serde::{Deserialize, Serialize};

use crate::{
    common::types::{AnyResult, map_boxed_err},
    configs::*,
};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub mainloop: MainloopConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Loads `config.toml`, falling back to `config.default.toml`, then to
    /// built-in defaults when neither file exists.
    pub fn load() -> AnyResult<Self> {
        let config_path = if std::path::Path::new("config.toml").exists() {
            "config.toml"
        } else if std::path::Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            return Ok(Self::default());
        };

        let config_str = std::fs::read_to_string(config_path)?;
        if config_str.trim().is_empty() {
            return Err(format!("{} is empty", config_path).into());
        }

        Self::from_toml(&config_str)
    }

    pub fn from_toml(source: &str) -> AnyResult<Self> {
        let config: Config = toml::from_str(source)?;
        config.audio.validate().map_err(map_boxed_err)?;
        if config.mainloop.max_queued_packets == 0 {
            return Err("mainloop.max_queued_packets must be at least 1".into());
        }
        Ok(config)
    }
}
