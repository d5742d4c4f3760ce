//! Application configuration
//!
//! Read from `<config_dir>/keyrhythm/config.toml`. A missing file is replaced
//! by the defaults so the first run always has something to edit. Every
//! section is optional in the file; absent keys take their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::keyboard::TempoSettings;
use crate::mapping::MapperSettings;
use crate::monitor::MonitorSettings;
use crate::transport::MqttConfig;

const APP_DIR: &str = "keyrhythm";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub flash_reset_ms: u64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            flash_reset_ms: 200,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Without a broker, commands are only logged
    pub mqtt: Option<MqttConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tempo: TempoSettings,
    pub mapper: MapperSettings,
    pub display: DisplaySettings,
    pub transport: TransportSettings,
}

impl AppConfig {
    /// Loads the config from its standard location, writing defaults first if needed
    pub async fn load() -> Result<Self, ConfigError> {
        let path = config_path();
        Self::ensure_default(&path).await?;
        Self::load_from(&path).await
    }

    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading config from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Writes the default config to `path` unless a file is already there
    pub async fn ensure_default(path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if tokio::fs::try_exists(path).await.map_err(io_error)? {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let content = toml::to_string_pretty(&AppConfig::default())?;
        tokio::fs::write(path, content).await.map_err(io_error)?;
        info!("Wrote default config to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mapper = &self.mapper;
        if mapper.trigger_count < 2 {
            return Err(invalid(format!(
                "mapper.trigger_count must be at least 2, got {}",
                mapper.trigger_count
            )));
        }
        if mapper.min_interval_ms == 0 {
            return Err(invalid("mapper.min_interval_ms must be positive"));
        }
        if mapper.min_interval_ms > mapper.max_interval_ms {
            return Err(invalid(format!(
                "mapper.min_interval_ms ({}) exceeds max_interval_ms ({})",
                mapper.min_interval_ms, mapper.max_interval_ms
            )));
        }
        if !(mapper.min_interval_ms..=mapper.max_interval_ms).contains(&mapper.default_interval_ms) {
            return Err(invalid(format!(
                "mapper.default_interval_ms ({}) is outside [{}, {}]",
                mapper.default_interval_ms, mapper.min_interval_ms, mapper.max_interval_ms
            )));
        }

        if self.tempo.bounce_threshold_ms >= self.tempo.idle_reset_ms {
            return Err(invalid(format!(
                "tempo.bounce_threshold_ms ({}) must be below idle_reset_ms ({})",
                self.tempo.bounce_threshold_ms, self.tempo.idle_reset_ms
            )));
        }

        if self.display.flash_reset_ms == 0 {
            return Err(invalid("display.flash_reset_ms must be positive"));
        }

        if let Some(mqtt) = &self.transport.mqtt {
            if mqtt.host.trim().is_empty() {
                return Err(invalid("transport.mqtt.host is empty"));
            }
            if mqtt.topic.trim().is_empty() {
                return Err(invalid("transport.mqtt.topic is empty"));
            }
        }

        Ok(())
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            tempo: self.tempo.clone(),
            mapper: self.mapper.clone(),
            flash_reset: Duration::from_millis(self.display.flash_reset_ms),
        }
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(reason.into())
}

pub fn config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| {
        warn!("No config directory found, using current directory");
        PathBuf::from(".")
    });
    base.join(APP_DIR).join(CONFIG_FILE)
}
