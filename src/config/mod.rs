use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the player lives on the session bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub name: String,
    pub properties_path: String,
    pub player_interface: String,
    pub root_interface: String,
    pub legacy_path: String,
    pub legacy_interface: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: "com.spotify.qt".to_string(),
            properties_path: "/org/mpris/MediaPlayer2".to_string(),
            player_interface: "org.mpris.MediaPlayer2.Player".to_string(),
            root_interface: "org.mpris.MediaPlayer2".to_string(),
            legacy_path: "/".to_string(),
            legacy_interface: "org.freedesktop.MediaPlayer2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub attempts: u32,
    pub delay_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay_secs: 5,
        }
    }
}

impl ReconnectConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub redraw_interval_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            redraw_interval_ms: 1000,
        }
    }
}

impl DashboardConfig {
    pub fn redraw_interval(&self) -> Duration {
        Duration::from_millis(self.redraw_interval_ms.max(50))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log file; defaults to `spotify-remote.log` in the config directory.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Where logs go. Never the terminal, which belongs to the dashboard.
    pub fn path(&self) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| Config::config_dir().join("spotify-remote.log"))
    }
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spotify-remote")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
            let config: Config =
                toml::from_str(&content).with_context(|| "Failed to parse config file")?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}
