//! Application configuration management.

use std::path::{Path, PathBuf};

use color_eyre::Result;
use serde::{Deserialize, Serialize};

use crate::client::{Credentials, StreamOptions};

/// Lower bound for the progress timer period.
pub const MIN_PROGRESS_INTERVAL_MS: u64 = 50;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Player configuration
    #[serde(default)]
    pub player: PlayerConfig,

    /// Home feed configuration
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Server connection configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server URL (e.g., "https://music.example.com")
    #[serde(default)]
    pub url: String,

    /// Username for authentication
    #[serde(default)]
    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// API key for OpenSubsonic servers (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Player configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Volume level (0-100)
    #[serde(default = "default_volume")]
    pub volume: u8,

    /// Preferred audio format for streaming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Maximum bitrate for streaming in kbps (0 = no limit)
    #[serde(default)]
    pub max_bitrate: u32,

    /// Period of playback progress updates
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

/// Home feed configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Records requested per feed section
    #[serde(default = "default_section_size")]
    pub section_size: u32,
}

fn default_volume() -> u8 {
    80
}

fn default_progress_interval() -> u64 {
    500
}

fn default_section_size() -> u32 {
    20
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            format: None,
            max_bitrate: 0,
            progress_interval_ms: default_progress_interval(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            section_size: default_section_size(),
        }
    }
}

impl Config {
    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine config directory"))?;

        Ok(config_dir.join("catalog-player").join("config.toml"))
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse TOML and clamp values into range.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        config.player.volume = config.player.volume.min(100);
        config.player.progress_interval_ms = config
            .player
            .progress_interval_ms
            .max(MIN_PROGRESS_INTERVAL_MS);
        config.player.format = config.player.format.filter(|f| !f.trim().is_empty());

        Ok(config)
    }

    /// Save configuration to `path`.
    #[allow(dead_code)]
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Check if the configuration is valid for connecting.
    pub fn is_valid(&self) -> bool {
        // URL must be non-empty and start with http:// or https://
        let valid_url = !self.server.url.is_empty()
            && (self.server.url.starts_with("http://") || self.server.url.starts_with("https://"));

        valid_url && self.credentials().is_some()
    }

    /// Credentials to sign requests with, preferring an API key.
    pub fn credentials(&self) -> Option<Credentials> {
        if let Some(key) = self.server.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(Credentials::from_api_key(key.as_str()));
        }

        match self.server.password.as_ref() {
            Some(password) if !password.is_empty() && !self.server.username.is_empty() => Some(
                Credentials::from_password(self.server.username.as_str(), password.as_str()),
            ),
            _ => None,
        }
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            format: self.player.format.clone(),
            max_bitrate: self.player.max_bitrate,
        }
    }
}
