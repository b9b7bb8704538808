use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LayerError;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "VKOVERLAY_CONFIG";

/// Environment variable that forces the overlay off when set to `1`.
pub const DISABLE_ENV: &str = "VKOVERLAY_DISABLE";

/// Top-level layer configuration, loaded from vkoverlay.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LayerConfig {
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlayConfig {
    /// When false every device is left inert and presents pass through
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Screen corner the badge is anchored to
    #[serde(default)]
    pub corner: Corner,
    /// Distance from the anchored corner, in pixels
    #[serde(default = "default_margin")]
    pub margin: u32,
    /// Badge width in pixels
    #[serde(default = "default_width")]
    pub width: u32,
    /// Badge height in pixels
    #[serde(default = "default_height")]
    pub height: u32,
    /// Badge color (RGBA, 0.0..=1.0)
    #[serde(default = "default_color")]
    pub color: [f32; 4],
    /// Draw a bar under the badge that advances every presented frame
    #[serde(default = "default_true")]
    pub frame_meter: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// tracing filter used when VKOVERLAY_LOG is not set
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            corner: Corner::default(),
            margin: default_margin(),
            width: default_width(),
            height: default_height(),
            color: default_color(),
            frame_meter: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl LayerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, LayerError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, LayerError> {
        toml::from_str(content).map_err(|e| LayerError::Config(e.to_string()))
    }

    /// Load configuration from file if it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve the configuration the layer runs with: the file named by
    /// VKOVERLAY_CONFIG, else the platform default, then environment overrides.
    pub fn from_environment() -> Self {
        let mut config = match default_config_path() {
            Some(path) => Self::load_or_default(&path),
            None => Self::default(),
        };
        if std::env::var(DISABLE_ENV).is_ok_and(|v| v == "1") {
            config.overlay.enabled = false;
        }
        config
    }

    pub fn to_toml(&self) -> Result<String, LayerError> {
        toml::to_string_pretty(self).map_err(|e| LayerError::Config(e.to_string()))
    }
}

/// Returns the config file path.
/// Search order:
/// 1. `$VKOVERLAY_CONFIG`
/// 2. `vkoverlay.toml` in the per-user config directory
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    vkoverlay_common::platform::config_dir()
        .map(|dir| dir.join(vkoverlay_common::platform::CONFIG_FILE_NAME))
}

fn default_true() -> bool {
    true
}

fn default_margin() -> u32 {
    16
}

fn default_width() -> u32 {
    160
}

fn default_height() -> u32 {
    24
}

fn default_color() -> [f32; 4] {
    [0.1, 0.8, 0.3, 1.0]
}

fn default_filter() -> String {
    "warn".to_string()
}
