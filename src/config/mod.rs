//! Configuration management
//!
//! Loads and parses TOML configuration: socket naming, cursor appearance,
//! and the frame interval used when the backend has no hardware vsync.

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// General compositor settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Cursor appearance
    #[serde(default)]
    pub cursor: CursorConfig,

    /// Frame timing for backends without hardware vsync
    #[serde(default)]
    pub frame: FrameConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Base name for the listening socket ("wayland" yields wayland-0,
    /// wayland-1, ...)
    #[serde(default = "GeneralConfig::default_socket_prefix")]
    pub socket_prefix: String,
}

impl GeneralConfig {
    fn default_socket_prefix() -> String {
        "wayland".to_string()
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            socket_prefix: Self::default_socket_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CursorConfig {
    /// Default cursor glyph shown in passthrough mode
    #[serde(default = "CursorConfig::default_image_name")]
    pub default_image: String,

    /// Cursor theme size (pixels)
    #[serde(default = "CursorConfig::default_size")]
    pub size: u32,
}

impl CursorConfig {
    fn default_image_name() -> String {
        "left_ptr".to_string()
    }

    fn default_size() -> u32 {
        24
    }
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            default_image: Self::default_image_name(),
            size: Self::default_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameConfig {
    /// Interval between synthesized frame events (milliseconds)
    #[serde(default = "FrameConfig::default_interval_ms")]
    pub interval_ms: u64,
}

impl FrameConfig {
    fn default_interval_ms() -> u64 {
        16
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file: {}", path))?;
        Ok(config)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame.interval_ms)
    }
}
