//! Demo configuration file
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [audio]
//! preferred_endpoint = "Headphones"
//! master_volume = 80
//!
//! [audio.virtual_backend]
//! endpoints = ["Speakers", "Headphones"]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use sss_audio::AudioConfig;

/// Top-level demo configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub logging: LoggingConfig,
    pub audio: AudioConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// EnvFilter directive covering both crates at the configured level
    pub fn filter_directive(&self) -> String {
        format!("sss_audio={0},sss_audio_demo={0}", self.level)
    }
}

impl DemoConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&toml_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}
