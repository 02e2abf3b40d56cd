//! Configuration for the audio subsystem
//!
//! Loaded from a TOML file; every field has a built-in default so an empty
//! file (or no file) is a valid configuration.
//!
//! ```toml
//! preferred_endpoint = "Headphones"
//! master_volume = 80
//!
//! [virtual_backend]
//! endpoints = ["Speakers", "Headphones"]
//! max_sources = 256
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::backend::virtual_backend::{DEFAULT_MAX_BUFFERS, DEFAULT_MAX_SOURCES};
use crate::error::{AudioError, Result};

/// Audio subsystem configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Endpoint display name opened on first use instead of the default endpoint
    pub preferred_endpoint: Option<String>,

    /// Master volume (percent) applied once the context is current
    pub master_volume: Option<i32>,

    /// Settings for the in-process backend
    pub virtual_backend: VirtualBackendConfig,
}

/// `[virtual_backend]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VirtualBackendConfig {
    /// Endpoint display names; the first is the default unless `default_endpoint` is set
    pub endpoints: Vec<String>,

    pub default_endpoint: Option<String>,

    pub max_buffers: usize,

    pub max_sources: usize,

    /// Append the host's real output device names (feature `host-endpoints`)
    pub use_host_endpoints: bool,
}

impl Default for VirtualBackendConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            default_endpoint: None,
            max_buffers: DEFAULT_MAX_BUFFERS,
            max_sources: DEFAULT_MAX_SOURCES,
            use_host_endpoints: false,
        }
    }
}

impl AudioConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path).map_err(|e| {
            AudioError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&toml_str)?;
        info!("Loaded audio configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| AudioError::Config(format!("Failed to parse TOML: {}", e)))
    }
}
