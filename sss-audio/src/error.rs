//! Error types for sss-audio
//!
//! `Device` is the only fatal variant: it means the backend context could not
//! be brought up and no buffer or source operation can proceed. Everything
//! else is recoverable and leaves the registries consistent.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendError;

/// Main error type for sss-audio
#[derive(Error, Debug)]
pub enum AudioError {
    /// The backend could not allocate a handle, or the source pool is full
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Source ID outside the fixed slot range
    #[error("ID {id} out of range (capacity {capacity})")]
    OutOfRange { id: u32, capacity: usize },

    /// Lookup of an ID that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Audio file could not be opened or read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Channel count other than mono or stereo
    #[error("Unsupported format: {channels} channels (expected mono or stereo)")]
    UnsupportedFormat { channels: u16 },

    /// File opened but its contents could not be decoded
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// A backend call reported a non-success code
    #[error("Backend error during {operation}: {error}")]
    Backend {
        operation: &'static str,
        error: BackendError,
    },

    /// Device or context setup failed
    #[error("Device error: {0}")]
    Device(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AudioError {
    /// Whether the subsystem is unusable after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Device(_))
    }

    pub(crate) fn backend(operation: &'static str) -> impl FnOnce(BackendError) -> Self {
        move |error| Self::Backend { operation, error }
    }
}

/// Convenience Result type using sss-audio AudioError
pub type Result<T> = std::result::Result<T, AudioError>;
