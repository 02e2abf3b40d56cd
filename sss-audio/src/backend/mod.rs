//! Native backend capability interface
//!
//! Everything the core needs from a 3D-audio backend goes through the
//! [`AudioBackend`] trait: handle allocation, single-buffer binding, batched
//! queueing, transport commands, integer/float properties, listener gain,
//! endpoint enumeration and context management.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │   Device  ──  BufferRegistry / SourceRegistry │
//! │   Talks only to `dyn AudioBackend`            │
//! └──────────────┬───────────────────────────────┘
//!                ▼
//! ┌──────────────────────────────────────────────┐
//! │              trait AudioBackend               │
//! └──────┬───────────────────────────────────────┘
//!        ▼
//! ┌──────────────────┐
//! │  VirtualBackend  │  in-process reference backend
//! └──────────────────┘
//! ```
//!
//! Calls are synchronous and report a [`BackendError`] code on failure. The
//! core translates those codes into [`crate::AudioError`].

use std::fmt;
use std::num::NonZeroU32;

#[cfg(feature = "host-endpoints")]
pub mod host;
pub mod virtual_backend;

pub use virtual_backend::VirtualBackend;

/// Result type for raw backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Error code reported by a backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendError {
    /// A bad handle was passed
    InvalidName,
    /// An invalid enum value (parameter) was passed
    InvalidEnum,
    /// An invalid value was passed
    InvalidValue,
    /// The requested operation is not valid in the current state
    InvalidOperation,
    /// The backend ran out of memory or handles
    OutOfMemory,
    /// Backend-specific code with no mapping
    Unknown(i32),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => {
                write!(f, "INVALID_NAME: a bad name (handle) was passed to a backend function")
            }
            Self::InvalidEnum => {
                write!(f, "INVALID_ENUM: an invalid enum value was passed to a backend function")
            }
            Self::InvalidValue => {
                write!(f, "INVALID_VALUE: an invalid value was passed to a backend function")
            }
            Self::InvalidOperation => {
                write!(f, "INVALID_OPERATION: the requested operation is not valid")
            }
            Self::OutOfMemory => write!(
                f,
                "OUT_OF_MEMORY: the requested operation resulted in the backend running out of memory"
            ),
            Self::Unknown(code) => write!(f, "UNKNOWN BACKEND ERROR ({})", code),
        }
    }
}

impl std::error::Error for BackendError {}

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Wrap a raw backend value (`None` for the reserved 0)
            pub fn from_raw(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            /// Raw backend value
            pub fn raw(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

native_handle!(
    /// Native sample-buffer handle
    BufferHandle
);
native_handle!(
    /// Native playback-unit handle
    SourceHandle
);
native_handle!(
    /// Open output endpoint
    DeviceHandle
);
native_handle!(
    /// Backend context created on an open endpoint
    ContextHandle
);

/// PCM layout accepted by [`AudioBackend::buffer_data`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Mono16,
    Stereo16,
}

impl SampleFormat {
    /// Format for a channel count, if the backend supports it
    pub fn from_channels(channels: u16) -> Option<Self> {
        match channels {
            1 => Some(Self::Mono16),
            2 => Some(Self::Stereo16),
            _ => None,
        }
    }

    pub fn channels(self) -> u16 {
        match self {
            Self::Mono16 => 1,
            Self::Stereo16 => 2,
        }
    }

    /// Bytes per interleaved frame
    pub fn frame_bytes(self) -> usize {
        self.channels() as usize * 2
    }
}

/// Playback state reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SourceState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

impl SourceState {
    /// `Initial` and `Stopped` both count as "not playing"
    pub fn is_stopped(self) -> bool {
        matches!(self, Self::Initial | Self::Stopped)
    }

    pub(crate) fn to_raw(self) -> i32 {
        match self {
            Self::Initial => 0,
            Self::Playing => 1,
            Self::Paused => 2,
            Self::Stopped => 3,
        }
    }

    pub(crate) fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Initial),
            1 => Some(Self::Playing),
            2 => Some(Self::Paused),
            3 => Some(Self::Stopped),
            _ => None,
        }
    }
}

/// Binding mode of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Nothing bound
    Undetermined,
    /// Exactly one buffer bound directly
    Static,
    /// FIFO queue of buffers
    Streaming,
}

impl SourceType {
    pub(crate) fn to_raw(self) -> i32 {
        match self {
            Self::Undetermined => 0,
            Self::Static => 1,
            Self::Streaming => 2,
        }
    }

    pub(crate) fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Undetermined),
            1 => Some(Self::Static),
            2 => Some(Self::Streaming),
            _ => None,
        }
    }
}

/// Integer source properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceIntParam {
    /// Raw handle of the statically bound buffer (0 when none); writable
    Buffer,
    /// Read-only, see [`SourceState`]
    State,
    /// Read-only, see [`SourceType`]
    Type,
    /// 0 or 1
    Looping,
    /// Playback position in bytes from the start of the bound data
    ByteOffset,
    /// Playback position in sample frames
    SampleOffset,
    /// Read-only
    BuffersQueued,
    /// Read-only
    BuffersProcessed,
}

/// Float source properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFloatParam {
    Gain,
    Pitch,
    /// Playback position in seconds
    SecOffset,
}

/// Integer buffer properties (all read-only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferParam {
    Frequency,
    Bits,
    Channels,
    Size,
}

/// Native audio backend capability interface.
///
/// Every call runs on the thread that owns the current context; none of
/// these calls are safe to make concurrently.
pub trait AudioBackend {
    // === Endpoints ===

    /// Raw specifiers of all output endpoints currently visible
    fn enumerate_endpoints(&self) -> Vec<String>;

    /// Specifier of the system default endpoint
    fn default_endpoint(&self) -> Option<String>;

    /// Human-readable name for a specifier (vendor prefixes stripped)
    fn endpoint_display_name(&self, specifier: &str) -> String {
        specifier.to_string()
    }

    fn open_endpoint(&mut self, specifier: &str) -> BackendResult<DeviceHandle>;

    fn close_endpoint(&mut self, device: DeviceHandle) -> BackendResult<()>;

    // === Context ===

    fn create_context(&mut self, device: DeviceHandle) -> BackendResult<ContextHandle>;

    /// Make `context` current; `None` unbinds the current context
    fn make_context_current(&mut self, context: Option<ContextHandle>) -> BackendResult<()>;

    fn destroy_context(&mut self, context: ContextHandle) -> BackendResult<()>;

    // === Listener ===

    fn listener_gain(&self) -> BackendResult<f32>;

    fn set_listener_gain(&mut self, gain: f32) -> BackendResult<()>;

    // === Buffers ===

    fn gen_buffer(&mut self) -> BackendResult<BufferHandle>;

    /// Fails with `InvalidOperation` while the buffer is attached to a source
    fn delete_buffer(&mut self, buffer: BufferHandle) -> BackendResult<()>;

    /// Fill a buffer with interleaved 16-bit PCM.
    ///
    /// Fails with `InvalidOperation` while the buffer is attached to a source.
    fn buffer_data(
        &mut self,
        buffer: BufferHandle,
        format: SampleFormat,
        samples: &[i16],
        sample_rate: u32,
    ) -> BackendResult<()>;

    fn buffer_int(&self, buffer: BufferHandle, param: BufferParam) -> BackendResult<i32>;

    // === Sources ===

    fn gen_source(&mut self) -> BackendResult<SourceHandle>;

    fn delete_source(&mut self, source: SourceHandle) -> BackendResult<()>;

    fn play(&mut self, source: SourceHandle) -> BackendResult<()>;

    fn pause(&mut self, source: SourceHandle) -> BackendResult<()>;

    fn stop(&mut self, source: SourceHandle) -> BackendResult<()>;

    /// Bind one buffer statically, or clear every binding and queue with `None`
    fn set_source_buffer(
        &mut self,
        source: SourceHandle,
        buffer: Option<BufferHandle>,
    ) -> BackendResult<()>;

    /// Append buffers to the streaming queue in one batch
    fn queue_buffers(&mut self, source: SourceHandle, buffers: &[BufferHandle]) -> BackendResult<()>;

    fn source_int(&self, source: SourceHandle, param: SourceIntParam) -> BackendResult<i32>;

    fn set_source_int(
        &mut self,
        source: SourceHandle,
        param: SourceIntParam,
        value: i32,
    ) -> BackendResult<()>;

    fn source_float(&self, source: SourceHandle, param: SourceFloatParam) -> BackendResult<f32>;

    fn set_source_float(
        &mut self,
        source: SourceHandle,
        param: SourceFloatParam,
        value: f32,
    ) -> BackendResult<()>;

    // === Typed helpers ===

    fn source_state(&self, source: SourceHandle) -> BackendResult<SourceState> {
        let raw = self.source_int(source, SourceIntParam::State)?;
        SourceState::from_raw(raw).ok_or(BackendError::Unknown(raw))
    }

    fn source_type(&self, source: SourceHandle) -> BackendResult<SourceType> {
        let raw = self.source_int(source, SourceIntParam::Type)?;
        SourceType::from_raw(raw).ok_or(BackendError::Unknown(raw))
    }

    fn source_buffer(&self, source: SourceHandle) -> BackendResult<Option<BufferHandle>> {
        let raw = self.source_int(source, SourceIntParam::Buffer)?;
        Ok(BufferHandle::from_raw(raw as u32))
    }

    /// Backend name for diagnostics
    fn name(&self) -> &'static str;
}
