//! # SSS Audio Library (sss-audio)
//!
//! Lifecycle and binding of audio sources and sample buffers on top of a
//! native audio backend.
//!
//! **Purpose:** Own native buffer and source handles in ID-keyed registries,
//! bind sources to buffers either statically or as a streaming queue, and
//! tear everything down in the right order when a buffer or the device goes
//! away.
//!
//! **Architecture:** [`Device`] is an explicit context object owning an
//! [`AudioBackend`](backend::AudioBackend), a [`SampleDecoder`](decoder::SampleDecoder)
//! and both registries. Single-threaded; the backend context is not reentrant.
//!
//! ```no_run
//! use sss_audio::{Device, VirtualBackend};
//!
//! # fn main() -> sss_audio::Result<()> {
//! let mut device = Device::new(VirtualBackend::new());
//! device
//!     .buffers()?
//!     .create_from_file(Some(0), std::path::Path::new("clip.wav"))?;
//!
//! let mut sources = device.sources()?;
//! sources.create(0)?;
//! let mut source = sources.control(0);
//! source.use_buffer(0)?;
//! source.play()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod buffer;
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod source;

pub use backend::{AudioBackend, SourceState, VirtualBackend};
pub use config::AudioConfig;
pub use device::{Device, DeviceStatus, SourceControl};
pub use error::{AudioError, Result};
pub use source::MAX_SOURCES;
