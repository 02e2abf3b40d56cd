//! Buffer registry
//!
//! Owns every native sample-buffer handle, keyed by a caller-chosen ID.
//! Sources only ever hold the handle value of a buffer, never the buffer
//! itself, so before a handle is refilled or released every holder is asked
//! to let go of it through [`BufferHolders`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::backend::{AudioBackend, BackendError, BufferHandle, BufferParam, SampleFormat};
use crate::decoder::SampleDecoder;
use crate::error::{AudioError, Result};

/// Anything that may hold weak references to buffer handles.
///
/// Implemented by the source registry; the buffer side only needs this one
/// call to honour "detach before release".
pub trait BufferHolders {
    /// Drop every reference to `handle`, rebinding whatever else was attached
    fn release_buffer_handle(&mut self, backend: &mut dyn AudioBackend, handle: BufferHandle);
}

/// Backend-reported buffer metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferInfo {
    pub frequency: i32,
    pub bits: i32,
    pub channels: i32,
    pub size: i32,
}

/// One decoded sample container
#[derive(Debug)]
pub struct Buffer {
    id: u32,
    handle: BufferHandle,
    loaded: bool,
}

impl Buffer {
    fn new(backend: &mut dyn AudioBackend, id: u32) -> Result<Self> {
        let handle = backend.gen_buffer().map_err(|e| match e {
            BackendError::OutOfMemory => {
                AudioError::ResourceExhausted(format!("Couldn't generate a native buffer: {}", e))
            }
            other => AudioError::Backend {
                operation: "generate buffer",
                error: other,
            },
        })?;
        debug!("Buffer {} created (handle {})", id, handle);
        Ok(Self {
            id,
            handle,
            loaded: false,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Whether sample data has been uploaded successfully
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Detach this buffer from every source currently referencing it
    pub fn detach_from_holders(
        &self,
        backend: &mut dyn AudioBackend,
        holders: &mut dyn BufferHolders,
    ) {
        holders.release_buffer_handle(backend, self.handle);
    }

    /// Decode `path` and upload it, replacing any previous content.
    pub fn load(
        &mut self,
        backend: &mut dyn AudioBackend,
        decoder: &dyn SampleDecoder,
        holders: &mut dyn BufferHolders,
        path: &Path,
    ) -> Result<()> {
        let audio = decoder.decode(path)?;

        let format = SampleFormat::from_channels(audio.channels).ok_or(
            AudioError::UnsupportedFormat {
                channels: audio.channels,
            },
        )?;

        // A native buffer cannot be refilled while attached
        self.detach_from_holders(backend, holders);

        if let Err(e) = backend.buffer_data(self.handle, format, &audio.samples, audio.sample_rate)
        {
            self.loaded = false;
            return Err(AudioError::Backend {
                operation: "fill buffer",
                error: e,
            });
        }

        self.loaded = true;
        info!(
            "Buffer {} loaded from {} ({} frames, {} ch @ {} Hz)",
            self.id,
            path.display(),
            audio.frames(),
            audio.channels,
            audio.sample_rate
        );
        Ok(())
    }

    /// Raw backend property; 0 if the backend rejects the query
    pub fn property(&self, backend: &dyn AudioBackend, param: BufferParam) -> i32 {
        backend.buffer_int(self.handle, param).unwrap_or_else(|e| {
            warn!("Buffer {}: query {:?} failed: {}", self.id, param, e);
            0
        })
    }

    pub fn info(&self, backend: &dyn AudioBackend) -> BufferInfo {
        BufferInfo {
            frequency: self.property(backend, BufferParam::Frequency),
            bits: self.property(backend, BufferParam::Bits),
            channels: self.property(backend, BufferParam::Channels),
            size: self.property(backend, BufferParam::Size),
        }
    }

    /// Detach from all holders, then delete the native handle
    fn release(self, backend: &mut dyn AudioBackend, holders: &mut dyn BufferHolders) {
        self.detach_from_holders(backend, holders);
        match backend.delete_buffer(self.handle) {
            Ok(()) => debug!("Buffer {} released (handle {})", self.id, self.handle),
            Err(e) => error!(
                "Buffer {}: failed to delete handle {}: {}",
                self.id, self.handle, e
            ),
        }
    }
}

/// Unbounded map of live buffers keyed by ID
#[derive(Debug, Default)]
pub struct BufferRegistry {
    buffers: BTreeMap<u32, Buffer>,
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer at `id`, tearing down any buffer already there
    pub fn create(
        &mut self,
        backend: &mut dyn AudioBackend,
        holders: &mut dyn BufferHolders,
        id: u32,
    ) -> Result<&mut Buffer> {
        if let Some(old) = self.buffers.remove(&id) {
            debug!("Buffer {} replaced", id);
            old.release(backend, holders);
        }
        let buffer = Buffer::new(backend, id)?;
        Ok(self.buffers.entry(id).or_insert(buffer))
    }

    /// Lowest non-negative ID not currently in use
    pub fn next_free_id(&self) -> u32 {
        (0..=u32::MAX)
            .find(|id| !self.buffers.contains_key(id))
            .unwrap_or(u32::MAX)
    }

    pub fn get(&self, id: u32) -> Option<&Buffer> {
        self.buffers.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Buffer> {
        self.buffers.get_mut(&id)
    }

    /// Registry ID of the buffer owning `handle`
    pub fn id_of(&self, handle: BufferHandle) -> Option<u32> {
        self.buffers
            .values()
            .find(|b| b.handle == handle)
            .map(|b| b.id)
    }

    /// Remove and release the buffer at `id`; no-op if absent
    pub fn remove(
        &mut self,
        backend: &mut dyn AudioBackend,
        holders: &mut dyn BufferHolders,
        id: u32,
    ) {
        match self.buffers.remove(&id) {
            Some(buffer) => buffer.release(backend, holders),
            None => debug!("Buffer {} not found, nothing to remove", id),
        }
    }

    /// Release every buffer
    pub fn clear_all(&mut self, backend: &mut dyn AudioBackend, holders: &mut dyn BufferHolders) {
        let buffers = std::mem::take(&mut self.buffers);
        if !buffers.is_empty() {
            debug!("Releasing {} buffers", buffers.len());
        }
        for buffer in buffers.into_values() {
            buffer.release(backend, holders);
        }
    }

    pub fn ids(&self) -> Vec<u32> {
        self.buffers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
