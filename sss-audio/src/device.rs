//! Audio device context
//!
//! [`Device`] owns the backend, both registries and the live
//! endpoint/context session. Nothing touches a native handle without going
//! through it, so "no buffer or source handle outlives the context" holds by
//! construction:
//!
//! ```text
//!   Device<B>
//!     ├── backend: B                 (owns native device + context)
//!     ├── buffers: BufferRegistry    (owns buffer handles)
//!     ├── sources: SourceRegistry    (owns source handles,
//!     │                               weak refs to buffer handles)
//!     └── session: Option<Session>   (None until first use / after shutdown)
//! ```
//!
//! The session is opened lazily by [`Device::buffers`] and
//! [`Device::sources`]; a failure there is a fatal [`AudioError::Device`]
//! and leaves the device uninitialised so the next call retries.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::backend::{
    AudioBackend, BufferHandle, BufferParam, ContextHandle, DeviceHandle, SourceFloatParam,
    SourceIntParam, SourceState, SourceType, VirtualBackend,
};
use crate::buffer::{Buffer, BufferInfo, BufferRegistry};
use crate::config::AudioConfig;
use crate::decoder::{SampleDecoder, SymphoniaDecoder};
use crate::error::{AudioError, Result};
use crate::source::{gain_to_percent, percent_to_gain, Source, SourceRegistry, SourceStatus};

/// One enumerated output endpoint
#[derive(Debug, Clone)]
struct Endpoint {
    /// Name shown to callers
    name: String,
    /// Backend specifier passed to `open_endpoint`
    specifier: String,
}

/// Open endpoint plus its current context
#[derive(Debug)]
struct Session {
    device: DeviceHandle,
    context: ContextHandle,
    endpoint: String,
}

/// Serialisable snapshot of the whole subsystem
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub backend: &'static str,
    pub endpoint: Option<String>,
    pub endpoints: Vec<String>,
    pub master_volume: i32,
    pub buffers: Vec<u32>,
    pub sources: Vec<SourceStatus>,
}

/// Audio device context owning every native resource
pub struct Device<B: AudioBackend> {
    backend: B,
    decoder: Box<dyn SampleDecoder>,
    buffers: BufferRegistry,
    sources: SourceRegistry,
    session: Option<Session>,
    endpoints: Vec<Endpoint>,
    preferred_endpoint: Option<String>,
    initial_volume: Option<i32>,
}

impl Device<VirtualBackend> {
    /// Device on a [`VirtualBackend`] built from `config`
    pub fn from_config(config: &AudioConfig) -> Self {
        Self::with_config(VirtualBackend::from_config(&config.virtual_backend), config)
    }

    /// Simulate `bytes` of playback on source `source_id`
    pub fn advance(&mut self, source_id: u32, bytes: usize) -> Result<SourceState> {
        self.ensure_initialized()?;
        let handle = self
            .sources
            .get(source_id)
            .map(Source::handle)
            .ok_or_else(|| AudioError::NotFound(format!("source {}", source_id)))?;
        self.backend
            .advance(handle, bytes)
            .map_err(AudioError::backend("advance playback"))
    }
}

impl<B: AudioBackend> Device<B> {
    /// Device with the symphonia decoder and no configured preferences
    pub fn new(backend: B) -> Self {
        Self::with_decoder(backend, Box::new(SymphoniaDecoder::new()))
    }

    pub fn with_decoder(backend: B, decoder: Box<dyn SampleDecoder>) -> Self {
        let mut device = Self {
            backend,
            decoder,
            buffers: BufferRegistry::new(),
            sources: SourceRegistry::new(),
            session: None,
            endpoints: Vec::new(),
            preferred_endpoint: None,
            initial_volume: None,
        };
        device.refresh_endpoints();
        device
    }

    /// Device honouring `preferred_endpoint` and `master_volume` from `config`
    pub fn with_config(backend: B, config: &AudioConfig) -> Self {
        let mut device = Self::new(backend);
        device.preferred_endpoint = config.preferred_endpoint.clone();
        device.initial_volume = config.master_volume;
        device
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Open the endpoint and make a context current; no-op once initialised.
    ///
    /// Re-enumerates endpoints, then tries the preferred endpoint and falls
    /// back to the backend default if it cannot be opened.
    pub fn ensure_initialized(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        self.refresh_endpoints();

        let default = self
            .backend
            .default_endpoint()
            .map(|spec| self.backend.endpoint_display_name(&spec));
        let target = self
            .preferred_endpoint
            .clone()
            .or_else(|| default.clone())
            .ok_or_else(|| AudioError::Device("No audio output endpoint available".to_string()))?;

        if let Err(e) = self.open_session(&target) {
            match default {
                Some(default) if default != target => {
                    warn!(
                        "Requested endpoint '{}' failed ({}), falling back to default endpoint",
                        target, e
                    );
                    self.open_session(&default)?;
                    info!("Using default endpoint as fallback: {}", default);
                }
                _ => return Err(e),
            }
        }

        if let Some(volume) = self.initial_volume {
            if let Err(e) = self.apply_master_volume(volume) {
                warn!("Failed to apply configured master volume: {}", e);
            }
        }
        Ok(())
    }

    fn open_session(&mut self, name: &str) -> Result<()> {
        let specifier = self
            .endpoints
            .iter()
            .find(|e| e.name == name)
            .map_or_else(|| name.to_string(), |e| e.specifier.clone());

        let device = self.backend.open_endpoint(&specifier).map_err(|e| {
            AudioError::Device(format!("Failed to open endpoint '{}': {}", name, e))
        })?;

        let context = match self.backend.create_context(device) {
            Ok(context) => context,
            Err(e) => {
                self.close_quietly(device);
                return Err(AudioError::Device(format!(
                    "Failed to create context on '{}': {}",
                    name, e
                )));
            }
        };

        if let Err(e) = self.backend.make_context_current(Some(context)) {
            if let Err(destroy_err) = self.backend.destroy_context(context) {
                warn!("Failed to destroy unused context: {}", destroy_err);
            }
            self.close_quietly(device);
            return Err(AudioError::Device(format!(
                "Failed to make context current on '{}': {}",
                name, e
            )));
        }

        info!("Audio device opened: {} ({} backend)", name, self.backend.name());
        self.session = Some(Session {
            device,
            context,
            endpoint: name.to_string(),
        });
        Ok(())
    }

    fn close_quietly(&mut self, device: DeviceHandle) {
        if let Err(e) = self.backend.close_endpoint(device) {
            warn!("Failed to close endpoint {}: {}", device, e);
        }
    }

    // === Endpoints ===

    /// Re-enumerate output endpoints from the backend
    pub fn refresh_endpoints(&mut self) {
        self.endpoints = self
            .backend
            .enumerate_endpoints()
            .into_iter()
            .map(|specifier| Endpoint {
                name: self.backend.endpoint_display_name(&specifier),
                specifier,
            })
            .collect();
        debug!("Enumerated {} output endpoints", self.endpoints.len());
    }

    /// Endpoint names from the last enumeration
    pub fn list_endpoints(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.name.clone()).collect()
    }

    pub fn current_endpoint(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.endpoint.as_str())
    }

    /// Move the session to endpoint `name`.
    ///
    /// Unknown names are logged and ignored. Switching releases every
    /// source and buffer before the old context goes away.
    pub fn select_endpoint(&mut self, name: &str) -> Result<()> {
        if !self.endpoints.iter().any(|e| e.name == name) {
            warn!("Audio endpoint '{}' not found, keeping current endpoint", name);
            return Ok(());
        }
        if self.current_endpoint() == Some(name) {
            debug!("Endpoint '{}' already selected", name);
            return Ok(());
        }

        self.preferred_endpoint = Some(name.to_string());
        if self.session.is_some() {
            self.shutdown();
            self.open_session(name)?;
            if let Some(volume) = self.initial_volume {
                if let Err(e) = self.apply_master_volume(volume) {
                    warn!("Failed to apply configured master volume: {}", e);
                }
            }
        }
        info!("Selected audio endpoint: {}", name);
        Ok(())
    }

    // === Master volume ===

    /// Set listener gain from a percentage clamped to 0–100
    pub fn set_master_volume(&mut self, percent: i32) -> Result<()> {
        self.ensure_initialized()?;
        self.apply_master_volume(percent)?;
        self.initial_volume = Some(percent.clamp(0, 100));
        Ok(())
    }

    fn apply_master_volume(&mut self, percent: i32) -> Result<()> {
        self.backend
            .set_listener_gain(percent_to_gain(percent))
            .map_err(AudioError::backend("set master volume"))
    }

    /// Master volume as a percentage; 0 if the backend query fails
    pub fn master_volume(&mut self) -> Result<i32> {
        self.ensure_initialized()?;
        Ok(self
            .backend
            .listener_gain()
            .map(gain_to_percent)
            .unwrap_or_else(|e| {
                warn!("Failed to query master volume: {}", e);
                0
            }))
    }

    // === Registries ===

    /// Buffer registry view, initialising the device first
    pub fn buffers(&mut self) -> Result<Buffers<'_>> {
        self.ensure_initialized()?;
        Ok(Buffers {
            backend: &mut self.backend,
            decoder: self.decoder.as_ref(),
            buffers: &mut self.buffers,
            sources: &mut self.sources,
        })
    }

    /// Source registry view, initialising the device first
    pub fn sources(&mut self) -> Result<Sources<'_>> {
        self.ensure_initialized()?;
        Ok(Sources {
            backend: &mut self.backend,
            buffers: &self.buffers,
            sources: &mut self.sources,
        })
    }

    pub fn status(&mut self) -> Result<DeviceStatus> {
        let master_volume = self.master_volume()?;
        let backend: &dyn AudioBackend = &self.backend;
        let sources = self
            .sources
            .iter()
            .map(|source| SourceStatus {
                id: source.id(),
                state: source.state(backend).unwrap_or_else(|e| {
                    warn!("Source {}: {}", source.id(), e);
                    SourceState::Stopped
                }),
                buffer_ids: source.buffer_ids(&self.buffers),
            })
            .collect();

        Ok(DeviceStatus {
            backend: self.backend.name(),
            endpoint: self.current_endpoint().map(str::to_string),
            endpoints: self.list_endpoints(),
            master_volume,
            buffers: self.buffers.ids(),
            sources,
        })
    }

    /// Release every source and buffer, then tear down the context and endpoint.
    ///
    /// The next registry access re-initialises lazily.
    pub fn shutdown(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        info!("Shutting down audio device '{}'", session.endpoint);

        self.sources.clear_all(&mut self.backend);
        self.buffers.clear_all(&mut self.backend, &mut self.sources);

        if let Err(e) = self.backend.make_context_current(None) {
            error!("Failed to release current context: {}", e);
        }
        if let Err(e) = self.backend.destroy_context(session.context) {
            error!("Failed to destroy context {}: {}", session.context, e);
        }
        if let Err(e) = self.backend.close_endpoint(session.device) {
            error!("Failed to close endpoint '{}': {}", session.endpoint, e);
        }
    }
}

impl<B: AudioBackend> Drop for Device<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Buffer operations bound to a live device
pub struct Buffers<'a> {
    backend: &'a mut dyn AudioBackend,
    decoder: &'a dyn SampleDecoder,
    buffers: &'a mut BufferRegistry,
    sources: &'a mut SourceRegistry,
}

impl Buffers<'_> {
    /// Create an empty buffer at `id`, replacing any buffer already there
    pub fn create(&mut self, id: u32) -> Result<&Buffer> {
        let buffer = self.buffers.create(&mut *self.backend, &mut *self.sources, id)?;
        Ok(&*buffer)
    }

    /// Create an empty buffer at the lowest unused ID
    pub fn create_auto(&mut self) -> Result<&Buffer> {
        let id = self.buffers.next_free_id();
        self.create(id)
    }

    /// Create a buffer (at `id`, or the lowest unused ID) and load `path` into it.
    ///
    /// On a load failure the empty buffer stays registered.
    pub fn create_from_file(&mut self, id: Option<u32>, path: &Path) -> Result<&Buffer> {
        let id = id.unwrap_or_else(|| self.buffers.next_free_id());
        let buffer = self.buffers.create(&mut *self.backend, &mut *self.sources, id)?;
        buffer.load(&mut *self.backend, self.decoder, &mut *self.sources, path)?;
        Ok(&*buffer)
    }

    /// Decode `path` into the existing buffer `id`
    pub fn load(&mut self, id: u32, path: &Path) -> Result<()> {
        let buffer = self
            .buffers
            .get_mut(id)
            .ok_or_else(|| AudioError::NotFound(format!("buffer {}", id)))?;
        buffer.load(&mut *self.backend, self.decoder, &mut *self.sources, path)
    }

    pub fn get(&self, id: u32) -> Option<&Buffer> {
        self.buffers.get(id)
    }

    /// Detach buffer `id` from every source and release it; no-op if absent
    pub fn remove(&mut self, id: u32) {
        self.buffers.remove(&mut *self.backend, &mut *self.sources, id);
    }

    pub fn clear_all(&mut self) {
        self.buffers.clear_all(&mut *self.backend, &mut *self.sources);
    }

    /// Backend property of buffer `id`; 0 if the buffer does not exist
    pub fn property(&self, id: u32, param: BufferParam) -> i32 {
        self.buffers
            .get(id)
            .map_or(0, |buffer| buffer.property(&*self.backend, param))
    }

    pub fn info(&self, id: u32) -> Option<BufferInfo> {
        self.buffers.get(id).map(|buffer| buffer.info(&*self.backend))
    }

    pub fn ids(&self) -> Vec<u32> {
        self.buffers.ids()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Source operations bound to a live device
pub struct Sources<'a> {
    backend: &'a mut dyn AudioBackend,
    buffers: &'a BufferRegistry,
    sources: &'a mut SourceRegistry,
}

impl Sources<'_> {
    /// Create a source in slot `id` (0–255), replacing any source already there
    pub fn create(&mut self, id: u32) -> Result<&Source> {
        let source = self.sources.create(&mut *self.backend, id)?;
        Ok(&*source)
    }

    /// Create a source in the lowest unused slot
    pub fn create_auto(&mut self) -> Result<&Source> {
        let source = self.sources.create_auto(&mut *self.backend)?;
        Ok(&*source)
    }

    pub fn get(&self, id: u32) -> Option<&Source> {
        self.sources.get(id)
    }

    /// Stop, detach and release source `id`; no-op if absent
    pub fn remove(&mut self, id: u32) {
        self.sources.remove(&mut *self.backend, id);
    }

    pub fn clear_all(&mut self) {
        self.sources.clear_all(&mut *self.backend);
    }

    pub fn ids(&self) -> Vec<u32> {
        self.sources.ids()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Controls for source `id`; every call is a no-op if the slot is empty
    pub fn control(&mut self, id: u32) -> SourceControl<'_> {
        SourceControl {
            id,
            source: self.sources.get_mut(id),
            backend: &mut *self.backend,
            buffers: self.buffers,
        }
    }
}

/// Binding, playback and property calls on one source slot.
///
/// Calls on an empty slot do nothing and queries return defaults
/// (`Stopped`, 0, `false`, empty).
pub struct SourceControl<'a> {
    id: u32,
    source: Option<&'a mut Source>,
    backend: &'a mut dyn AudioBackend,
    buffers: &'a BufferRegistry,
}

impl SourceControl<'_> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.source.is_some()
    }

    fn released(&self, operation: &str) {
        debug!("Source {}: {} ignored, slot is empty", self.id, operation);
    }

    pub fn use_buffer(&mut self, buffer_id: u32) -> Result<()> {
        match self.source.as_deref_mut() {
            Some(source) => source.use_buffer(&mut *self.backend, self.buffers, buffer_id),
            None => {
                self.released("useBuffer");
                Ok(())
            }
        }
    }

    pub fn queue_buffers(&mut self, buffer_ids: &[u32]) -> Result<()> {
        match self.source.as_deref_mut() {
            Some(source) => source.queue_buffers(&mut *self.backend, self.buffers, buffer_ids),
            None => {
                self.released("queueBuffers");
                Ok(())
            }
        }
    }

    pub fn detach_buffers(&mut self) -> Result<()> {
        match self.source.as_deref_mut() {
            Some(source) => source.detach_buffers(&mut *self.backend),
            None => {
                self.released("detachBuffers");
                Ok(())
            }
        }
    }

    pub fn play(&mut self) -> Result<()> {
        match self.source.as_deref() {
            Some(source) => source.play(&mut *self.backend),
            None => {
                self.released("play");
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        match self.source.as_deref() {
            Some(source) => source.pause(&mut *self.backend),
            None => {
                self.released("pause");
                Ok(())
            }
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        match self.source.as_deref() {
            Some(source) => source.stop(&mut *self.backend),
            None => {
                self.released("stop");
                Ok(())
            }
        }
    }

    pub fn state(&self) -> SourceState {
        let Some(source) = self.source.as_deref() else {
            return SourceState::Stopped;
        };
        source.state(&*self.backend).unwrap_or_else(|e| {
            warn!("Source {}: {}", self.id, e);
            SourceState::Stopped
        })
    }

    pub fn is_playing(&self) -> bool {
        self.state() == SourceState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state() == SourceState::Paused
    }

    /// True for both `Initial` and `Stopped`
    pub fn is_stopped(&self) -> bool {
        self.state().is_stopped()
    }

    /// Static, streaming or nothing bound
    pub fn source_type(&self) -> SourceType {
        self.query(|source, backend| source.source_type(backend), SourceType::Undetermined)
    }

    /// Volume in percent (0–100)
    pub fn volume(&self) -> i32 {
        self.query(|source, backend| source.volume(backend), 0)
    }

    pub fn set_volume(&mut self, percent: i32) -> Result<()> {
        match self.source.as_deref() {
            Some(source) => source.set_volume(&mut *self.backend, percent),
            None => {
                self.released("setVolume");
                Ok(())
            }
        }
    }

    pub fn looping(&self) -> bool {
        self.query(|source, backend| source.is_looping(backend), false)
    }

    pub fn set_looping(&mut self, enable: bool) -> Result<()> {
        match self.source.as_deref() {
            Some(source) => source.set_looping(&mut *self.backend, enable),
            None => {
                self.released("setLoop");
                Ok(())
            }
        }
    }

    pub fn int_property(&self, param: SourceIntParam) -> i32 {
        self.query(|source, backend| source.int_property(backend, param), 0)
    }

    pub fn set_int_property(&mut self, param: SourceIntParam, value: i32) -> Result<()> {
        match self.source.as_deref() {
            Some(source) => source.set_int_property(&mut *self.backend, param, value),
            None => {
                self.released("setIntProperty");
                Ok(())
            }
        }
    }

    pub fn float_property(&self, param: SourceFloatParam) -> f32 {
        self.query(|source, backend| source.float_property(backend, param), 0.0)
    }

    pub fn set_float_property(&mut self, param: SourceFloatParam, value: f32) -> Result<()> {
        match self.source.as_deref() {
            Some(source) => source.set_float_property(&mut *self.backend, param, value),
            None => {
                self.released("setFloatProperty");
                Ok(())
            }
        }
    }

    /// Registry IDs of the attached buffers in attachment order
    pub fn buffer_ids(&self) -> Vec<u32> {
        self.source
            .as_deref()
            .map(|source| source.buffer_ids(self.buffers))
            .unwrap_or_default()
    }

    pub fn attached_handles(&self) -> Vec<BufferHandle> {
        self.source
            .as_deref()
            .map(|source| source.attached_handles().to_vec())
            .unwrap_or_default()
    }

    /// Run a backend query, degrading to `default` on an empty slot or error
    fn query<T>(
        &self,
        get: impl FnOnce(&Source, &dyn AudioBackend) -> Result<T>,
        default: T,
    ) -> T {
        let Some(source) = self.source.as_deref() else {
            return default;
        };
        get(source, &*self.backend).unwrap_or_else(|e| {
            warn!("Source {}: {}", self.id, e);
            default
        })
    }
}
