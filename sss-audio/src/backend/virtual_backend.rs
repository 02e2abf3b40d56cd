//! In-process reference backend
//!
//! `VirtualBackend` keeps the bookkeeping of a native 3D-audio backend
//! without producing sound: handle tables, per-source transport state, byte
//! positions and the binding rules a real backend enforces. Playback only
//! moves when [`VirtualBackend::advance`] is called, which makes partial
//! playback reproducible in tests and in the demo scripts.
//!
//! Ownership follows the usual native layout: buffers belong to the open
//! endpoint, sources belong to the context they were generated in.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::{
    AudioBackend, BackendError, BackendResult, BufferHandle, BufferParam, ContextHandle,
    DeviceHandle, SampleFormat, SourceFloatParam, SourceHandle, SourceIntParam, SourceState,
    SourceType,
};
use crate::config::VirtualBackendConfig;

/// Vendor prefix of every virtual endpoint specifier
pub const ENDPOINT_PREFIX: &str = "Virtual Audio on ";

/// Default display name when no endpoints are configured
pub const DEFAULT_ENDPOINT_NAME: &str = "Default Output";

/// Source slots per context, matching common native defaults
pub const DEFAULT_MAX_SOURCES: usize = 256;

pub const DEFAULT_MAX_BUFFERS: usize = 4096;

#[derive(Debug)]
struct ContextData {
    device: DeviceHandle,
    listener_gain: f32,
}

#[derive(Debug, Default)]
struct BufferData {
    device: Option<DeviceHandle>,
    format: Option<SampleFormat>,
    sample_rate: u32,
    size_bytes: usize,
}

#[derive(Debug)]
struct SourceData {
    context: ContextHandle,
    state: SourceState,
    kind: SourceType,
    queue: Vec<BufferHandle>,
    /// Bytes from the start of the queue; meaningful while playing or paused
    position: usize,
    /// Offset applied by the next `play` from Initial/Stopped
    pending_offset: Option<usize>,
    /// Set when playback ran off the end of the queue
    finished: bool,
    looping: bool,
    gain: f32,
    pitch: f32,
}

impl SourceData {
    fn new(context: ContextHandle) -> Self {
        Self {
            context,
            state: SourceState::Initial,
            kind: SourceType::Undetermined,
            queue: Vec::new(),
            position: 0,
            pending_offset: None,
            finished: false,
            looping: false,
            gain: 1.0,
            pitch: 1.0,
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    open: bool,
    context: bool,
    make_current: bool,
    buffer_data: bool,
    set_buffer: bool,
}

/// In-process [`AudioBackend`] implementation.
#[derive(Debug)]
pub struct VirtualBackend {
    endpoints: Vec<String>,
    default_endpoint: Option<String>,
    max_buffers: usize,
    max_sources: usize,
    next_handle: u32,
    devices: BTreeMap<DeviceHandle, String>,
    contexts: BTreeMap<ContextHandle, ContextData>,
    current: Option<ContextHandle>,
    buffers: BTreeMap<BufferHandle, BufferData>,
    sources: BTreeMap<SourceHandle, SourceData>,
    faults: Faults,
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualBackend {
    /// Backend with a single default endpoint
    pub fn new() -> Self {
        Self::with_endpoints([DEFAULT_ENDPOINT_NAME])
    }

    /// Backend exposing the given endpoint display names; the first is the default
    pub fn with_endpoints<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints = prefixed(names);
        let default_endpoint = endpoints.first().cloned();

        Self {
            endpoints,
            default_endpoint,
            max_buffers: DEFAULT_MAX_BUFFERS,
            max_sources: DEFAULT_MAX_SOURCES,
            next_handle: 1,
            devices: BTreeMap::new(),
            contexts: BTreeMap::new(),
            current: None,
            buffers: BTreeMap::new(),
            sources: BTreeMap::new(),
            faults: Faults::default(),
        }
    }

    /// Build from the `[virtual_backend]` config section
    pub fn from_config(config: &VirtualBackendConfig) -> Self {
        let mut names = config.endpoints.clone();
        names.extend(host_endpoint_names(config));
        if names.is_empty() {
            names.push(DEFAULT_ENDPOINT_NAME.to_string());
        }

        let mut backend = Self::with_endpoints(&names);
        if let Some(default) = config.default_endpoint.as_ref() {
            if names.iter().any(|n| n == default) {
                backend.default_endpoint = Some(format!("{}{}", ENDPOINT_PREFIX, default));
            } else {
                warn!("Configured default endpoint '{}' is not among the endpoints", default);
            }
        }
        backend.max_buffers = config.max_buffers;
        backend.max_sources = config.max_sources;
        backend
    }

    /// Replace the visible endpoints, as if outputs were plugged or unplugged.
    ///
    /// Open endpoints stay open; the first name becomes the default.
    pub fn set_endpoints<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.endpoints = prefixed(names);
        self.default_endpoint = self.endpoints.first().cloned();
    }

    pub fn set_max_buffers(&mut self, max: usize) {
        self.max_buffers = max;
    }

    pub fn set_max_sources(&mut self, max: usize) {
        self.max_sources = max;
    }

    /// Make the next `open_endpoint` fail
    pub fn fail_next_open(&mut self) {
        self.faults.open = true;
    }

    /// Make the next `create_context` fail
    pub fn fail_next_context(&mut self) {
        self.faults.context = true;
    }

    /// Make the next `make_context_current(Some(..))` fail
    pub fn fail_next_make_current(&mut self) {
        self.faults.make_current = true;
    }

    /// Make the next `buffer_data` fail
    pub fn fail_next_buffer_data(&mut self) {
        self.faults.buffer_data = true;
    }

    /// Make the next `set_source_buffer` fail
    pub fn fail_next_set_source_buffer(&mut self) {
        self.faults.set_buffer = true;
    }

    /// Number of buffer handles not yet deleted (across all endpoints)
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of source handles not yet deleted (across all contexts)
    pub fn live_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn open_endpoints(&self) -> usize {
        self.devices.len()
    }

    pub fn current_context(&self) -> Option<ContextHandle> {
        self.current
    }

    /// Specifier of the endpoint behind the current context
    pub fn current_endpoint(&self) -> Option<&str> {
        let context = self.contexts.get(&self.current?)?;
        self.devices.get(&context.device).map(String::as_str)
    }

    /// Advance a playing source by `bytes` of consumed data.
    ///
    /// Reaching the end of the bound data wraps when looping, otherwise the
    /// source transitions to `Stopped`. Returns the state afterwards.
    pub fn advance(&mut self, source: SourceHandle, bytes: usize) -> BackendResult<SourceState> {
        self.require_source(source)?;
        let total = self.queued_bytes(source);
        let data = self.sources.get_mut(&source).ok_or(BackendError::InvalidName)?;

        if data.state != SourceState::Playing {
            return Ok(data.state);
        }

        data.position += bytes;
        if data.position >= total {
            if data.looping && total > 0 {
                data.position %= total;
            } else {
                data.state = SourceState::Stopped;
                data.position = 0;
                data.finished = true;
                debug!("Virtual source {} reached end of data", source);
            }
        }
        Ok(data.state)
    }

    fn alloc_handle(&mut self) -> u32 {
        let raw = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        raw
    }

    fn require_context(&self) -> BackendResult<ContextHandle> {
        self.current.ok_or(BackendError::InvalidOperation)
    }

    fn current_device(&self) -> BackendResult<DeviceHandle> {
        let context = self.require_context()?;
        self.contexts
            .get(&context)
            .map(|c| c.device)
            .ok_or(BackendError::InvalidOperation)
    }

    fn require_buffer(&self, buffer: BufferHandle) -> BackendResult<&BufferData> {
        let device = self.current_device()?;
        match self.buffers.get(&buffer) {
            Some(data) if data.device == Some(device) => Ok(data),
            _ => Err(BackendError::InvalidName),
        }
    }

    fn require_source(&self, source: SourceHandle) -> BackendResult<&SourceData> {
        let context = self.require_context()?;
        match self.sources.get(&source) {
            Some(data) if data.context == context => Ok(data),
            _ => Err(BackendError::InvalidName),
        }
    }

    fn source_mut(&mut self, source: SourceHandle) -> BackendResult<&mut SourceData> {
        self.require_source(source)?;
        self.sources.get_mut(&source).ok_or(BackendError::InvalidName)
    }

    fn buffer_attached(&self, buffer: BufferHandle) -> bool {
        self.sources.values().any(|s| s.queue.contains(&buffer))
    }

    fn buffer_size(&self, buffer: BufferHandle) -> usize {
        self.buffers.get(&buffer).map_or(0, |b| b.size_bytes)
    }

    fn queued_bytes(&self, source: SourceHandle) -> usize {
        self.sources
            .get(&source)
            .map_or(0, |s| s.queue.iter().map(|b| self.buffer_size(*b)).sum())
    }

    /// Format of the first filled buffer in the queue
    fn queue_format(&self, queue: &[BufferHandle]) -> Option<(SampleFormat, u32)> {
        queue
            .iter()
            .filter_map(|b| self.buffers.get(b))
            .find_map(|b| b.format.map(|f| (f, b.sample_rate)))
    }

    fn current_offset(&self, data: &SourceData) -> usize {
        match data.state {
            SourceState::Playing | SourceState::Paused => data.position,
            SourceState::Initial | SourceState::Stopped => data.pending_offset.unwrap_or(0),
        }
    }

    fn processed_buffers(&self, data: &SourceData) -> usize {
        if data.finished {
            return data.queue.len();
        }
        if data.kind != SourceType::Streaming {
            return 0;
        }
        let offset = self.current_offset(data);
        let mut end = 0;
        data.queue
            .iter()
            .take_while(|b| {
                end += self.buffer_size(**b);
                end <= offset && end > 0
            })
            .count()
    }

    /// Buffer containing the current position
    fn playing_buffer(&self, data: &SourceData) -> Option<BufferHandle> {
        if data.kind == SourceType::Static {
            return data.queue.first().copied();
        }
        let offset = self.current_offset(data);
        let mut end = 0;
        for buffer in &data.queue {
            end += self.buffer_size(*buffer);
            if offset < end {
                return Some(*buffer);
            }
        }
        data.queue.last().copied()
    }

    fn set_offset(&mut self, source: SourceHandle, bytes: i64) -> BackendResult<()> {
        if bytes < 0 {
            return Err(BackendError::InvalidValue);
        }
        let bytes = bytes as usize;
        let total = self.queued_bytes(source);
        let data = self.source_mut(source)?;
        if total > 0 && bytes >= total {
            return Err(BackendError::InvalidValue);
        }
        match data.state {
            SourceState::Playing | SourceState::Paused => data.position = bytes,
            SourceState::Initial | SourceState::Stopped => data.pending_offset = Some(bytes),
        }
        Ok(())
    }

    fn frame_bytes(&self, source: SourceHandle) -> usize {
        self.sources
            .get(&source)
            .and_then(|s| self.queue_format(&s.queue))
            .map_or(2, |(format, _)| format.frame_bytes())
    }
}

fn prefixed<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| format!("{}{}", ENDPOINT_PREFIX, name.as_ref()))
        .collect()
}

#[cfg(feature = "host-endpoints")]
fn host_endpoint_names(config: &VirtualBackendConfig) -> Vec<String> {
    if !config.use_host_endpoints {
        return Vec::new();
    }
    let names = super::host::output_device_names();
    debug!("Adding {} host output devices as endpoints", names.len());
    names
}

#[cfg(not(feature = "host-endpoints"))]
fn host_endpoint_names(config: &VirtualBackendConfig) -> Vec<String> {
    if config.use_host_endpoints {
        warn!("use_host_endpoints is set but the host-endpoints feature is disabled");
    }
    Vec::new()
}

impl AudioBackend for VirtualBackend {
    fn enumerate_endpoints(&self) -> Vec<String> {
        self.endpoints.clone()
    }

    fn default_endpoint(&self) -> Option<String> {
        self.default_endpoint.clone()
    }

    fn endpoint_display_name(&self, specifier: &str) -> String {
        specifier
            .strip_prefix(ENDPOINT_PREFIX)
            .unwrap_or(specifier)
            .to_string()
    }

    fn open_endpoint(&mut self, specifier: &str) -> BackendResult<DeviceHandle> {
        if std::mem::take(&mut self.faults.open) {
            return Err(BackendError::InvalidValue);
        }
        if !self.endpoints.iter().any(|e| e == specifier) {
            return Err(BackendError::InvalidValue);
        }
        let raw = self.alloc_handle();
        let device = DeviceHandle::from_raw(raw).ok_or(BackendError::OutOfMemory)?;
        self.devices.insert(device, specifier.to_string());
        debug!("Virtual endpoint opened: {} ({})", specifier, device);
        Ok(device)
    }

    fn close_endpoint(&mut self, device: DeviceHandle) -> BackendResult<()> {
        if !self.devices.contains_key(&device) {
            return Err(BackendError::InvalidName);
        }
        if self.contexts.values().any(|c| c.device == device) {
            return Err(BackendError::InvalidOperation);
        }
        let before = self.buffers.len();
        self.buffers.retain(|_, b| b.device != Some(device));
        let leaked = before - self.buffers.len();
        if leaked > 0 {
            warn!("Closing virtual endpoint {} with {} live buffers", device, leaked);
        }
        self.devices.remove(&device);
        Ok(())
    }

    fn create_context(&mut self, device: DeviceHandle) -> BackendResult<ContextHandle> {
        if std::mem::take(&mut self.faults.context) {
            return Err(BackendError::InvalidValue);
        }
        if !self.devices.contains_key(&device) {
            return Err(BackendError::InvalidName);
        }
        let raw = self.alloc_handle();
        let context = ContextHandle::from_raw(raw).ok_or(BackendError::OutOfMemory)?;
        self.contexts.insert(
            context,
            ContextData {
                device,
                listener_gain: 1.0,
            },
        );
        Ok(context)
    }

    fn make_context_current(&mut self, context: Option<ContextHandle>) -> BackendResult<()> {
        match context {
            Some(context) => {
                if std::mem::take(&mut self.faults.make_current) {
                    return Err(BackendError::InvalidOperation);
                }
                if !self.contexts.contains_key(&context) {
                    return Err(BackendError::InvalidName);
                }
                self.current = Some(context);
            }
            None => self.current = None,
        }
        Ok(())
    }

    fn destroy_context(&mut self, context: ContextHandle) -> BackendResult<()> {
        if self.contexts.remove(&context).is_none() {
            return Err(BackendError::InvalidName);
        }
        if self.current == Some(context) {
            self.current = None;
        }
        let before = self.sources.len();
        self.sources.retain(|_, s| s.context != context);
        let leaked = before - self.sources.len();
        if leaked > 0 {
            warn!("Destroying virtual context {} with {} live sources", context, leaked);
        }
        Ok(())
    }

    fn listener_gain(&self) -> BackendResult<f32> {
        let context = self.require_context()?;
        self.contexts
            .get(&context)
            .map(|c| c.listener_gain)
            .ok_or(BackendError::InvalidOperation)
    }

    fn set_listener_gain(&mut self, gain: f32) -> BackendResult<()> {
        if !gain.is_finite() || gain < 0.0 {
            return Err(BackendError::InvalidValue);
        }
        let context = self.require_context()?;
        let data = self
            .contexts
            .get_mut(&context)
            .ok_or(BackendError::InvalidOperation)?;
        data.listener_gain = gain;
        Ok(())
    }

    fn gen_buffer(&mut self) -> BackendResult<BufferHandle> {
        let device = self.current_device()?;
        let owned = self
            .buffers
            .values()
            .filter(|b| b.device == Some(device))
            .count();
        if owned >= self.max_buffers {
            return Err(BackendError::OutOfMemory);
        }
        let raw = self.alloc_handle();
        let buffer = BufferHandle::from_raw(raw).ok_or(BackendError::OutOfMemory)?;
        self.buffers.insert(
            buffer,
            BufferData {
                device: Some(device),
                ..BufferData::default()
            },
        );
        Ok(buffer)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) -> BackendResult<()> {
        self.require_buffer(buffer)?;
        if self.buffer_attached(buffer) {
            return Err(BackendError::InvalidOperation);
        }
        self.buffers.remove(&buffer);
        Ok(())
    }

    fn buffer_data(
        &mut self,
        buffer: BufferHandle,
        format: SampleFormat,
        samples: &[i16],
        sample_rate: u32,
    ) -> BackendResult<()> {
        self.require_buffer(buffer)?;
        if std::mem::take(&mut self.faults.buffer_data) {
            return Err(BackendError::OutOfMemory);
        }
        if self.buffer_attached(buffer) {
            return Err(BackendError::InvalidOperation);
        }
        if sample_rate == 0 || samples.len() % format.channels() as usize != 0 {
            return Err(BackendError::InvalidValue);
        }
        let data = self.buffers.get_mut(&buffer).ok_or(BackendError::InvalidName)?;
        data.format = Some(format);
        data.sample_rate = sample_rate;
        data.size_bytes = samples.len() * std::mem::size_of::<i16>();
        Ok(())
    }

    fn buffer_int(&self, buffer: BufferHandle, param: BufferParam) -> BackendResult<i32> {
        let data = self.require_buffer(buffer)?;
        let value = match param {
            BufferParam::Frequency => data.sample_rate as i32,
            BufferParam::Bits => 16,
            BufferParam::Channels => data.format.map_or(1, |f| f.channels() as i32),
            BufferParam::Size => data.size_bytes as i32,
        };
        Ok(value)
    }

    fn gen_source(&mut self) -> BackendResult<SourceHandle> {
        let context = self.require_context()?;
        let owned = self.sources.values().filter(|s| s.context == context).count();
        if owned >= self.max_sources {
            return Err(BackendError::OutOfMemory);
        }
        let raw = self.alloc_handle();
        let source = SourceHandle::from_raw(raw).ok_or(BackendError::OutOfMemory)?;
        self.sources.insert(source, SourceData::new(context));
        Ok(source)
    }

    fn delete_source(&mut self, source: SourceHandle) -> BackendResult<()> {
        self.require_source(source)?;
        self.sources.remove(&source);
        Ok(())
    }

    fn play(&mut self, source: SourceHandle) -> BackendResult<()> {
        let total = self.queued_bytes(source);
        let data = self.source_mut(source)?;
        match data.state {
            SourceState::Paused => data.state = SourceState::Playing,
            SourceState::Playing | SourceState::Initial | SourceState::Stopped => {
                let offset = data.pending_offset.take().unwrap_or(0);
                data.finished = false;
                if offset < total {
                    data.position = offset;
                    data.state = SourceState::Playing;
                } else {
                    // Nothing left to play
                    data.position = 0;
                    data.state = SourceState::Stopped;
                    data.finished = total > 0;
                }
            }
        }
        Ok(())
    }

    fn pause(&mut self, source: SourceHandle) -> BackendResult<()> {
        let data = self.source_mut(source)?;
        if data.state == SourceState::Playing {
            data.state = SourceState::Paused;
        }
        Ok(())
    }

    fn stop(&mut self, source: SourceHandle) -> BackendResult<()> {
        let data = self.source_mut(source)?;
        if data.state != SourceState::Stopped {
            data.state = SourceState::Stopped;
            data.position = 0;
            data.pending_offset = None;
        }
        Ok(())
    }

    fn set_source_buffer(
        &mut self,
        source: SourceHandle,
        buffer: Option<BufferHandle>,
    ) -> BackendResult<()> {
        if let Some(buffer) = buffer {
            self.require_buffer(buffer)?;
        }
        if std::mem::take(&mut self.faults.set_buffer) {
            return Err(BackendError::InvalidOperation);
        }
        let data = self.source_mut(source)?;
        if !data.state.is_stopped() {
            return Err(BackendError::InvalidOperation);
        }
        data.queue.clear();
        data.position = 0;
        data.pending_offset = None;
        data.finished = false;
        match buffer {
            Some(buffer) => {
                data.queue.push(buffer);
                data.kind = SourceType::Static;
            }
            None => data.kind = SourceType::Undetermined,
        }
        Ok(())
    }

    fn queue_buffers(&mut self, source: SourceHandle, buffers: &[BufferHandle]) -> BackendResult<()> {
        for buffer in buffers {
            self.require_buffer(*buffer)?;
        }
        let queue = &self.require_source(source)?.queue;
        if self.require_source(source)?.kind == SourceType::Static {
            return Err(BackendError::InvalidOperation);
        }

        // Every filled buffer in a queue must share one format
        let mut combined = queue.clone();
        combined.extend_from_slice(buffers);
        if let Some((format, rate)) = self.queue_format(&combined) {
            let mismatch = combined
                .iter()
                .filter_map(|b| self.buffers.get(b))
                .filter_map(|b| b.format.map(|f| (f, b.sample_rate)))
                .any(|other| other != (format, rate));
            if mismatch {
                return Err(BackendError::InvalidOperation);
            }
        }

        let data = self.source_mut(source)?;
        data.queue.extend_from_slice(buffers);
        if !data.queue.is_empty() {
            data.kind = SourceType::Streaming;
        }
        Ok(())
    }

    fn source_int(&self, source: SourceHandle, param: SourceIntParam) -> BackendResult<i32> {
        let data = self.require_source(source)?;
        let value = match param {
            SourceIntParam::Buffer => self.playing_buffer(data).map_or(0, |b| b.raw() as i32),
            SourceIntParam::State => data.state.to_raw(),
            SourceIntParam::Type => data.kind.to_raw(),
            SourceIntParam::Looping => data.looping as i32,
            SourceIntParam::ByteOffset => self.current_offset(data) as i32,
            SourceIntParam::SampleOffset => {
                (self.current_offset(data) / self.frame_bytes(source)) as i32
            }
            SourceIntParam::BuffersQueued => data.queue.len() as i32,
            SourceIntParam::BuffersProcessed => self.processed_buffers(data) as i32,
        };
        Ok(value)
    }

    fn set_source_int(
        &mut self,
        source: SourceHandle,
        param: SourceIntParam,
        value: i32,
    ) -> BackendResult<()> {
        match param {
            SourceIntParam::Buffer => {
                let buffer = if value == 0 {
                    None
                } else {
                    Some(BufferHandle::from_raw(value as u32).ok_or(BackendError::InvalidValue)?)
                };
                self.set_source_buffer(source, buffer)
            }
            SourceIntParam::Looping => {
                if value != 0 && value != 1 {
                    return Err(BackendError::InvalidValue);
                }
                self.source_mut(source)?.looping = value == 1;
                Ok(())
            }
            SourceIntParam::ByteOffset => self.set_offset(source, value as i64),
            SourceIntParam::SampleOffset => {
                let frame_bytes = self.frame_bytes(source) as i64;
                self.set_offset(source, value as i64 * frame_bytes)
            }
            SourceIntParam::State
            | SourceIntParam::Type
            | SourceIntParam::BuffersQueued
            | SourceIntParam::BuffersProcessed => {
                self.require_source(source)?;
                Err(BackendError::InvalidEnum)
            }
        }
    }

    fn source_float(&self, source: SourceHandle, param: SourceFloatParam) -> BackendResult<f32> {
        let data = self.require_source(source)?;
        let value = match param {
            SourceFloatParam::Gain => data.gain,
            SourceFloatParam::Pitch => data.pitch,
            SourceFloatParam::SecOffset => {
                let rate = self.queue_format(&data.queue).map_or(0, |(_, rate)| rate);
                if rate == 0 {
                    0.0
                } else {
                    let frames = self.current_offset(data) / self.frame_bytes(source);
                    frames as f32 / rate as f32
                }
            }
        };
        Ok(value)
    }

    fn set_source_float(
        &mut self,
        source: SourceHandle,
        param: SourceFloatParam,
        value: f32,
    ) -> BackendResult<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(BackendError::InvalidValue);
        }
        match param {
            SourceFloatParam::Gain => self.source_mut(source)?.gain = value,
            SourceFloatParam::Pitch => {
                if value == 0.0 {
                    return Err(BackendError::InvalidValue);
                }
                self.source_mut(source)?.pitch = value;
            }
            SourceFloatParam::SecOffset => {
                let rate = self
                    .queue_format(&self.require_source(source)?.queue)
                    .map_or(0, |(_, rate)| rate);
                let frames = (value * rate as f32) as i64;
                let frame_bytes = self.frame_bytes(source) as i64;
                self.set_offset(source, frames * frame_bytes)?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Virtual"
    }
}
