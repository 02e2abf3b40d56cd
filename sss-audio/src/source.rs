//! Source registry and buffer binding protocol
//!
//! A source is either **static** (one buffer bound directly) or **streaming**
//! (a FIFO queue of buffers). The mode lives in the backend; the source only
//! mirrors the handles it attached so a buffer being torn down can be
//! removed without disturbing the rest of the queue.
//!
//! Sources live in a fixed arena of [`MAX_SOURCES`] slots where the slot
//! index is the source ID.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::backend::{
    AudioBackend, BackendError, BufferHandle, BufferParam, SourceFloatParam, SourceHandle,
    SourceIntParam, SourceState, SourceType,
};
use crate::buffer::{BufferHolders, BufferRegistry};
use crate::error::{AudioError, Result};

/// Number of source slots (IDs 0..MAX_SOURCES)
pub const MAX_SOURCES: usize = 256;

/// Percent (0–100) to backend gain (0.0–1.0)
pub(crate) fn percent_to_gain(percent: i32) -> f32 {
    percent.clamp(0, 100) as f32 / 100.0
}

/// Backend gain to percent, rounded to the nearest integer
pub(crate) fn gain_to_percent(gain: f32) -> i32 {
    (gain * 100.0).round() as i32
}

/// Serialisable view of one live source
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub id: u32,
    pub state: SourceState,
    pub buffer_ids: Vec<u32>,
}

/// Static binding captured before a switch to streaming
#[derive(Debug, Clone, Copy)]
struct StaticBinding {
    buffer: BufferHandle,
    state: SourceState,
    offset: i32,
}

/// One playback unit
#[derive(Debug)]
pub struct Source {
    id: u32,
    handle: SourceHandle,
    /// Attached buffer handles in queue order (one entry when static)
    attached: Vec<BufferHandle>,
}

impl Source {
    fn new(backend: &mut dyn AudioBackend, id: u32) -> Result<Self> {
        let handle = backend.gen_source().map_err(|e| match e {
            BackendError::OutOfMemory => {
                AudioError::ResourceExhausted(format!("Couldn't generate a native source: {}", e))
            }
            other => AudioError::Backend {
                operation: "generate source",
                error: other,
            },
        })?;
        debug!("Source {} created (handle {})", id, handle);
        Ok(Self {
            id,
            handle,
            attached: Vec::new(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn handle(&self) -> SourceHandle {
        self.handle
    }

    pub fn attached_handles(&self) -> &[BufferHandle] {
        &self.attached
    }

    /// Registry IDs of the attached buffers, in attachment order
    pub fn buffer_ids(&self, buffers: &BufferRegistry) -> Vec<u32> {
        self.attached
            .iter()
            .filter_map(|handle| buffers.id_of(*handle))
            .collect()
    }

    pub fn state(&self, backend: &dyn AudioBackend) -> Result<SourceState> {
        backend
            .source_state(self.handle)
            .map_err(AudioError::backend("query source state"))
    }

    pub fn source_type(&self, backend: &dyn AudioBackend) -> Result<SourceType> {
        backend
            .source_type(self.handle)
            .map_err(AudioError::backend("query source type"))
    }

    // === Binding protocol ===

    /// Bind one buffer statically.
    ///
    /// A missing buffer is logged and ignored. A playing or paused source is
    /// stopped for the swap, and a source that was playing resumes on the
    /// new buffer.
    pub fn use_buffer(
        &mut self,
        backend: &mut dyn AudioBackend,
        buffers: &BufferRegistry,
        buffer_id: u32,
    ) -> Result<()> {
        let Some(buffer) = buffers.get(buffer_id) else {
            warn!("Source {}: found no buffer to use at ID {}", self.id, buffer_id);
            return Ok(());
        };

        let state = self.state(backend)?;
        let was_playing = state == SourceState::Playing;
        if !state.is_stopped() {
            self.stop(backend)?;
        }

        backend
            .set_source_buffer(self.handle, Some(buffer.handle()))
            .map_err(AudioError::backend("bind buffer"))?;
        self.attached.clear();
        self.attached.push(buffer.handle());

        if was_playing {
            self.play(backend)?;
        }
        debug!("Source {} now uses buffer {}", self.id, buffer_id);
        Ok(())
    }

    /// Append buffers to the streaming queue.
    ///
    /// Unknown IDs are skipped. A statically bound buffer is moved to the
    /// head of the queue so nothing already buffered is lost, and playback
    /// continues from the same byte offset. If the backend rejects the
    /// queue, the static binding is put back the way it was.
    pub fn queue_buffers(
        &mut self,
        backend: &mut dyn AudioBackend,
        buffers: &BufferRegistry,
        buffer_ids: &[u32],
    ) -> Result<()> {
        let mut handles = Vec::with_capacity(buffer_ids.len() + 1);
        let mut previous = None;
        let mut restore_offset = 0;

        if self.source_type(backend)? == SourceType::Static {
            let state = self.state(backend)?;
            let mut offset = 0;
            if matches!(state, SourceState::Playing | SourceState::Paused) {
                offset = backend
                    .source_int(self.handle, SourceIntParam::ByteOffset)
                    .map_err(AudioError::backend("query byte offset"))?;
                self.stop(backend)?;
            }
            restore_offset = offset;

            let current = backend
                .source_buffer(self.handle)
                .map_err(AudioError::backend("query bound buffer"))?;
            if let Some(current) = current {
                let binding = StaticBinding {
                    buffer: current,
                    state,
                    offset,
                };
                if let Err(e) = backend.set_source_buffer(self.handle, None) {
                    self.restore_static(backend, &binding);
                    return Err(AudioError::backend("unbind buffer")(e));
                }
                self.attached.clear();
                handles.push(current);

                // Everything in the static buffer was already played
                if state == SourceState::Stopped {
                    restore_offset = backend
                        .buffer_int(current, BufferParam::Size)
                        .unwrap_or_else(|e| {
                            warn!("Source {}: buffer size query failed: {}", self.id, e);
                            0
                        });
                }
                previous = Some(binding);
            }
        }

        for id in buffer_ids {
            match buffers.get(*id) {
                Some(buffer) => handles.push(buffer.handle()),
                None => debug!("Source {}: skipping unknown buffer {} in queue", self.id, id),
            }
        }

        if handles.is_empty() {
            return Ok(());
        }

        if let Err(e) = backend.queue_buffers(self.handle, &handles) {
            if let Some(binding) = &previous {
                self.restore_static(backend, binding);
            }
            return Err(AudioError::backend("queue buffers")(e));
        }
        self.attached.extend_from_slice(&handles);

        if restore_offset > 0 {
            match backend.set_source_int(self.handle, SourceIntParam::ByteOffset, restore_offset) {
                Ok(()) => {}
                // Offset lies at or past the end of the queued data
                Err(BackendError::InvalidValue) => debug!(
                    "Source {}: offset {} beyond queued data, starting from queue head",
                    self.id, restore_offset
                ),
                Err(e) => {
                    return Err(AudioError::Backend {
                        operation: "restore byte offset",
                        error: e,
                    })
                }
            }
        }
        if previous.map_or(false, |b| b.state == SourceState::Playing) {
            self.play(backend)?;
        }
        debug!("Source {} queued {} buffers", self.id, handles.len());
        Ok(())
    }

    /// Rebind a static buffer after a failed switch to streaming, back at
    /// its old offset and transport state. Failures are logged only.
    fn restore_static(&mut self, backend: &mut dyn AudioBackend, binding: &StaticBinding) {
        let handle = self.handle;
        let restored = backend
            .set_source_buffer(handle, Some(binding.buffer))
            .and_then(|()| {
                if binding.offset > 0 {
                    backend.set_source_int(handle, SourceIntParam::ByteOffset, binding.offset)?;
                }
                match binding.state {
                    SourceState::Playing => backend.play(handle),
                    SourceState::Paused => {
                        backend.play(handle)?;
                        backend.pause(handle)
                    }
                    SourceState::Initial | SourceState::Stopped => Ok(()),
                }
            });

        match restored {
            Ok(()) => {
                self.attached = vec![binding.buffer];
                debug!("Source {}: static buffer {} restored", self.id, binding.buffer);
            }
            Err(e) => error!(
                "Source {}: failed to restore static buffer {}: {}",
                self.id, binding.buffer, e
            ),
        }
    }

    /// Stop and drop every binding.
    ///
    /// The attached list is emptied once the backend has let go of the
    /// buffers; if the unbind fails it keeps mirroring the backend.
    pub fn detach_buffers(&mut self, backend: &mut dyn AudioBackend) -> Result<()> {
        let stopped = self.stop(backend);
        backend
            .set_source_buffer(self.handle, None)
            .map_err(AudioError::backend("detach buffers"))?;
        self.attached.clear();
        stopped
    }

    /// Forget `handle` if attached, re-queueing whatever else was attached.
    pub fn remove_attached_buffer(
        &mut self,
        backend: &mut dyn AudioBackend,
        handle: BufferHandle,
    ) -> Result<()> {
        if !self.attached.contains(&handle) {
            return Ok(());
        }

        let was_playing = self.state(backend)? == SourceState::Playing;
        self.stop(backend)?;
        backend
            .set_source_buffer(self.handle, None)
            .map_err(AudioError::backend("detach buffers"))?;
        self.attached.retain(|h| *h != handle);

        if !self.attached.is_empty() {
            backend
                .queue_buffers(self.handle, &self.attached)
                .map_err(AudioError::backend("re-queue buffers"))?;
            if was_playing {
                self.play(backend)?;
            }
        }
        debug!("Source {}: detached buffer handle {}", self.id, handle);
        Ok(())
    }

    // === Playback commands ===

    pub fn play(&self, backend: &mut dyn AudioBackend) -> Result<()> {
        backend.play(self.handle).map_err(AudioError::backend("play"))
    }

    pub fn pause(&self, backend: &mut dyn AudioBackend) -> Result<()> {
        backend.pause(self.handle).map_err(AudioError::backend("pause"))
    }

    pub fn stop(&self, backend: &mut dyn AudioBackend) -> Result<()> {
        backend.stop(self.handle).map_err(AudioError::backend("stop"))
    }

    // === Properties ===

    pub fn volume(&self, backend: &dyn AudioBackend) -> Result<i32> {
        self.float_property(backend, SourceFloatParam::Gain)
            .map(gain_to_percent)
    }

    /// Set gain from a percentage clamped to 0–100
    pub fn set_volume(&self, backend: &mut dyn AudioBackend, percent: i32) -> Result<()> {
        self.set_float_property(backend, SourceFloatParam::Gain, percent_to_gain(percent))
    }

    pub fn is_looping(&self, backend: &dyn AudioBackend) -> Result<bool> {
        self.int_property(backend, SourceIntParam::Looping)
            .map(|v| v != 0)
    }

    pub fn set_looping(&self, backend: &mut dyn AudioBackend, enable: bool) -> Result<()> {
        self.set_int_property(backend, SourceIntParam::Looping, enable as i32)
    }

    pub fn int_property(&self, backend: &dyn AudioBackend, param: SourceIntParam) -> Result<i32> {
        backend
            .source_int(self.handle, param)
            .map_err(AudioError::backend("get source property"))
    }

    pub fn set_int_property(
        &self,
        backend: &mut dyn AudioBackend,
        param: SourceIntParam,
        value: i32,
    ) -> Result<()> {
        backend
            .set_source_int(self.handle, param, value)
            .map_err(AudioError::backend("set source property"))
    }

    pub fn float_property(&self, backend: &dyn AudioBackend, param: SourceFloatParam) -> Result<f32> {
        backend
            .source_float(self.handle, param)
            .map_err(AudioError::backend("get source property"))
    }

    pub fn set_float_property(
        &self,
        backend: &mut dyn AudioBackend,
        param: SourceFloatParam,
        value: f32,
    ) -> Result<()> {
        backend
            .set_source_float(self.handle, param, value)
            .map_err(AudioError::backend("set source property"))
    }

    /// Stop, unbind and delete the native handle
    fn release(mut self, backend: &mut dyn AudioBackend) {
        if let Err(e) = self.detach_buffers(backend) {
            warn!("Source {}: detach before release failed: {}", self.id, e);
        }
        match backend.delete_source(self.handle) {
            Ok(()) => debug!("Source {} released (handle {})", self.id, self.handle),
            Err(e) => error!(
                "Source {}: failed to delete handle {}: {}",
                self.id, self.handle, e
            ),
        }
    }
}

/// Fixed arena of source slots; the slot index is the source ID
#[derive(Debug)]
pub struct SourceRegistry {
    slots: Vec<Option<Source>>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(MAX_SOURCES).collect(),
        }
    }

    /// Create a source in slot `id`, tearing down any source already there
    pub fn create(&mut self, backend: &mut dyn AudioBackend, id: u32) -> Result<&mut Source> {
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or(AudioError::OutOfRange {
                id,
                capacity: MAX_SOURCES,
            })?;

        if let Some(old) = slot.take() {
            debug!("Source {} replaced", id);
            old.release(backend);
        }
        let source = Source::new(backend, id)?;
        Ok(slot.insert(source))
    }

    /// Lowest unoccupied slot
    pub fn next_free_id(&self) -> Option<u32> {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(|index| index as u32)
    }

    /// Create a source in the lowest unoccupied slot
    pub fn create_auto(&mut self, backend: &mut dyn AudioBackend) -> Result<&mut Source> {
        let id = self.next_free_id().ok_or_else(|| {
            AudioError::ResourceExhausted(format!(
                "Can't create any source anymore (all {} slots in use)",
                MAX_SOURCES
            ))
        })?;
        self.create(backend, id)
    }

    pub fn get(&self, id: u32) -> Option<&Source> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Source> {
        self.slots.get_mut(id as usize).and_then(Option::as_mut)
    }

    /// Stop, detach and release the source at `id`; no-op if absent
    pub fn remove(&mut self, backend: &mut dyn AudioBackend, id: u32) {
        match self.slots.get_mut(id as usize).and_then(Option::take) {
            Some(source) => source.release(backend),
            None => debug!("Source {} not found, nothing to remove", id),
        }
    }

    /// Release every occupied slot
    pub fn clear_all(&mut self, backend: &mut dyn AudioBackend) {
        let mut released = 0;
        for slot in &mut self.slots {
            if let Some(source) = slot.take() {
                source.release(backend);
                released += 1;
            }
        }
        if released > 0 {
            info!("Released {} sources", released);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.slots.iter().flatten()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.iter().map(Source::id).collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl BufferHolders for SourceRegistry {
    fn release_buffer_handle(&mut self, backend: &mut dyn AudioBackend, handle: BufferHandle) {
        for source in self.slots.iter_mut().flatten() {
            if let Err(e) = source.remove_attached_buffer(backend, handle) {
                error!(
                    "Source {}: failed to detach buffer handle {}: {}",
                    source.id, handle, e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SampleFormat, VirtualBackend};

    fn ready_backend() -> VirtualBackend {
        let mut backend = VirtualBackend::new();
        let spec = backend.default_endpoint().unwrap();
        let device = backend.open_endpoint(&spec).unwrap();
        let context = backend.create_context(device).unwrap();
        backend.make_context_current(Some(context)).unwrap();
        backend
    }

    /// Registry with `count` mono buffers of `frames` frames each, IDs 0..count
    fn filled_buffers(
        backend: &mut VirtualBackend,
        sources: &mut SourceRegistry,
        count: u32,
        frames: usize,
    ) -> BufferRegistry {
        let mut buffers = BufferRegistry::new();
        for id in 0..count {
            let handle = buffers.create(backend, sources, id).unwrap().handle();
            backend
                .buffer_data(handle, SampleFormat::Mono16, &vec![0; frames], 44100)
                .unwrap();
        }
        buffers
    }

    #[test]
    fn test_gain_conversions_clamp() {
        assert_eq!(percent_to_gain(150), 1.0);
        assert_eq!(percent_to_gain(-10), 0.0);
        assert_eq!(percent_to_gain(25), 0.25);
        assert_eq!(gain_to_percent(0.29), 29);
    }

    #[test]
    fn test_create_out_of_range() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let err = sources.create(&mut backend, 256).unwrap_err();
        assert!(matches!(err, AudioError::OutOfRange { id: 256, capacity: 256 }));
    }

    #[test]
    fn test_create_auto_fills_then_exhausts() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        for expected in 0..MAX_SOURCES as u32 {
            assert_eq!(sources.create_auto(&mut backend).unwrap().id(), expected);
        }
        let err = sources.create_auto(&mut backend).unwrap_err();
        assert!(matches!(err, AudioError::ResourceExhausted(_)));
    }

    #[test]
    fn test_replacing_a_slot_releases_old_handle() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        sources.create(&mut backend, 3).unwrap();
        sources.create(&mut backend, 3).unwrap();
        assert_eq!(backend.live_sources(), 1);
        assert_eq!(sources.ids(), vec![3]);
    }

    #[test]
    fn test_use_buffer_missing_is_noop() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let buffers = BufferRegistry::new();
        let source = sources.create(&mut backend, 0).unwrap();

        source.use_buffer(&mut backend, &buffers, 9).unwrap();
        assert!(source.attached_handles().is_empty());
    }

    #[test]
    fn test_use_buffer_swap_keeps_playing() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let buffers = filled_buffers(&mut backend, &mut sources, 2, 1000);
        let source = sources.create(&mut backend, 0).unwrap();

        source.use_buffer(&mut backend, &buffers, 0).unwrap();
        source.play(&mut backend).unwrap();
        source.use_buffer(&mut backend, &buffers, 1).unwrap();

        assert_eq!(source.state(&backend).unwrap(), SourceState::Playing);
        assert_eq!(source.buffer_ids(&buffers), vec![1]);
    }

    #[test]
    fn test_use_buffer_while_paused_stays_stopped() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let buffers = filled_buffers(&mut backend, &mut sources, 2, 1000);
        let source = sources.create(&mut backend, 0).unwrap();

        source.use_buffer(&mut backend, &buffers, 0).unwrap();
        source.play(&mut backend).unwrap();
        source.pause(&mut backend).unwrap();
        source.use_buffer(&mut backend, &buffers, 1).unwrap();

        assert_eq!(source.state(&backend).unwrap(), SourceState::Stopped);
    }

    #[test]
    fn test_queue_skips_unknown_ids() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let buffers = filled_buffers(&mut backend, &mut sources, 2, 100);
        let source = sources.create(&mut backend, 0).unwrap();

        source.queue_buffers(&mut backend, &buffers, &[0, 7, 1]).unwrap();
        assert_eq!(source.buffer_ids(&buffers), vec![0, 1]);
        assert_eq!(source.source_type(&backend).unwrap(), SourceType::Streaming);
    }

    #[test]
    fn test_queue_after_static_keeps_offset_and_playing() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let buffers = filled_buffers(&mut backend, &mut sources, 2, 44100);
        let source = sources.create(&mut backend, 0).unwrap();

        source.use_buffer(&mut backend, &buffers, 0).unwrap();
        source.play(&mut backend).unwrap();
        let handle = source.handle();
        backend.advance(handle, 30_000).unwrap();

        source.queue_buffers(&mut backend, &buffers, &[1]).unwrap();

        assert_eq!(source.state(&backend).unwrap(), SourceState::Playing);
        assert_eq!(source.int_property(&backend, SourceIntParam::ByteOffset).unwrap(), 30_000);
        assert_eq!(source.buffer_ids(&buffers), vec![0, 1]);
    }

    #[test]
    fn test_queue_after_finished_static_skips_played_data() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let buffers = filled_buffers(&mut backend, &mut sources, 2, 100);
        let source = sources.create(&mut backend, 0).unwrap();

        source.use_buffer(&mut backend, &buffers, 0).unwrap();
        source.play(&mut backend).unwrap();
        backend.advance(source.handle(), 200).unwrap();
        assert_eq!(source.state(&backend).unwrap(), SourceState::Stopped);

        source.queue_buffers(&mut backend, &buffers, &[1]).unwrap();
        source.play(&mut backend).unwrap();

        // Starts at the head of buffer 1
        assert_eq!(source.int_property(&backend, SourceIntParam::ByteOffset).unwrap(), 200);
    }

    #[test]
    fn test_queue_without_prior_static_does_not_seek() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let buffers = filled_buffers(&mut backend, &mut sources, 2, 100);
        let source = sources.create(&mut backend, 0).unwrap();

        source.queue_buffers(&mut backend, &buffers, &[0]).unwrap();
        source.queue_buffers(&mut backend, &buffers, &[1]).unwrap();

        assert_eq!(source.state(&backend).unwrap(), SourceState::Initial);
        assert_eq!(source.int_property(&backend, SourceIntParam::ByteOffset).unwrap(), 0);
        assert_eq!(source.buffer_ids(&buffers), vec![0, 1]);
    }

    #[test]
    fn test_detach_buffers_clears_everything() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let buffers = filled_buffers(&mut backend, &mut sources, 2, 100);
        let source = sources.create(&mut backend, 0).unwrap();

        source.queue_buffers(&mut backend, &buffers, &[0, 1]).unwrap();
        source.play(&mut backend).unwrap();
        source.detach_buffers(&mut backend).unwrap();

        assert!(source.attached_handles().is_empty());
        assert_eq!(source.state(&backend).unwrap(), SourceState::Stopped);
        assert_eq!(source.source_type(&backend).unwrap(), SourceType::Undetermined);
    }

    #[test]
    fn test_failed_unbind_keeps_attached_handles() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let buffers = filled_buffers(&mut backend, &mut sources, 2, 100);
        let source = sources.create(&mut backend, 0).unwrap();

        source.queue_buffers(&mut backend, &buffers, &[0, 1]).unwrap();
        backend.fail_next_set_source_buffer();
        let err = source.detach_buffers(&mut backend).unwrap_err();

        assert!(matches!(err, AudioError::Backend { operation: "detach buffers", .. }));
        assert_eq!(source.buffer_ids(&buffers), vec![0, 1]);
        assert_eq!(source.int_property(&backend, SourceIntParam::BuffersQueued).unwrap(), 2);

        source.detach_buffers(&mut backend).unwrap();
        assert!(source.attached_handles().is_empty());
    }

    #[test]
    fn test_rejected_queue_restores_paused_static() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let mut buffers = filled_buffers(&mut backend, &mut sources, 1, 100);
        let stereo = buffers.create(&mut backend, &mut sources, 1).unwrap().handle();
        backend
            .buffer_data(stereo, SampleFormat::Stereo16, &[0; 200], 44100)
            .unwrap();
        let source = sources.create(&mut backend, 0).unwrap();

        source.use_buffer(&mut backend, &buffers, 0).unwrap();
        source.play(&mut backend).unwrap();
        backend.advance(source.handle(), 60).unwrap();
        source.pause(&mut backend).unwrap();

        // Mono and stereo cannot share one queue
        let err = source.queue_buffers(&mut backend, &buffers, &[1]).unwrap_err();

        assert!(matches!(err, AudioError::Backend { operation: "queue buffers", .. }));
        assert_eq!(source.state(&backend).unwrap(), SourceState::Paused);
        assert_eq!(source.source_type(&backend).unwrap(), SourceType::Static);
        assert_eq!(source.int_property(&backend, SourceIntParam::ByteOffset).unwrap(), 60);
        assert_eq!(source.buffer_ids(&buffers), vec![0]);
    }

    #[test]
    fn test_remove_attached_buffer_requeues_rest() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let buffers = filled_buffers(&mut backend, &mut sources, 3, 100);
        let source = sources.create(&mut backend, 0).unwrap();

        source.queue_buffers(&mut backend, &buffers, &[0, 1, 2]).unwrap();
        source.play(&mut backend).unwrap();
        let middle = buffers.get(1).unwrap().handle();
        source.remove_attached_buffer(&mut backend, middle).unwrap();

        assert_eq!(source.buffer_ids(&buffers), vec![0, 2]);
        assert_eq!(source.state(&backend).unwrap(), SourceState::Playing);
        assert_eq!(source.int_property(&backend, SourceIntParam::BuffersQueued).unwrap(), 2);
    }

    #[test]
    fn test_remove_unattached_buffer_is_noop() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let buffers = filled_buffers(&mut backend, &mut sources, 2, 100);
        let source = sources.create(&mut backend, 0).unwrap();

        source.use_buffer(&mut backend, &buffers, 0).unwrap();
        source.play(&mut backend).unwrap();
        let other = buffers.get(1).unwrap().handle();
        source.remove_attached_buffer(&mut backend, other).unwrap();

        assert_eq!(source.state(&backend).unwrap(), SourceState::Playing);
        assert_eq!(source.buffer_ids(&buffers), vec![0]);
    }

    #[test]
    fn test_volume_and_looping_pass_through() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        let source = sources.create(&mut backend, 0).unwrap();

        source.set_volume(&mut backend, 40).unwrap();
        assert_eq!(source.volume(&backend).unwrap(), 40);
        assert_eq!(
            source.float_property(&backend, SourceFloatParam::Gain).unwrap(),
            0.4
        );

        source.set_looping(&mut backend, true).unwrap();
        assert!(source.is_looping(&backend).unwrap());
    }

    #[test]
    fn test_clear_all_releases_handles() {
        let mut backend = ready_backend();
        let mut sources = SourceRegistry::new();
        sources.create(&mut backend, 0).unwrap();
        sources.create(&mut backend, 200).unwrap();

        sources.clear_all(&mut backend);
        assert!(sources.is_empty());
        assert_eq!(backend.live_sources(), 0);
    }
}
