//! Source ↔ buffer binding protocol tests
//!
//! **Test Coverage:**
//! - Static binding, cascading detach on buffer removal
//! - Static → streaming switch preserves the consumed byte offset
//! - A rejected switch leaves the static binding playing
//! - Streaming queue surgery when a queued buffer goes away
//! - Reloading an attached buffer
//! - End-to-end: file → buffer → source → play/stop → remove

mod helpers;

use std::path::{Path, PathBuf};

use helpers::{device_with_decoder, generate_silent_wav, generate_sine_wav, test_device, StubDecoder};
use sss_audio::backend::{SourceIntParam, SourceType};
use sss_audio::{AudioError, Device, SourceState, VirtualBackend};
use tempfile::TempDir;

/// One-second mono 16-bit file: 44100 frames, 88200 bytes
const ONE_SECOND_MONO_BYTES: i32 = 88200;

fn one_second_mono(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    generate_sine_wav(&path, 1, 1000, 440.0).unwrap();
    path
}

/// Device with buffers 0..paths.len() loaded from `paths`
fn device_with_buffers(paths: &[&Path]) -> Device<VirtualBackend> {
    let mut device = test_device();
    let mut buffers = device.buffers().unwrap();
    for (id, path) in paths.iter().enumerate() {
        buffers.create_from_file(Some(id as u32), path).unwrap();
    }
    drop(buffers);
    device
}

#[test]
fn test_end_to_end_play_stop_remove() {
    let temp_dir = TempDir::new().unwrap();
    let path = one_second_mono(&temp_dir, "clip.wav");
    let mut device = test_device();

    let buffer = device.buffers().unwrap().create_from_file(Some(0), &path).unwrap().handle();
    assert_eq!(
        device.buffers().unwrap().info(0).unwrap().size,
        ONE_SECOND_MONO_BYTES
    );

    {
        let mut sources = device.sources().unwrap();
        sources.create(0).unwrap();
        let mut source = sources.control(0);
        source.use_buffer(0).unwrap();

        source.play().unwrap();
        assert_eq!(source.state(), SourceState::Playing);

        source.stop().unwrap();
        assert_eq!(source.state(), SourceState::Stopped);
    }

    device.buffers().unwrap().remove(0);
    assert_eq!(device.backend().live_buffers(), 0);

    let mut sources = device.sources().unwrap();
    let mut source = sources.control(0);
    assert!(!source.attached_handles().contains(&buffer));
    assert_eq!(source.int_property(SourceIntParam::BuffersQueued), 0);

    // Nothing left to play
    source.play().unwrap();
    assert!(!source.is_playing());
}

#[test]
fn test_removing_playing_static_buffer_clears_binding() {
    let temp_dir = TempDir::new().unwrap();
    let path = one_second_mono(&temp_dir, "clip.wav");
    let mut device = device_with_buffers(&[path.as_path()]);

    {
        let mut sources = device.sources().unwrap();
        sources.create(0).unwrap();
        let mut source = sources.control(0);
        source.use_buffer(0).unwrap();
        source.play().unwrap();
    }

    device.buffers().unwrap().remove(0);

    let mut sources = device.sources().unwrap();
    let mut source = sources.control(0);
    assert!(source.attached_handles().is_empty());
    assert!(source.is_stopped());
    source.play().unwrap();
    assert!(!source.is_playing());
}

#[test]
fn test_use_missing_buffer_is_noop() {
    let mut device = test_device();
    let mut sources = device.sources().unwrap();
    sources.create(0).unwrap();

    let mut source = sources.control(0);
    source.use_buffer(42).unwrap();
    assert!(source.buffer_ids().is_empty());
    assert_eq!(source.state(), SourceState::Initial);
}

#[test]
fn test_switch_static_to_streaming_preserves_offset_while_playing() {
    let temp_dir = TempDir::new().unwrap();
    let first = one_second_mono(&temp_dir, "first.wav");
    let second = one_second_mono(&temp_dir, "second.wav");
    let mut device = device_with_buffers(&[first.as_path(), second.as_path()]);

    {
        let mut sources = device.sources().unwrap();
        sources.create(0).unwrap();
        let mut source = sources.control(0);
        source.use_buffer(0).unwrap();
        source.play().unwrap();
    }
    device.advance(0, 20_000).unwrap();

    let mut sources = device.sources().unwrap();
    let mut source = sources.control(0);
    assert_eq!(source.int_property(SourceIntParam::ByteOffset), 20_000);

    source.queue_buffers(&[1]).unwrap();

    assert_eq!(source.state(), SourceState::Playing);
    assert_eq!(source.int_property(SourceIntParam::ByteOffset), 20_000);
    assert_eq!(source.source_type(), SourceType::Streaming);
    assert_eq!(source.buffer_ids(), vec![0, 1]);
}

#[test]
fn test_switch_while_paused_restores_offset_on_next_play() {
    let temp_dir = TempDir::new().unwrap();
    let first = one_second_mono(&temp_dir, "first.wav");
    let second = one_second_mono(&temp_dir, "second.wav");
    let mut device = device_with_buffers(&[first.as_path(), second.as_path()]);

    {
        let mut sources = device.sources().unwrap();
        sources.create(0).unwrap();
        sources.control(0).use_buffer(0).unwrap();
        sources.control(0).play().unwrap();
    }
    device.advance(0, 5_000).unwrap();

    let mut sources = device.sources().unwrap();
    let mut source = sources.control(0);
    source.pause().unwrap();
    source.queue_buffers(&[1]).unwrap();

    // Paused playback is not resumed by the switch
    assert!(!source.is_playing());

    source.play().unwrap();
    assert_eq!(source.int_property(SourceIntParam::ByteOffset), 5_000);
}

#[test]
fn test_switch_after_static_finished_starts_at_new_data() {
    let temp_dir = TempDir::new().unwrap();
    let first = one_second_mono(&temp_dir, "first.wav");
    let second = one_second_mono(&temp_dir, "second.wav");
    let mut device = device_with_buffers(&[first.as_path(), second.as_path()]);

    {
        let mut sources = device.sources().unwrap();
        sources.create(0).unwrap();
        sources.control(0).use_buffer(0).unwrap();
        sources.control(0).play().unwrap();
    }
    let state = device.advance(0, ONE_SECOND_MONO_BYTES as usize).unwrap();
    assert_eq!(state, SourceState::Stopped);

    let mut sources = device.sources().unwrap();
    let mut source = sources.control(0);
    source.queue_buffers(&[1]).unwrap();
    source.play().unwrap();

    assert_eq!(
        source.int_property(SourceIntParam::ByteOffset),
        ONE_SECOND_MONO_BYTES
    );
    assert_eq!(source.int_property(SourceIntParam::BuffersProcessed), 1);
}

#[test]
fn test_rejected_switch_to_streaming_keeps_static_playback() {
    let temp_dir = TempDir::new().unwrap();
    let mono = one_second_mono(&temp_dir, "mono.wav");
    let stereo = temp_dir.path().join("stereo.wav");
    generate_sine_wav(&stereo, 2, 500, 440.0).unwrap();
    let mut device = device_with_buffers(&[mono.as_path(), stereo.as_path()]);

    {
        let mut sources = device.sources().unwrap();
        sources.create(0).unwrap();
        let mut source = sources.control(0);
        source.use_buffer(0).unwrap();
        source.play().unwrap();
    }
    device.advance(0, 20_000).unwrap();

    let mut sources = device.sources().unwrap();
    let mut source = sources.control(0);
    let err = source.queue_buffers(&[1]).unwrap_err();

    assert!(matches!(err, AudioError::Backend { .. }));
    assert!(!err.is_fatal());
    assert_eq!(source.state(), SourceState::Playing);
    assert_eq!(source.source_type(), SourceType::Static);
    assert_eq!(source.buffer_ids(), vec![0]);
    assert_eq!(source.int_property(SourceIntParam::ByteOffset), 20_000);
}

#[test]
fn test_queue_without_static_buffer_does_not_seek_or_play() {
    let temp_dir = TempDir::new().unwrap();
    let first = one_second_mono(&temp_dir, "first.wav");
    let second = one_second_mono(&temp_dir, "second.wav");
    let mut device = device_with_buffers(&[first.as_path(), second.as_path()]);

    let mut sources = device.sources().unwrap();
    sources.create(0).unwrap();
    let mut source = sources.control(0);
    source.queue_buffers(&[0, 99, 1]).unwrap();

    assert_eq!(source.buffer_ids(), vec![0, 1]);
    assert_eq!(source.state(), SourceState::Initial);
    assert_eq!(source.int_property(SourceIntParam::ByteOffset), 0);
}

#[test]
fn test_removing_queued_buffer_requeues_remaining_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let paths: Vec<PathBuf> = (0..3)
        .map(|i| one_second_mono(&temp_dir, &format!("part{}.wav", i)))
        .collect();
    let path_refs: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
    let mut device = device_with_buffers(&path_refs);

    {
        let mut sources = device.sources().unwrap();
        sources.create(0).unwrap();
        sources.create(1).unwrap();
        sources.control(0).queue_buffers(&[0, 1, 2]).unwrap();
        sources.control(0).play().unwrap();
        sources.control(1).use_buffer(2).unwrap();
    }

    device.buffers().unwrap().remove(1);

    let mut sources = device.sources().unwrap();
    let streaming = sources.control(0);
    assert_eq!(streaming.buffer_ids(), vec![0, 2]);
    assert!(streaming.is_playing());
    assert_eq!(streaming.int_property(SourceIntParam::BuffersQueued), 2);

    // Unrelated source untouched
    assert_eq!(sources.control(1).buffer_ids(), vec![2]);
}

#[test]
fn test_detach_buffers_empties_everything() {
    let temp_dir = TempDir::new().unwrap();
    let path = one_second_mono(&temp_dir, "clip.wav");
    let mut device = device_with_buffers(&[path.as_path()]);

    let mut sources = device.sources().unwrap();
    sources.create(0).unwrap();
    let mut source = sources.control(0);
    source.queue_buffers(&[0]).unwrap();
    source.play().unwrap();

    source.detach_buffers().unwrap();
    assert!(source.attached_handles().is_empty());
    assert!(source.is_stopped());
    assert_eq!(source.int_property(SourceIntParam::BuffersQueued), 0);
}

#[test]
fn test_reloading_attached_buffer_detaches_first() {
    let temp_dir = TempDir::new().unwrap();
    let mono = one_second_mono(&temp_dir, "mono.wav");
    let stereo = temp_dir.path().join("stereo.wav");
    generate_silent_wav(&stereo, 2, 500).unwrap();
    let mut device = device_with_buffers(&[mono.as_path()]);

    {
        let mut sources = device.sources().unwrap();
        sources.create(0).unwrap();
        sources.control(0).use_buffer(0).unwrap();
    }

    device.buffers().unwrap().load(0, &stereo).unwrap();

    assert_eq!(device.buffers().unwrap().info(0).unwrap().channels, 2);
    let mut sources = device.sources().unwrap();
    assert!(sources.control(0).buffer_ids().is_empty());
}

#[test]
fn test_unsupported_channel_count_is_recoverable() {
    let mut device = device_with_decoder(StubDecoder {
        channels: 6,
        frames: 480,
    });

    let err = device
        .buffers()
        .unwrap()
        .create_from_file(Some(0), Path::new("surround.wav"))
        .err()
        .unwrap();

    assert!(matches!(err, AudioError::UnsupportedFormat { channels: 6 }));
    assert!(!err.is_fatal());
    assert!(device.sources().is_ok());
}

#[test]
fn test_source_properties_pass_through() {
    let temp_dir = TempDir::new().unwrap();
    let path = one_second_mono(&temp_dir, "clip.wav");
    let mut device = device_with_buffers(&[path.as_path()]);

    {
        let mut sources = device.sources().unwrap();
        sources.create(0).unwrap();
        let mut source = sources.control(0);
        source.use_buffer(0).unwrap();
        source.set_volume(140).unwrap();
        assert_eq!(source.volume(), 100);
        source.set_volume(25).unwrap();
        assert_eq!(source.volume(), 25);

        source.set_looping(true).unwrap();
        assert!(source.looping());
        source.play().unwrap();
    }

    // Looping wraps instead of stopping
    let state = device.advance(0, ONE_SECOND_MONO_BYTES as usize + 10).unwrap();
    assert_eq!(state, SourceState::Playing);
    let mut sources = device.sources().unwrap();
    assert_eq!(sources.control(0).int_property(SourceIntParam::ByteOffset), 10);
}
