//! Audio Test File Generation Utilities
//!
//! Generates 16-bit PCM WAV files with known characteristics so buffer sizes
//! and byte offsets can be asserted exactly.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

/// Standard test sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

fn wav_spec(channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Generate a silent WAV file
///
/// # Arguments
/// * `path` - Output file path
/// * `channels` - Channel count (1 = mono, 2 = stereo)
/// * `duration_ms` - Duration in milliseconds
pub fn generate_silent_wav<P: AsRef<Path>>(
    path: P,
    channels: u16,
    duration_ms: u64,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, wav_spec(channels))?;

    let total_frames = (TEST_SAMPLE_RATE as u64 * duration_ms) / 1000;
    for _ in 0..total_frames * channels as u64 {
        writer.write_sample(0i16)?;
    }

    writer.finalize()?;
    Ok(())
}

/// Generate a sine wave WAV file at half amplitude
///
/// Every channel carries the same signal.
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    channels: u16,
    duration_ms: u64,
    frequency: f32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, wav_spec(channels))?;

    let total_frames = (TEST_SAMPLE_RATE as u64 * duration_ms) / 1000;
    let amplitude = i16::MAX as f32 * 0.5;

    for frame in 0..total_frames {
        let t = frame as f32 / TEST_SAMPLE_RATE as f32;
        let sample = (amplitude * (2.0 * PI * frequency * t).sin()) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(())
}
