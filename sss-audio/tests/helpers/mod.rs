//! Test helper modules for sss-audio integration tests
//!
//! - audio_generator: deterministic WAV fixtures written with hound
//! - fixtures: device factories and a stub decoder

#![allow(dead_code)]

pub mod audio_generator;
pub mod fixtures;

pub use audio_generator::{generate_silent_wav, generate_sine_wav, TEST_SAMPLE_RATE};
pub use fixtures::{device_with_decoder, test_device, StubDecoder};
