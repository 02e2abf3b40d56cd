//! Audio file decoding using symphonia
//!
//! The core only needs one call from a decoder: turn a path into interleaved
//! 16-bit PCM plus its channel count and sample rate. Channel validation is
//! done by the buffer load path so every [`SampleDecoder`] is checked the
//! same way.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::{AudioError, Result};

/// Decoded PCM ready to upload to a native buffer
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved 16-bit samples
    pub samples: Vec<i16>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Number of sample frames
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

/// Decoder collaborator: file path in, PCM out
pub trait SampleDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio>;
}

/// [`SampleDecoder`] backed by symphonia's default format and codec registries
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl SampleDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio> {
        debug!("Decoding file: {}", path.display());

        let file = File::open(path).map_err(|source| AudioError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext_str) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext_str);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioError::Decode(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut channels = codec_params.channels.map(|c| c.count() as u16);
        let mut sample_rate = codec_params.sample_rate;
        let mut samples: Vec<i16> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet from {}: {}", path.display(), e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    channels.get_or_insert(spec.channels.count() as u16);
                    sample_rate.get_or_insert(spec.rate);

                    let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                    sample_buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(sample_buf.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Decode error in {}: {}", path.display(), e);
                    continue;
                }
                Err(e) => {
                    return Err(AudioError::Decode(format!("Decoder failed: {}", e)));
                }
            }
        }

        let channels =
            channels.ok_or_else(|| AudioError::Decode("Channel count not found".to_string()))?;
        let sample_rate =
            sample_rate.ok_or_else(|| AudioError::Decode("Sample rate not found".to_string()))?;

        let audio = DecodedAudio {
            samples,
            channels,
            sample_rate,
        };
        debug!(
            "Decoded {} frames, {} channels @ {} Hz",
            audio.frames(),
            audio.channels,
            audio.sample_rate
        );
        Ok(audio)
    }
}
