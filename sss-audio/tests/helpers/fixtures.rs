//! Device factories and decoder stubs

use std::path::Path;

use sss_audio::decoder::{DecodedAudio, SampleDecoder};
use sss_audio::{Device, Result, VirtualBackend};

/// Device on a virtual backend with "Speakers" (default) and "Headphones"
pub fn test_device() -> Device<VirtualBackend> {
    Device::new(VirtualBackend::with_endpoints(["Speakers", "Headphones"]))
}

pub fn device_with_decoder(decoder: impl SampleDecoder + 'static) -> Device<VirtualBackend> {
    Device::with_decoder(VirtualBackend::new(), Box::new(decoder))
}

/// Decoder returning a fixed amount of silence with any channel count
pub struct StubDecoder {
    pub channels: u16,
    pub frames: usize,
}

impl SampleDecoder for StubDecoder {
    fn decode(&self, _path: &Path) -> Result<DecodedAudio> {
        Ok(DecodedAudio {
            samples: vec![0; self.frames * self.channels as usize],
            channels: self.channels,
            sample_rate: 48000,
        })
    }
}
