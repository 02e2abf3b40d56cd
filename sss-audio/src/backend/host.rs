//! Host output device discovery using cpal
//!
//! Only names are taken from the host; the devices are never opened.

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::{debug, warn};

/// Names of the host's output devices, default device first.
///
/// Enumeration failures are logged and produce an empty list.
pub fn output_device_names() -> Vec<String> {
    let host = cpal::default_host();

    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let mut names: Vec<String> = match host.output_devices() {
        Ok(devices) => devices.filter_map(|device| device.name().ok()).collect(),
        Err(e) => {
            warn!("Failed to enumerate host output devices: {}", e);
            Vec::new()
        }
    };

    if let Some(default_name) = default_name {
        names.retain(|n| n != &default_name);
        names.insert(0, default_name);
    }

    debug!("Found {} host output devices", names.len());
    names
}
