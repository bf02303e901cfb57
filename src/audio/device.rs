// Output device identity and enumeration
use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::error::{Error, Result};

/// One physical or logical output endpoint.
///
/// Equality and hashing only look at `id`; the name is display text and may
/// change between sessions without the device becoming a different one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl PartialEq for AudioDevice {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AudioDevice {}

impl Hash for AudioDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Which devices a subsequent `play` fans out to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceTarget {
    /// The live selection from the settings provider, read at play time
    #[default]
    Configured,
    /// A list owned by this engine instance
    Private(Vec<AudioDevice>),
}

/// Remove later duplicates of the same device id, keeping first-seen order.
pub fn dedup_devices(devices: Vec<AudioDevice>) -> Vec<AudioDevice> {
    let mut unique: Vec<AudioDevice> = Vec::with_capacity(devices.len());
    for device in devices {
        if !unique.contains(&device) {
            unique.push(device);
        }
    }
    unique
}

/// cpal has no stable endpoint id across hosts, so the device name doubles as
/// the identifier.
fn describe(device: &cpal::Device) -> Option<AudioDevice> {
    device.name().ok().map(|name| AudioDevice::new(name.clone(), name))
}

/// List the output devices of the default host.
pub fn list_output_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();

    let devices: Vec<AudioDevice> = host
        .output_devices()
        .map_err(|e| Error::Device(format!("Failed to enumerate devices: {}", e)))?
        .filter_map(|device| describe(&device))
        .collect();

    debug!("Found {} output devices", devices.len());
    Ok(devices)
}

/// The host's default output device, if there is one.
pub fn default_output_device() -> Option<AudioDevice> {
    cpal::default_host()
        .default_output_device()
        .and_then(|device| describe(&device))
}

/// Resolve an `AudioDevice` back to the cpal device it names.
pub(crate) fn find_cpal_device(device: &AudioDevice) -> Result<cpal::Device> {
    let host = cpal::default_host();

    let mut devices = host
        .output_devices()
        .map_err(|e| Error::Device(format!("Failed to enumerate devices: {}", e)))?;

    devices
        .find(|d| d.name().ok().as_deref() == Some(device.id.as_str()))
        .ok_or_else(|| Error::Device(format!("Output device '{}' not found", device.name)))
}
