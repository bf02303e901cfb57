// Settings module
// Persisted device selection, volume and mute policy

pub mod settings;

pub use settings::{clamp_volume, SettingsProvider, SharedSettings, SoundboardSettings};
