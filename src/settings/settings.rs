// Settings management and persistence
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::device::AudioDevice;
use crate::error::{Error, Result};

/// What the playback engine reads from configuration.
///
/// Implementations are read on demand, so a live store is reflected on the
/// next `play` without rebuilding the engine.
pub trait SettingsProvider: Send + Sync {
    fn selected_playback_devices(&self) -> Vec<AudioDevice>;

    fn mute_microphone_while_playing(&self) -> bool;

    /// Volume a new engine starts at
    fn volume_normalized(&self) -> f32;

    /// Single device used when previewing a clip
    fn selected_preview_device(&self) -> Option<AudioDevice>;
}

/// Persisted soundboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundboardSettings {
    pub version: i32, // Settings schema version for future migrations
    pub selected_playback_devices: Vec<AudioDevice>,
    pub selected_preview_device: Option<AudioDevice>,
    pub volume_normalized: f32,
    pub mute_microphone_while_playing: bool,
}

impl Default for SoundboardSettings {
    fn default() -> Self {
        Self {
            version: 1,
            selected_playback_devices: Vec::new(),
            selected_preview_device: None,
            volume_normalized: 1.0,
            mute_microphone_while_playing: false,
        }
    }
}

impl SoundboardSettings {
    pub fn settings_path(app_dir: &Path) -> PathBuf {
        app_dir.join("settings.json")
    }

    /// Load settings from file, or return defaults if the file doesn't exist
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = Self::settings_path(app_dir);

        if !path.exists() {
            info!("No settings file found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Settings(format!("Failed to read settings file: {}", e)))?;

        let mut settings: SoundboardSettings = serde_json::from_str(&content)
            .map_err(|e| Error::Settings(format!("Failed to parse settings: {}", e)))?;
        settings.volume_normalized = clamp_volume(settings.volume_normalized);

        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, app_dir: &Path) -> Result<()> {
        fs::create_dir_all(app_dir)
            .map_err(|e| Error::Settings(format!("Failed to create settings directory: {}", e)))?;

        let path = Self::settings_path(app_dir);
        let content = serde_json::to_string_pretty(self)?;

        fs::write(&path, content)
            .map_err(|e| Error::Settings(format!("Failed to write settings file: {}", e)))?;

        debug!("Saved settings to {:?}", path);
        Ok(())
    }
}

/// Clamp to [0.0, 1.0]; NaN counts as silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Settings shared between the UI side and any number of engines.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<SoundboardSettings>>,
}

impl SharedSettings {
    pub fn new(settings: SoundboardSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> SoundboardSettings {
        self.inner.read().clone()
    }

    pub fn update<F: FnOnce(&mut SoundboardSettings)>(&self, f: F) {
        f(&mut *self.inner.write());
    }

    pub fn save(&self, app_dir: &Path) -> Result<()> {
        self.inner.read().save(app_dir)
    }
}

impl SettingsProvider for SharedSettings {
    fn selected_playback_devices(&self) -> Vec<AudioDevice> {
        self.inner.read().selected_playback_devices.clone()
    }

    fn mute_microphone_while_playing(&self) -> bool {
        self.inner.read().mute_microphone_while_playing
    }

    fn volume_normalized(&self) -> f32 {
        self.inner.read().volume_normalized
    }

    fn selected_preview_device(&self) -> Option<AudioDevice> {
        self.inner.read().selected_preview_device.clone()
    }
}
