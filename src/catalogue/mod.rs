// Sound catalogue
// Ordered list of clips, their hotkeys, and JSON persistence

pub mod hotkey;
pub mod scanner;
pub mod sound;

pub use hotkey::{Hotkey, HotkeyMap};
pub use scanner::DirectoryScanner;
pub use sound::Sound;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Editable metadata of an existing sound
#[derive(Debug, Clone, Default)]
pub struct SoundEdit {
    pub nickname: String,
    pub start_time: Duration,
    pub hotkey: Hotkey,
}

#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    sounds: Vec<Sound>,
    hotkeys: HotkeyMap,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalogue_path(app_dir: &Path) -> PathBuf {
        app_dir.join("sounds.json")
    }

    /// Load the catalogue, or an empty one if nothing was saved yet
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = Self::catalogue_path(app_dir);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let sounds: Vec<Sound> = serde_json::from_str(&content)
            .map_err(|e| Error::Catalogue(format!("Failed to parse {:?}: {}", path, e)))?;

        let mut catalogue = Self::default();
        for sound in sounds {
            catalogue.add(sound)?;
        }
        debug!("Loaded {} sounds from {:?}", catalogue.len(), path);
        Ok(catalogue)
    }

    pub fn save(&self, app_dir: &Path) -> Result<()> {
        fs::create_dir_all(app_dir)?;
        let path = Self::catalogue_path(app_dir);
        fs::write(&path, serde_json::to_string_pretty(&self.sounds)?)?;
        debug!("Saved {} sounds to {:?}", self.sounds.len(), path);
        Ok(())
    }

    pub fn sounds(&self) -> &[Sound] {
        &self.sounds
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&Sound> {
        self.sounds.iter().find(|s| s.path() == path)
    }

    /// Add a new sound. A path can only be catalogued once.
    pub fn add(&mut self, mut sound: Sound) -> Result<()> {
        if self.get(sound.path()).is_some() {
            return Err(Error::Catalogue(format!(
                "{} is already in the catalogue",
                sound.path().display()
            )));
        }

        let hotkey = std::mem::take(&mut sound.hotkey);
        let path = sound.path().to_path_buf();
        self.sounds.push(sound);
        self.assign_hotkey(&path, hotkey);
        Ok(())
    }

    /// Replace the editable metadata of a catalogued sound.
    pub fn update(&mut self, path: &Path, edit: SoundEdit) -> Result<()> {
        let sound = self
            .sounds
            .iter_mut()
            .find(|s| s.path() == path)
            .ok_or_else(|| Error::Catalogue(format!("{} is not catalogued", path.display())))?;

        sound.nickname = edit.nickname;
        sound.start_time = edit.start_time;
        let changed = sound.hotkey != edit.hotkey;

        if changed {
            self.assign_hotkey(path, edit.hotkey);
        }
        Ok(())
    }

    pub fn remove(&mut self, path: &Path) -> Option<Sound> {
        let index = self.sounds.iter().position(|s| s.path() == path)?;
        self.hotkeys.unbind_path(path);
        Some(self.sounds.remove(index))
    }

    /// The sound bound to `hotkey`, if any
    pub fn sound_for_hotkey(&self, hotkey: &Hotkey) -> Option<&Sound> {
        self.hotkeys.lookup(hotkey).and_then(|path| self.get(path))
    }

    /// Add every supported clip under `directory` that is not catalogued yet,
    /// nicknamed after its file stem. Returns how many were added.
    pub fn import_directory(&mut self, directory: &Path) -> Result<usize> {
        let mut added = 0;
        for path in DirectoryScanner::scan(directory)? {
            if self.get(&path).is_some() {
                continue;
            }
            let mut sound = Sound::new(path.clone());
            sound.nickname = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.add(sound)?;
            added += 1;
        }
        info!("Imported {} sounds from {}", added, directory.display());
        Ok(added)
    }

    /// Move `path`'s binding to `hotkey`, taking it from any other sound.
    fn assign_hotkey(&mut self, path: &Path, hotkey: Hotkey) {
        if let Some(sound) = self.sounds.iter().find(|s| s.path() == path) {
            if !sound.hotkey.is_empty() {
                self.hotkeys.unbind(&sound.hotkey);
            }
        }

        if let Some(previous) = self.hotkeys.bind(&hotkey, path) {
            if previous != path {
                if let Some(other) = self.sounds.iter_mut().find(|s| s.path() == previous) {
                    other.hotkey.clear();
                }
            }
        }

        if let Some(sound) = self.sounds.iter_mut().find(|s| s.path() == path) {
            sound.hotkey = hotkey;
        }
    }
}
