// Hotkey dispatch
// Turns a pressed chord into a play request on the engine

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::catalogue::{Catalogue, Hotkey};
use crate::playback::{PlayReport, PlaybackEngine};

pub struct HotkeyDispatcher {
    engine: Arc<PlaybackEngine>,
    catalogue: Arc<RwLock<Catalogue>>,
    enabled: AtomicBool,
}

impl HotkeyDispatcher {
    pub fn new(engine: Arc<PlaybackEngine>, catalogue: Arc<RwLock<Catalogue>>) -> Self {
        Self {
            engine,
            catalogue,
            enabled: AtomicBool::new(true),
        }
    }

    /// Suspend or resume hotkeys, e.g. while a sound is being edited
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Play the sound bound to `hotkey`. `None` when suspended or unbound.
    pub fn dispatch(&self, hotkey: &Hotkey) -> Option<PlayReport> {
        if !self.is_enabled() {
            debug!("Hotkeys suspended, ignoring {}", hotkey);
            return None;
        }

        // Clone out so the catalogue lock is not held while devices open
        let sound = self.catalogue.read().sound_for_hotkey(hotkey).cloned()?;
        Some(self.engine.play(&sound, None))
    }
}
