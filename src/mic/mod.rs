// Microphone mute side channel
// The engine only asks for muted/unmuted; the policy flag and platform live here

use std::sync::Arc;
use tracing::debug;

use crate::settings::SettingsProvider;

#[cfg(windows)]
mod windows_mic;

#[cfg(windows)]
pub use windows_mic::SystemMicMute;

/// Anything that can mute or unmute the system microphone.
pub trait MicMute: Send + Sync {
    fn set_mic_muted(&self, muted: bool);
}

/// Applies the mute-while-playing policy to engine requests.
#[derive(Clone)]
pub struct MuteCoordinator {
    mic: Arc<dyn MicMute>,
    settings: Arc<dyn SettingsProvider>,
}

impl MuteCoordinator {
    pub fn new(mic: Arc<dyn MicMute>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self { mic, settings }
    }

    /// Playback went from silent to audible. Mutes only when the policy is on.
    pub fn playback_started(&self) {
        if self.settings.mute_microphone_while_playing() {
            debug!("Muting microphone while playing");
            self.mic.set_mic_muted(true);
        }
    }

    /// Playback went silent. Always unmutes.
    pub fn playback_stopped(&self) {
        debug!("Unmuting microphone");
        self.mic.set_mic_muted(false);
    }
}

/// Stand-in used where no system mixer integration exists.
#[cfg(not(windows))]
mod stub {
    use tracing::debug;

    #[derive(Debug, Default)]
    pub struct SystemMicMute;

    impl SystemMicMute {
        pub fn new() -> crate::Result<Self> {
            Ok(Self)
        }
    }

    impl super::MicMute for SystemMicMute {
        fn set_mic_muted(&self, muted: bool) {
            debug!("Microphone mute not supported on this platform (requested {})", muted);
        }
    }
}

#[cfg(not(windows))]
pub use stub::SystemMicMute;
