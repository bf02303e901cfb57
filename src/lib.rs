// Soundboard - multi-device clip playback
// Module declarations
pub mod audio;
pub mod catalogue;
pub mod dispatch;
pub mod error;
pub mod mic;
pub mod playback;
pub mod settings;

pub use audio::{AudioDevice, CpalStreamFactory, DeviceTarget, OutputHandle, OutputStreamFactory};
pub use catalogue::{Catalogue, Hotkey, Sound};
pub use dispatch::HotkeyDispatcher;
pub use error::{Error, Result};
pub use mic::{MicMute, MuteCoordinator, SystemMicMute};
pub use playback::{PlayReport, PlaybackEngine};
pub use settings::{SettingsProvider, SharedSettings, SoundboardSettings};
