// Windows microphone mute using Core Audio endpoint volume

use tracing::{debug, warn};
use windows::Win32::Foundation::BOOL;
use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
use windows::Win32::Media::Audio::{
    eCapture, eCommunications, IMMDeviceEnumerator, MMDeviceEnumerator,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_MULTITHREADED,
};

use super::MicMute;
use crate::error::{Error, Result};

/// Mutes the default communications capture endpoint.
///
/// COM interfaces are not `Send`, so every call resolves the endpoint on the
/// calling thread.
#[derive(Debug, Default)]
pub struct SystemMicMute;

impl SystemMicMute {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }

    fn apply(muted: bool) -> Result<()> {
        unsafe {
            // S_FALSE / RPC_E_CHANGED_MODE both leave COM usable on this thread
            let _ = CoInitializeEx(None, COINIT_MULTITHREADED);

            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(|e| Error::Microphone(format!("Failed to create device enumerator: {}", e)))?;

            let device = enumerator
                .GetDefaultAudioEndpoint(eCapture, eCommunications)
                .map_err(|e| Error::Microphone(format!("No default capture device: {}", e)))?;

            let endpoint: IAudioEndpointVolume = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| Error::Microphone(format!("Failed to activate endpoint volume: {}", e)))?;

            endpoint
                .SetMute(BOOL::from(muted), std::ptr::null())
                .map_err(|e| Error::Microphone(format!("Failed to set mute: {}", e)))?;
        }
        Ok(())
    }
}

impl MicMute for SystemMicMute {
    fn set_mic_muted(&self, muted: bool) {
        match Self::apply(muted) {
            Ok(()) => debug!("Microphone muted = {}", muted),
            Err(e) => warn!("{}", e),
        }
    }
}
