// Boundary between the playback engine and whatever renders audio
use std::path::PathBuf;
use std::time::Duration;

use super::device::AudioDevice;
use crate::error::Result;

/// Fired by a stream when it reaches the end of its source on its own.
///
/// Called at most once, from whatever thread the backend uses, at any point
/// after `open` receives it (even before `open` returns or before
/// [`OutputHandle::play`]). A stream that is stopped through
/// [`OutputHandle::stop`] never fires it.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Everything a factory needs to open one device-bound stream.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub path: PathBuf,
    pub device: AudioDevice,
    pub start: Duration,
}

/// One opened output stream bound to one device.
///
/// Dropping the handle releases the underlying output resource.
pub trait OutputHandle: Send + Sync {
    /// Begin (or resume) rendering.
    fn play(&self);

    /// Halt rendering. Must be safe to call more than once.
    fn stop(&self);

    fn set_volume(&self, volume: f32);

    fn volume(&self) -> f32;
}

/// Opens seekable, playable streams for a file on a device.
pub trait OutputStreamFactory: Send + Sync {
    /// Open a stream positioned at `request.start`, not yet playing.
    ///
    /// Failures (missing device, unreadable file, unsupported codec) are
    /// reported here, synchronously. Once this returns an error, a call to
    /// `on_complete` is ignored.
    fn open(
        &self,
        request: &StreamRequest,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn OutputHandle>>;
}
