// One running stream owned by the playback engine
use parking_lot::Mutex;
use std::sync::Arc;

use crate::audio::{AudioDevice, OutputHandle};

/// Lifecycle of an active stream.
///
/// `Starting -> Playing -> {Stopped | Completed}`; both terminal states have
/// released the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Starting,
    Playing,
    /// Ended by a caller
    Stopped,
    /// Ran to the end of the clip
    Completed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Stopped | StreamState::Completed)
    }
}

pub(crate) struct ActiveStream {
    device: AudioDevice,
    state: Mutex<StreamState>,
    handle: Mutex<Option<Arc<dyn OutputHandle>>>,
}

impl ActiveStream {
    pub(crate) fn new(device: AudioDevice, handle: Arc<dyn OutputHandle>) -> Self {
        Self {
            device,
            state: Mutex::new(StreamState::Starting),
            handle: Mutex::new(Some(handle)),
        }
    }

    pub(crate) fn device(&self) -> &AudioDevice {
        &self.device
    }

    pub(crate) fn state(&self) -> StreamState {
        *self.state.lock()
    }

    /// Begin playback. Ignored unless the stream is still `Starting`.
    ///
    /// No lock is held while the handle plays, so a backend may report
    /// completion from inside `play`.
    pub(crate) fn start(&self) {
        let handle = {
            let mut state = self.state.lock();
            if *state != StreamState::Starting {
                return;
            }
            *state = StreamState::Playing;
            self.handle.lock().clone()
        };

        if let Some(handle) = handle {
            handle.play();
        }
    }

    pub(crate) fn set_volume(&self, volume: f32) {
        if let Some(handle) = self.handle.lock().as_ref() {
            handle.set_volume(volume);
        }
    }

    /// Enter `outcome` and release the output. Only the first call does
    /// anything; returns whether this call was it.
    pub(crate) fn finish(&self, outcome: StreamState) -> bool {
        debug_assert!(outcome.is_terminal());
        {
            let mut state = self.state.lock();
            if state.is_terminal() {
                return false;
            }
            *state = outcome;
        }

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if outcome == StreamState::Stopped {
                handle.stop();
            }
            drop(handle);
        }
        true
    }
}
