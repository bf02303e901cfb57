// Playback engine
// Fans a sound out to every target device and keeps stop/volume/mute consistent

use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::active::{ActiveStream, StreamState};
use crate::audio::device::dedup_devices;
use crate::audio::{
    AudioDevice, CompletionCallback, DeviceTarget, OutputHandle, OutputStreamFactory,
    StreamRequest,
};
use crate::catalogue::Sound;
use crate::error::{Error, Result};
use crate::mic::{MicMute, MuteCoordinator};
use crate::settings::{clamp_volume, SettingsProvider};

type StreamId = u64;

/// A device that could not be opened during `play`
#[derive(Debug)]
pub struct DeviceFailure {
    pub device: AudioDevice,
    pub error: Error,
}

/// Outcome of one `play` call, per device
#[derive(Debug, Default)]
pub struct PlayReport {
    pub started: Vec<AudioDevice>,
    pub failed: Vec<DeviceFailure>,
}

impl PlayReport {
    /// Nothing was attempted (no target devices)
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.failed.is_empty()
    }

    pub fn all_failed(&self) -> bool {
        self.started.is_empty() && !self.failed.is_empty()
    }
}

/// Active set and volume. Mute transitions are decided while this is locked.
struct EngineState {
    streams: BTreeMap<StreamId, Arc<ActiveStream>>,
    volume: f32,
    /// Streams between `open` and registration; `true` once they completed
    opening: HashMap<StreamId, bool>,
}

/// The part completion callbacks reach back into
struct Shared {
    state: Mutex<EngineState>,
    mute: MuteCoordinator,
}

impl Shared {
    /// A stream reached the end of its clip on its own.
    fn complete(&self, id: StreamId) {
        let stream = {
            let mut state = self.state.lock();
            let Some(stream) = state.streams.remove(&id) else {
                // Finished before registration; `start_on_device` releases it
                if let Some(completed) = state.opening.get_mut(&id) {
                    *completed = true;
                }
                // Otherwise already removed by a stop, which owns the release
                return;
            };
            if state.streams.is_empty() {
                self.mute.playback_stopped();
            }
            stream
        };

        debug!("Stream on '{}' completed", stream.device());
        stream.finish(StreamState::Completed);
    }
}

/// Plays sounds on a set of output devices.
///
/// All methods take `&self`; the engine can be shared between the UI and a
/// hotkey dispatcher behind an `Arc`.
pub struct PlaybackEngine {
    shared: Arc<Shared>,
    factory: Arc<dyn OutputStreamFactory>,
    settings: Arc<dyn SettingsProvider>,
    target: Mutex<DeviceTarget>,
    next_id: AtomicU64,
}

impl PlaybackEngine {
    /// Engine targeting the configured device selection, starting at the
    /// configured volume.
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        factory: Arc<dyn OutputStreamFactory>,
        mic: Arc<dyn MicMute>,
    ) -> Self {
        let volume = clamp_volume(settings.volume_normalized());
        let mute = MuteCoordinator::new(mic, Arc::clone(&settings));

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(EngineState {
                    streams: BTreeMap::new(),
                    volume,
                    opening: HashMap::new(),
                }),
                mute,
            }),
            factory,
            settings,
            target: Mutex::new(DeviceTarget::Configured),
            next_id: AtomicU64::new(1),
        }
    }

    /// Engine for auditioning clips on the configured preview device only.
    pub fn preview(
        settings: Arc<dyn SettingsProvider>,
        factory: Arc<dyn OutputStreamFactory>,
        mic: Arc<dyn MicMute>,
    ) -> Self {
        let preview_device = settings.selected_preview_device();
        let engine = Self::new(settings, factory, mic);
        engine.set_playback_device(preview_device);
        engine
    }

    /// Replace the target devices with a list owned by this engine.
    /// Streams already playing are not affected.
    pub fn set_playback_devices(&self, devices: Vec<AudioDevice>) {
        *self.target.lock() = DeviceTarget::Private(dedup_devices(devices));
    }

    /// Target exactly one device; `None` turns `play` into a no-op.
    pub fn set_playback_device(&self, device: Option<AudioDevice>) {
        *self.target.lock() = DeviceTarget::Private(device.into_iter().collect());
    }

    /// Go back to the live device selection from settings.
    pub fn use_configured_devices(&self) {
        *self.target.lock() = DeviceTarget::Configured;
    }

    /// Stop everything, then retarget to a new preview device.
    pub fn switch_preview_device(&self, device: Option<AudioDevice>) {
        self.stop_all_sounds();
        self.set_playback_device(device);
    }

    pub fn target(&self) -> DeviceTarget {
        self.target.lock().clone()
    }

    /// Devices the next `play` will open, in order
    pub fn target_devices(&self) -> Vec<AudioDevice> {
        match &*self.target.lock() {
            DeviceTarget::Configured => dedup_devices(self.settings.selected_playback_devices()),
            DeviceTarget::Private(devices) => devices.clone(),
        }
    }

    /// Play `sound` on every target device, from `start` or else the sound's
    /// own start offset.
    ///
    /// Each device gets its own decoder and stream. A device that fails to
    /// open is reported and skipped; the rest still play.
    pub fn play(&self, sound: &Sound, start: Option<Duration>) -> PlayReport {
        let start = start.unwrap_or(sound.start_time);
        let devices = self.target_devices();
        let mut report = PlayReport::default();

        if devices.is_empty() {
            debug!("No playback devices targeted, not playing '{}'", sound.display_name());
            return report;
        }

        info!(
            "Playing '{}' from {:?} on {} device(s)",
            sound.display_name(),
            start,
            devices.len()
        );

        for device in devices {
            match self.start_on_device(sound, &device, start) {
                Ok(()) => report.started.push(device),
                Err(error) => {
                    warn!(
                        "Failed to play '{}' on '{}': {}",
                        sound.display_name(),
                        device,
                        error
                    );
                    report.failed.push(DeviceFailure { device, error });
                }
            }
        }

        report
    }

    fn start_on_device(&self, sound: &Sound, device: &AudioDevice, start: Duration) -> Result<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = StreamRequest {
            path: sound.path().to_path_buf(),
            device: device.clone(),
            start,
        };

        self.shared.state.lock().opening.insert(id, false);
        let opened = self.factory.open(&request, self.completion_for(id));
        let handle: Arc<dyn OutputHandle> = match opened {
            Ok(handle) => Arc::from(handle),
            Err(e) => {
                self.shared.state.lock().opening.remove(&id);
                return Err(e);
            }
        };
        let stream = Arc::new(ActiveStream::new(device.clone(), handle));

        {
            let mut state = self.shared.state.lock();
            if state.opening.remove(&id) == Some(true) {
                drop(state);
                debug!("Stream on '{}' completed before it started", device);
                stream.finish(StreamState::Completed);
                return Ok(());
            }
            stream.set_volume(state.volume);
            if state.streams.is_empty() {
                self.shared.mute.playback_started();
            }
            state.streams.insert(id, Arc::clone(&stream));
        }

        stream.start();
        Ok(())
    }

    fn completion_for(&self, id: StreamId) -> CompletionCallback {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        Box::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.complete(id);
            }
        })
    }

    /// Current volume in [0.0, 1.0]
    pub fn volume(&self) -> f32 {
        self.shared.state.lock().volume
    }

    /// Clamp, store, and apply to every active stream before returning.
    pub fn set_volume(&self, volume: f32) {
        let volume = clamp_volume(volume);
        let mut state = self.shared.state.lock();
        state.volume = volume;
        for stream in state.streams.values() {
            stream.set_volume(volume);
        }
    }

    /// Stop every stream playing on `device`. Other devices keep playing.
    pub fn stop_sounds_on_device(&self, device: Option<&AudioDevice>) {
        let Some(device) = device else {
            return;
        };

        let removed = {
            let mut state = self.shared.state.lock();
            let (removed, kept): (BTreeMap<_, _>, BTreeMap<_, _>) = std::mem::take(&mut state.streams)
                .into_iter()
                .partition(|(_, stream)| stream.device() == device);
            state.streams = kept;

            if removed.is_empty() {
                return;
            }
            if state.streams.is_empty() {
                self.shared.mute.playback_stopped();
            }
            removed
        };

        debug!("Stopping {} stream(s) on '{}'", removed.len(), device);
        release_all(removed.into_values().collect());
    }

    /// Stop every stream on every device.
    ///
    /// Always requests mic unmute. Stops run in parallel and have all
    /// finished when this returns.
    pub fn stop_all_sounds(&self) {
        let removed = {
            let mut state = self.shared.state.lock();
            let removed = std::mem::take(&mut state.streams);
            self.shared.mute.playback_stopped();
            removed
        };

        if !removed.is_empty() {
            debug!("Stopping all {} stream(s)", removed.len());
        }
        release_all(removed.into_values().collect());
    }

    pub fn is_playing(&self) -> bool {
        !self.shared.state.lock().streams.is_empty()
    }

    pub fn active_stream_count(&self) -> usize {
        self.shared.state.lock().streams.len()
    }

    /// Device of every active stream, oldest first
    pub fn active_devices(&self) -> Vec<AudioDevice> {
        self.shared
            .state
            .lock()
            .streams
            .values()
            .map(|stream| stream.device().clone())
            .collect()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if self.is_playing() {
            self.stop_all_sounds();
        }
    }
}

/// Stop and release streams together rather than one after another.
fn release_all(streams: Vec<Arc<ActiveStream>>) {
    streams.par_iter().for_each(|stream| {
        stream.finish(StreamState::Stopped);
    });
}
