//! Test harness for PlaybackEngine integration tests
//!
//! Provides:
//! - `MockFactory`: records every opened stream, can fail chosen devices,
//!   and lets tests fire completion the way an audio thread would
//! - `RecordingMic`: remembers every mute request in order
//! - `TestEngine`: an engine wired to both, with live `SharedSettings`

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use soundboard::audio::{CompletionCallback, OutputHandle, OutputStreamFactory, StreamRequest};
use soundboard::{
    AudioDevice, Error, MicMute, PlaybackEngine, Result, SharedSettings, Sound,
    SoundboardSettings,
};

/// Observable side of one opened stream
pub struct MockStream {
    pub request: StreamRequest,
    plays: AtomicUsize,
    stops: AtomicUsize,
    releases: AtomicUsize,
    volume: Mutex<f32>,
    completion: Mutex<Option<CompletionCallback>>,
    complete_on_play: bool,
}

impl MockStream {
    pub fn device(&self) -> &AudioDevice {
        &self.request.device
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// How many times the output resource was dropped
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    /// Report natural end of the clip. Returns false if already reported.
    pub fn complete(&self) -> bool {
        let callback = self.completion.lock().take();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

/// What the engine actually owns; dropping it counts as a release
struct MockOutput(Arc<MockStream>);

impl OutputHandle for MockOutput {
    fn play(&self) {
        self.0.plays.fetch_add(1, Ordering::SeqCst);
        if self.0.complete_on_play {
            self.0.complete();
        }
    }

    fn stop(&self) {
        self.0.stops.fetch_add(1, Ordering::SeqCst);
        // A stopped stream never reports completion
        self.0.completion.lock().take();
    }

    fn set_volume(&self, volume: f32) {
        *self.0.volume.lock() = volume;
    }

    fn volume(&self) -> f32 {
        *self.0.volume.lock()
    }
}

impl Drop for MockOutput {
    fn drop(&mut self) {
        self.0.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockFactory {
    streams: Mutex<Vec<Arc<MockStream>>>,
    failing: Mutex<HashSet<String>>,
    complete_on_play: AtomicBool,
    complete_on_open: AtomicBool,
}

impl MockFactory {
    /// Opening a stream on `device` will fail from now on
    pub fn fail_device(&self, device: &AudioDevice) {
        self.failing.lock().insert(device.id.clone());
    }

    /// Streams finish inside `play`, like a zero-length clip
    pub fn complete_immediately(&self, enabled: bool) {
        self.complete_on_play.store(enabled, Ordering::SeqCst);
    }

    /// Streams finish inside `open`, before the engine has registered them
    pub fn complete_during_open(&self, enabled: bool) {
        self.complete_on_open.store(enabled, Ordering::SeqCst);
    }

    /// Every stream opened so far, in open order
    pub fn streams(&self) -> Vec<Arc<MockStream>> {
        self.streams.lock().clone()
    }

    pub fn streams_on(&self, device: &AudioDevice) -> Vec<Arc<MockStream>> {
        self.streams()
            .into_iter()
            .filter(|s| s.device() == device)
            .collect()
    }

    pub fn opened(&self) -> usize {
        self.streams.lock().len()
    }
}

impl OutputStreamFactory for MockFactory {
    fn open(
        &self,
        request: &StreamRequest,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn OutputHandle>> {
        if self.failing.lock().contains(&request.device.id) {
            return Err(Error::Device(format!("{} is unplugged", request.device.name)));
        }

        let stream = Arc::new(MockStream {
            request: request.clone(),
            plays: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            volume: Mutex::new(1.0),
            completion: Mutex::new(Some(on_complete)),
            complete_on_play: self.complete_on_play.load(Ordering::SeqCst),
        });
        self.streams.lock().push(Arc::clone(&stream));
        if self.complete_on_open.load(Ordering::SeqCst) {
            stream.complete();
        }
        Ok(Box::new(MockOutput(stream)))
    }
}

#[derive(Default)]
pub struct RecordingMic {
    calls: Mutex<Vec<bool>>,
}

impl RecordingMic {
    pub fn calls(&self) -> Vec<bool> {
        self.calls.lock().clone()
    }
}

impl MicMute for RecordingMic {
    fn set_mic_muted(&self, muted: bool) {
        self.calls.lock().push(muted);
    }
}

pub fn device(id: &str) -> AudioDevice {
    AudioDevice::new(id, format!("Device {}", id))
}

pub fn sound(path: &str) -> Sound {
    Sound::new(path)
}

pub fn sound_from(path: &str, start: Duration) -> Sound {
    let mut sound = Sound::new(path);
    sound.start_time = start;
    sound
}

/// Engine plus the mocks behind it
pub struct TestEngine {
    pub engine: Arc<PlaybackEngine>,
    pub factory: Arc<MockFactory>,
    pub mic: Arc<RecordingMic>,
    pub settings: SharedSettings,
}

impl TestEngine {
    /// Mute-while-playing enabled, full volume, no configured devices
    pub fn new() -> Self {
        Self::with_settings(SoundboardSettings {
            mute_microphone_while_playing: true,
            ..Default::default()
        })
    }

    pub fn with_settings(settings: SoundboardSettings) -> Self {
        let settings = SharedSettings::new(settings);
        let factory = Arc::new(MockFactory::default());
        let mic = Arc::new(RecordingMic::default());
        let engine = Arc::new(PlaybackEngine::new(
            Arc::new(settings.clone()),
            factory.clone(),
            mic.clone(),
        ));

        Self {
            engine,
            factory,
            mic,
            settings,
        }
    }

    /// Engine targeting `devices` privately
    pub fn on_devices(devices: &[AudioDevice]) -> Self {
        let test = Self::new();
        test.engine.set_playback_devices(devices.to_vec());
        test
    }
}
