// Audio output using cpal
// One worker thread per stream owns the device stream and feeds it through a ring buffer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig, StreamError};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use tracing::{debug, error, info, warn};

use super::decoder::{to_stereo, AudioDecoder};
use super::device::find_cpal_device;
use super::resampler::StreamResampler;
use super::stream::{CompletionCallback, OutputHandle, OutputStreamFactory, StreamRequest};
use crate::error::{Error, Result};

/// Roughly 100ms of stereo audio at 48kHz
const RING_BUFFER_SIZE: usize = 48000 * 2 / 10;

/// How long the worker sleeps when the ring buffer is full
const FEED_INTERVAL: Duration = Duration::from_millis(2);

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

enum Command {
    Play,
    Stop,
}

/// Reports completion when the worker ends for any reason other than an
/// explicit stop, a panic included.
struct CompletionGuard(Option<CompletionCallback>);

impl CompletionGuard {
    fn new(callback: CompletionCallback) -> Self {
        Self(Some(callback))
    }

    /// The stream was stopped or never handed out; nobody expects to hear back
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(callback) = self.0.take() {
            callback();
        }
    }
}

/// Opens device streams through cpal and decodes with Symphonia.
#[derive(Debug, Clone, Default)]
pub struct CpalStreamFactory {
    /// Fixed device buffer size in frames (None = device default)
    buffer_size: Option<u32>,
}

impl CpalStreamFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a fixed device buffer, trading latency against underruns.
    pub fn with_buffer_size(mut self, frames: u32) -> Self {
        self.buffer_size = Some(frames);
        self
    }
}

impl OutputStreamFactory for CpalStreamFactory {
    fn open(
        &self,
        request: &StreamRequest,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn OutputHandle>> {
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let volume = Arc::new(Mutex::new(1.0f32));

        let worker_request = request.clone();
        let worker_volume = Arc::clone(&volume);
        let buffer_size = self.buffer_size;

        let worker = thread::Builder::new()
            .name(format!("soundboard-out:{}", request.device.name))
            .spawn(move || {
                run_worker(
                    worker_request,
                    buffer_size,
                    worker_volume,
                    command_rx,
                    ready_tx,
                    on_complete,
                )
            })?;

        // Open failures surface here, before the handle exists
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                return Err(Error::AudioOutput(format!(
                    "Output worker for '{}' exited during open",
                    request.device.name
                )))
            }
        }

        Ok(Box::new(CpalOutputHandle {
            worker_id: worker.thread().id(),
            commands: Mutex::new(command_tx),
            worker: Mutex::new(Some(worker)),
            volume,
            stopped: AtomicBool::new(false),
        }))
    }
}

/// Handle to a running cpal output worker.
pub struct CpalOutputHandle {
    worker_id: ThreadId,
    commands: Mutex<Sender<Command>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    volume: Arc<Mutex<f32>>,
    stopped: AtomicBool,
}

impl CpalOutputHandle {
    fn shutdown(&self) {
        // The worker may already be gone after a natural finish
        let _ = self.commands.lock().send(Command::Stop);

        // Completion callbacks run on the worker itself; never join from there
        if thread::current().id() == self.worker_id {
            return;
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("Output worker panicked");
            }
        }
    }
}

impl OutputHandle for CpalOutputHandle {
    fn play(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.commands.lock().send(Command::Play);
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown();
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        *self.volume.lock()
    }
}

impl Drop for CpalOutputHandle {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.shutdown();
    }
}

/// Device stream plus the decode pipeline feeding it. Lives on the worker.
struct OpenedOutput {
    stream: Stream,
    /// Set from the cpal error callback once the device is gone
    device_lost: Arc<AtomicBool>,
    producer: RingProducer,
    decoder: AudioDecoder,
    resampler: StreamResampler,
    /// Output samples decoded but not yet accepted by the ring buffer
    backlog: Vec<f32>,
    source_done: bool,
}

impl OpenedOutput {
    fn open(
        request: &StreamRequest,
        buffer_size: Option<u32>,
        volume: Arc<Mutex<f32>>,
    ) -> Result<Self> {
        let device = find_cpal_device(&request.device)?;

        let mut decoder = AudioDecoder::open(&request.path)?;
        if !request.start.is_zero() {
            decoder.seek(request.start)?;
        }

        let (mut config, sample_format) = best_config(&device, decoder.sample_rate())?;
        if let Some(frames) = buffer_size {
            config.buffer_size = cpal::BufferSize::Fixed(frames);
        }

        debug!(
            "Stream config for '{}': sample_rate={}, channels={}, format={:?}",
            request.device.name, config.sample_rate.0, config.channels, sample_format
        );

        let resampler = StreamResampler::new(decoder.sample_rate(), config.sample_rate.0, 2)?;

        let rb = HeapRb::<f32>::new(RING_BUFFER_SIZE);
        let (producer, consumer) = rb.split();

        let device_lost = Arc::new(AtomicBool::new(false));
        let lost = Arc::clone(&device_lost);
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, consumer, volume, lost)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, consumer, volume, lost)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, consumer, volume, lost)?,
            format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    format
                )))
            }
        };

        // Some hosts start streams on creation
        if let Err(e) = stream.pause() {
            debug!("Pausing freshly built stream failed: {}", e);
        }

        Ok(Self {
            stream,
            device_lost,
            producer,
            decoder,
            resampler,
            backlog: Vec::new(),
            source_done: false,
        })
    }

    /// Move decoded audio into the ring buffer. Returns false once there is
    /// nothing left to feed.
    fn feed(&mut self) -> Result<bool> {
        if !self.backlog.is_empty() {
            let written = self.producer.push_slice(&self.backlog);
            self.backlog.drain(..written);
            return Ok(true);
        }
        if self.source_done {
            return Ok(false);
        }

        match self.decoder.decode_next()? {
            Some(samples) => {
                let stereo = to_stereo(&samples, self.decoder.channels());
                self.backlog = self.resampler.push(&stereo)?;
            }
            None => {
                self.backlog = self.resampler.flush()?;
                self.source_done = true;
            }
        }
        Ok(true)
    }

    fn drained(&self) -> bool {
        self.source_done && self.backlog.is_empty() && self.producer.occupied_len() == 0
    }
}

fn run_worker(
    request: StreamRequest,
    buffer_size: Option<u32>,
    volume: Arc<Mutex<f32>>,
    commands: Receiver<Command>,
    ready: SyncSender<Result<()>>,
    on_complete: CompletionCallback,
) {
    // Declared before the output so the device is released before completion
    let mut completion = CompletionGuard::new(on_complete);

    let mut output = match OpenedOutput::open(&request, buffer_size, volume) {
        Ok(output) => {
            let _ = ready.send(Ok(()));
            output
        }
        Err(e) => {
            completion.disarm();
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Opened but idle until the engine registers and starts us
    match commands.recv() {
        Ok(Command::Play) => {}
        Ok(Command::Stop) | Err(_) => {
            completion.disarm();
            return;
        }
    }
    if let Err(e) = output.stream.play() {
        error!("Failed to start stream on '{}': {}", request.device.name, e);
        return;
    }
    info!(
        "Playing {} on '{}'",
        request.path.display(),
        request.device.name
    );

    loop {
        match commands.try_recv() {
            Ok(Command::Stop) | Err(TryRecvError::Disconnected) => {
                debug!("Stream on '{}' stopped", request.device.name);
                completion.disarm();
                return;
            }
            Ok(Command::Play) | Err(TryRecvError::Empty) => {}
        }

        if output.device_lost.load(Ordering::SeqCst) {
            warn!(
                "Device '{}' went away while playing {}",
                request.device.name,
                request.path.display()
            );
            return;
        }

        match output.feed() {
            Ok(true) => {
                if output.producer.vacant_len() == 0 {
                    thread::sleep(FEED_INTERVAL);
                }
            }
            Ok(false) => {
                if output.drained() {
                    break;
                }
                thread::sleep(FEED_INTERVAL);
            }
            Err(e) => {
                // Treat a mid-stream decode failure as the end of the clip
                warn!(
                    "Decoding {} failed mid-stream: {}",
                    request.path.display(),
                    e
                );
                output.source_done = true;
                output.backlog.clear();
            }
        }
    }

    // Let the device play out what the callback already pulled
    thread::sleep(Duration::from_millis(50));
    drop(output);

    debug!("Stream on '{}' finished", request.device.name);
}

/// Errors after which the device will never consume another sample
fn is_device_lost(err: &StreamError) -> bool {
    matches!(err, StreamError::DeviceNotAvailable)
}

/// Prefer a stereo f32 config at the clip's own rate, falling back to the
/// device default.
fn best_config(device: &Device, source_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
    let mut supported = device
        .supported_output_configs()
        .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

    let preferred = supported.find(|config| {
        config.channels() == 2
            && config.min_sample_rate().0 <= source_rate
            && config.max_sample_rate().0 >= source_rate
            && config.sample_format() == SampleFormat::F32
    });

    if let Some(config) = preferred {
        let sample_format = config.sample_format();
        return Ok((
            config.with_sample_rate(cpal::SampleRate(source_rate)).config(),
            sample_format,
        ));
    }

    let config = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
    Ok((config.config(), config.sample_format()))
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: RingConsumer,
    volume: Arc<Mutex<f32>>,
    device_lost: Arc<AtomicBool>,
) -> Result<Stream> {
    let channels = config.channels as usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let vol = *volume.lock();

                for frame in data.chunks_mut(channels) {
                    let left = consumer.try_pop().unwrap_or(0.0) * vol;
                    let right = consumer.try_pop().unwrap_or(0.0) * vol;

                    if channels == 1 {
                        frame[0] = T::from_sample((left + right) * 0.5);
                        continue;
                    }
                    for (ch, sample) in frame.iter_mut().enumerate() {
                        let value = match ch {
                            0 => left,
                            1 => right,
                            _ => 0.0,
                        };
                        *sample = T::from_sample(value);
                    }
                }
            },
            move |err| {
                error!("Audio output error: {}", err);
                if is_device_lost(&err) {
                    device_lost.store(true, Ordering::SeqCst);
                }
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build output stream: {}", e)))?;

    Ok(stream)
}
