//! Media device adapter using cpal
//!
//! cpal streams are not `Send`, so each opened stream lives on its own
//! capture thread. The async side talks to it through a command channel and
//! receives encoded chunks as [`RecorderEvent`]s.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig, SupportedStreamConfig};
use tokio::sync::{mpsc as async_mpsc, oneshot};
use tracing::{debug, info, warn};

use super::encoder::EncodingError;
use super::segment::SegmentRecorder;
use crate::application::ports::{
    MediaDevices, MediaStream, PlatformError, PlatformErrorName, RecorderEvent, RecorderEvents,
    RecorderOptions, StreamConstraints, TrackInfo, TrackReadyState,
};
use crate::domain::device::{DeviceDescriptor, DeviceKind};
use crate::domain::recording::AudioMimeType;

/// How often the capture thread wakes to drain audio and cut segments
const POLL_INTERVAL: Duration = Duration::from_millis(20);

const THREAD_NAME: &str = "memo-capture";

/// Media devices backed by the default cpal host
#[derive(Debug, Default, Clone)]
pub struct CpalMediaDevices;

impl CpalMediaDevices {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaDevices for CpalMediaDevices {
    type Stream = CpalStream;

    fn is_supported(&self) -> bool {
        !cpal::available_hosts().is_empty()
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, PlatformError> {
        tokio::task::spawn_blocking(enumerate_blocking)
            .await
            .map_err(|e| {
                PlatformError::new(PlatformErrorName::Unknown, format!("Task join error: {}", e))
            })?
    }

    async fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<CpalStream, PlatformError> {
        if constraints.processing.any_enabled() {
            debug!(
                processing = ?constraints.processing,
                "Host does not expose input processing controls, ignoring"
            );
        }

        let constraints = constraints.clone();
        let flags = Arc::new(TrackFlags::new());
        let (ready_tx, ready_rx) = oneshot::channel();
        let (command_tx, command_rx) = mpsc::channel();

        let thread_flags = Arc::clone(&flags);
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run_capture(constraints, ready_tx, command_rx, thread_flags))
            .map_err(|e| {
                PlatformError::new(
                    PlatformErrorName::Unknown,
                    format!("Failed to spawn capture thread: {}", e),
                )
            })?;

        let label = match ready_rx.await {
            Ok(Ok(label)) => label,
            Ok(Err(e)) => {
                reap(thread);
                return Err(e);
            }
            Err(_) => {
                reap(thread);
                return Err(PlatformError::new(
                    PlatformErrorName::Aborted,
                    "Capture thread exited before the stream opened",
                ));
            }
        };
        info!(device = %label, "Opened input stream");

        Ok(CpalStream {
            label,
            flags,
            commands: command_tx,
            thread: Some(thread),
            released: false,
        })
    }
}

fn enumerate_blocking() -> Result<Vec<DeviceDescriptor>, PlatformError> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let inputs = host
        .input_devices()
        .map_err(|e| backend_error(e.to_string()))?;
    for device in inputs {
        match device.name() {
            Ok(name) => devices.push(DeviceDescriptor::audio_input(name.clone(), name)),
            Err(e) => debug!(error = %e, "Skipping input device without a name"),
        }
    }

    match host.output_devices() {
        Ok(outputs) => {
            for device in outputs {
                if let Ok(name) = device.name() {
                    devices.push(DeviceDescriptor {
                        id: name.clone(),
                        label: name,
                        kind: DeviceKind::AudioOutput,
                    });
                }
            }
        }
        Err(e) => debug!(error = %e, "Output device enumeration failed"),
    }

    Ok(devices)
}

/// Track state shared between the capture thread and the stream handle
#[derive(Debug)]
struct TrackFlags {
    live: AtomicBool,
    error: StdMutex<Option<String>>,
}

impl TrackFlags {
    fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            error: StdMutex::new(None),
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn end(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn fail(&self, message: String) {
        *self.error.lock().unwrap_or_else(|e| e.into_inner()) = Some(message);
        self.end();
    }

    fn error(&self) -> Option<String> {
        self.error.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

enum Command {
    StartRecorder {
        options: RecorderOptions,
        events: async_mpsc::UnboundedSender<RecorderEvent>,
    },
    RequestStop,
    Release,
}

/// Handle to a stream owned by a capture thread
pub struct CpalStream {
    label: String,
    flags: Arc<TrackFlags>,
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
    released: bool,
}

impl CpalStream {
    fn send(&self, command: Command) -> Result<(), PlatformError> {
        self.commands.send(command).map_err(|_| {
            PlatformError::new(
                PlatformErrorName::InvalidState,
                "Capture thread is no longer running",
            )
        })
    }
}

impl MediaStream for CpalStream {
    fn tracks(&self) -> Vec<TrackInfo> {
        let ready_state = if !self.released && self.flags.is_live() {
            TrackReadyState::Live
        } else {
            TrackReadyState::Ended
        };
        vec![TrackInfo {
            label: self.label.clone(),
            enabled: true,
            ready_state,
        }]
    }

    fn start_recorder(&mut self, options: &RecorderOptions) -> Result<RecorderEvents, PlatformError> {
        if options.mime_type != AudioMimeType::OggOpus {
            return Err(PlatformError::new(
                PlatformErrorName::NotSupported,
                format!("{} is not supported by this recorder", options.mime_type),
            ));
        }
        let (events_tx, events_rx) = async_mpsc::unbounded_channel();
        self.send(Command::StartRecorder {
            options: options.clone(),
            events: events_tx,
        })?;
        Ok(events_rx)
    }

    fn request_stop(&mut self) -> Result<(), PlatformError> {
        self.send(Command::RequestStop)
    }

    fn stop_tracks(&mut self) -> Result<(), PlatformError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.flags.end();
        // The thread may already be gone after a fatal error
        let _ = self.commands.send(Command::Release);
        if let Some(thread) = self.thread.take() {
            reap(thread);
        }
        debug!(device = %self.label, "Input stream released");
        Ok(())
    }
}

/// Collect a capture thread without blocking the caller, which may be an
/// async worker holding the session lock. The thread exits on its next poll
/// once it sees `Release` or a closed channel.
fn reap(thread: JoinHandle<()>) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn_blocking(move || {
                if thread.join().is_err() {
                    warn!("Capture thread panicked");
                }
            });
        }
        Err(_) => drop(thread),
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        if let Err(e) = self.stop_tracks() {
            warn!(error = %e, "Failed to close input stream");
        }
    }
}

struct ActiveRecorder {
    segments: SegmentRecorder,
    events: async_mpsc::UnboundedSender<RecorderEvent>,
}

impl ActiveRecorder {
    fn emit(&self, event: RecorderEvent) {
        // Receiver gone means the session no longer cares
        let _ = self.events.send(event);
    }

    fn fail(self, error: PlatformError) {
        self.emit(RecorderEvent::FatalError(error));
    }
}

/// Body of the capture thread: owns the cpal stream for its whole life.
fn run_capture(
    constraints: StreamConstraints,
    ready: oneshot::Sender<Result<String, PlatformError>>,
    commands: Receiver<Command>,
    flags: Arc<TrackFlags>,
) {
    let (pcm_tx, pcm_rx) = mpsc::channel::<Vec<f32>>();
    let (stream, label, sample_rate) = match open_device_stream(&constraints, pcm_tx, &flags) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(label)).is_err() {
        return;
    }

    let mut recorder: Option<ActiveRecorder> = None;
    loop {
        let command = commands.recv_timeout(POLL_INTERVAL);

        while let Ok(samples) = pcm_rx.try_recv() {
            if let Some(active) = recorder.as_mut() {
                if let Err(e) = active.segments.push(&samples) {
                    if let Some(active) = recorder.take() {
                        active.fail(encoding_error(e));
                    }
                }
            }
        }

        match command {
            Ok(Command::StartRecorder { options, events }) => {
                match SegmentRecorder::new(sample_rate, options.bitrate, options.timeslice.as_std())
                {
                    Ok(segments) => {
                        debug!(sample_rate, bitrate = options.bitrate, "Recorder started");
                        recorder = Some(ActiveRecorder { segments, events });
                    }
                    Err(e) => {
                        let _ = events.send(RecorderEvent::FatalError(encoding_error(e)));
                    }
                }
            }
            Ok(Command::RequestStop) => {
                if let Some(active) = recorder.take() {
                    let ActiveRecorder { segments, events } = active;
                    match segments.finish() {
                        Ok(last) => {
                            let _ = events.send(RecorderEvent::Chunk(last));
                            let _ = events.send(RecorderEvent::Finalized);
                        }
                        Err(e) => {
                            let _ = events.send(RecorderEvent::FatalError(encoding_error(e)));
                        }
                    }
                }
            }
            Ok(Command::Release) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        if !flags.is_live() {
            if let Some(active) = recorder.take() {
                let message = flags
                    .error()
                    .unwrap_or_else(|| "Audio track ended".to_string());
                active.fail(PlatformError::new(PlatformErrorName::NotReadable, message));
            }
        }

        if let Some(active) = recorder.as_mut() {
            if active.segments.segment_due(Instant::now()) {
                match active.segments.take_segment() {
                    Ok(chunk) => active.emit(RecorderEvent::Chunk(chunk)),
                    Err(e) => {
                        if let Some(active) = recorder.take() {
                            active.fail(encoding_error(e));
                        }
                    }
                }
            }
        }
    }

    flags.end();
    drop(stream);
}

fn open_device_stream(
    constraints: &StreamConstraints,
    pcm_tx: Sender<Vec<f32>>,
    flags: &Arc<TrackFlags>,
) -> Result<(cpal::Stream, String, u32), PlatformError> {
    let host = cpal::default_host();
    let device = select_device(&host, constraints.device_id.as_deref())?;
    let label = device
        .name()
        .unwrap_or_else(|_| "Unknown device".to_string());

    let supported = choose_config(&device, constraints.sample_rate)?;
    let sample_rate = supported.sample_rate().0;
    let stream = build_stream(&device, &supported, pcm_tx, Arc::clone(flags))?;
    stream.play().map_err(map_play_error)?;

    debug!(
        device = %label,
        sample_rate,
        channels = supported.channels(),
        format = ?supported.sample_format(),
        "Input stream playing"
    );
    Ok((stream, label, sample_rate))
}

fn select_device(host: &cpal::Host, device_id: Option<&str>) -> Result<cpal::Device, PlatformError> {
    match device_id {
        None => host.default_input_device().ok_or_else(|| {
            PlatformError::new(PlatformErrorName::NotFound, "No default input device")
        }),
        Some(id) => host
            .input_devices()
            .map_err(|e| backend_error(e.to_string()))?
            .find(|device| device.name().map(|name| name == id).unwrap_or(false))
            .ok_or_else(|| {
                PlatformError::new(
                    PlatformErrorName::NotFound,
                    format!("No input device named '{}'", id),
                )
            }),
    }
}

/// Use the requested rate when the device supports it, the device default
/// otherwise.
fn choose_config(
    device: &cpal::Device,
    ideal_rate: Option<u32>,
) -> Result<SupportedStreamConfig, PlatformError> {
    if let Some(rate) = ideal_rate {
        if let Ok(configs) = device.supported_input_configs() {
            let best = configs
                .filter(|c| {
                    matches!(
                        c.sample_format(),
                        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
                    )
                })
                .filter(|c| c.min_sample_rate().0 <= rate && rate <= c.max_sample_rate().0)
                .min_by_key(|c| c.channels());
            if let Some(range) = best {
                return Ok(range.with_sample_rate(SampleRate(rate)));
            }
        }
        debug!(rate, "Requested sample rate unavailable, using device default");
    }

    device.default_input_config().map_err(|e| {
        let message = e.to_string();
        match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                PlatformError::new(PlatformErrorName::NotFound, message)
            }
            cpal::DefaultStreamConfigError::StreamTypeNotSupported => {
                PlatformError::new(PlatformErrorName::NotReadable, message)
            }
            _ => backend_error(message),
        }
    })
}

fn build_stream(
    device: &cpal::Device,
    supported: &SupportedStreamConfig,
    pcm_tx: Sender<Vec<f32>>,
    flags: Arc<TrackFlags>,
) -> Result<cpal::Stream, PlatformError> {
    let channels = usize::from(supported.channels().max(1));
    let config: StreamConfig = supported.config();
    let on_error = move |err: cpal::StreamError| {
        warn!(error = %err, "Input stream error");
        flags.fail(err.to_string());
    };

    let stream = match supported.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = pcm_tx.send(downmix(data, channels, |s| s));
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let _ = pcm_tx.send(downmix(data, channels, |s| f32::from(s) / 32_768.0));
            },
            on_error,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let _ = pcm_tx.send(downmix(data, channels, |s| {
                    (f32::from(s) - 32_768.0) / 32_768.0
                }));
            },
            on_error,
            None,
        ),
        other => {
            return Err(PlatformError::new(
                PlatformErrorName::NotSupported,
                format!("Unsupported sample format: {:?}", other),
            ))
        }
    };

    stream.map_err(|e| {
        let message = e.to_string();
        match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                PlatformError::new(PlatformErrorName::NotFound, message)
            }
            cpal::BuildStreamError::StreamConfigNotSupported
            | cpal::BuildStreamError::InvalidArgument => {
                PlatformError::new(PlatformErrorName::Overconstrained, message)
            }
            _ => backend_error(message),
        }
    })
}

fn map_play_error(e: cpal::PlayStreamError) -> PlatformError {
    let message = e.to_string();
    match e {
        cpal::PlayStreamError::DeviceNotAvailable => {
            PlatformError::new(PlatformErrorName::NotFound, message)
        }
        _ => backend_error(message),
    }
}

/// Average interleaved frames down to mono f32
fn downmix<T: Copy>(data: &[T], channels: usize, convert: impl Fn(T) -> f32) -> Vec<f32> {
    data.chunks(channels)
        .map(|frame| frame.iter().map(|&s| convert(s)).sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Backend errors only carry text; permission failures are recognised by
/// their wording, everything else is treated as an unreadable device.
fn backend_error(message: String) -> PlatformError {
    let lower = message.to_lowercase();
    let name = if lower.contains("permission")
        || lower.contains("not permitted")
        || lower.contains("access denied")
    {
        PlatformErrorName::NotAllowed
    } else {
        PlatformErrorName::NotReadable
    };
    PlatformError::new(name, message)
}

fn encoding_error(e: EncodingError) -> PlatformError {
    PlatformError::new(PlatformErrorName::Encoding, e.to_string())
}
