//! Capture session
//!
//! Owns one recording attempt at a time: acquire a stream, run the encoder,
//! accumulate chunks, finalize them into an [`AudioArtifact`] and release
//! every OS handle on the way out.

use std::mem;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, Weak};

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::domain::config::{DEFAULT_BITRATE, DEFAULT_SAMPLE_RATE};
use crate::domain::device::{DeviceDescriptor, MicrophoneStatus};
use crate::domain::error::CaptureError;
use crate::domain::recording::{AudioArtifact, AudioMimeType, Duration};
use crate::domain::session::{CaptureState, SessionMachine};

use super::ports::{
    MediaDevices, MediaStream, RecorderEvent, RecorderEvents, RecorderOptions, StreamConstraints,
};
use super::prober::DeviceProber;
use super::stream_guard::StreamGuard;

/// Settings for a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Device to record from; `None` uses the platform default
    pub device_id: Option<String>,
    /// Ideal sample rate requested from the device
    pub sample_rate: u32,
    /// Encoder chunk cadence
    pub timeslice: Duration,
    pub bitrate: u32,
    pub mime_type: AudioMimeType,
    /// How long `stop` waits for the encoder's final chunk
    pub flush_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            timeslice: Duration::default_timeslice(),
            bitrate: DEFAULT_BITRATE,
            mime_type: AudioMimeType::default(),
            flush_timeout: Duration::default_flush_timeout(),
        }
    }
}

impl CaptureConfig {
    fn recorder_options(&self) -> RecorderOptions {
        RecorderOptions {
            mime_type: self.mime_type,
            timeslice: self.timeslice,
            bitrate: self.bitrate,
        }
    }
}

type FlushResult = Result<(), CaptureError>;

struct SessionInner<S: MediaStream> {
    machine: SessionMachine,
    /// Bumped by every start and reset; in-flight work from an older
    /// generation is discarded.
    generation: u64,
    stream: Option<StreamGuard<S>>,
    chunks: Vec<Vec<u8>>,
    started_at: Option<Instant>,
    pump: Option<JoinHandle<()>>,
    flush_waiter: Option<oneshot::Sender<FlushResult>>,
    pending_error: Option<CaptureError>,
    last_status: Option<MicrophoneStatus>,
    state_tx: watch::Sender<CaptureState>,
}

impl<S: MediaStream> SessionInner<S> {
    fn publish(&self) {
        self.state_tx.send_replace(self.machine.state());
    }

    /// Drop everything the current attempt holds and go back to idle.
    fn abandon(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.chunks.clear();
        self.started_at = None;
        self.flush_waiter = None;
        self.machine.reset();
        self.publish();
    }

    /// Tear down after a track or encoder failure and hand the error to
    /// whoever awaits the session next.
    fn fail_hard(&mut self, error: CaptureError) {
        warn!(state = %self.machine.state(), error = %error, "Recording failed, releasing stream");
        let waiter = self.flush_waiter.take();
        let discarded = self.chunks.len();
        self.abandon();
        if discarded > 0 {
            debug!(discarded, "Discarded buffered chunks");
        }
        match waiter {
            Some(tx) => {
                if let Err(Err(error)) = tx.send(Err(error)) {
                    self.pending_error = Some(error);
                }
            }
            None => self.pending_error = Some(error),
        }
    }
}

fn lock<S: MediaStream>(inner: &StdMutex<SessionInner<S>>) -> MutexGuard<'_, SessionInner<S>> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

/// One recording slot. At most one attempt is active at a time.
pub struct CaptureSession<M: MediaDevices> {
    media: Arc<M>,
    prober: DeviceProber<M>,
    config: CaptureConfig,
    inner: Arc<StdMutex<SessionInner<M::Stream>>>,
    state_rx: watch::Receiver<CaptureState>,
}

impl<M: MediaDevices> CaptureSession<M> {
    pub fn new(media: Arc<M>, config: CaptureConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(CaptureState::Idle);
        Self {
            prober: DeviceProber::new(Arc::clone(&media)),
            media,
            config,
            inner: Arc::new(StdMutex::new(SessionInner {
                machine: SessionMachine::new(),
                generation: 0,
                stream: None,
                chunks: Vec::new(),
                started_at: None,
                pump: None,
                flush_waiter: None,
                pending_error: None,
                last_status: None,
                state_tx,
            })),
            state_rx,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn state(&self) -> CaptureState {
        lock(&self.inner).machine.state()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == CaptureState::Recording
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.state_rx.clone()
    }

    /// Status recorded by the most recent probe, if any
    pub fn microphone_status(&self) -> Option<MicrophoneStatus> {
        lock(&self.inner).last_status.clone()
    }

    /// Take the error left behind by a failure no caller was waiting on
    pub fn take_pending_error(&self) -> Option<CaptureError> {
        lock(&self.inner).pending_error.take()
    }

    /// Probe the microphone and remember the result, unless `reset` ran
    /// while the probe was in flight.
    pub async fn probe_microphone(&self) -> MicrophoneStatus {
        let generation = lock(&self.inner).generation;
        let status = self.prober.probe().await;
        let mut inner = lock(&self.inner);
        if inner.generation == generation {
            inner.last_status = Some(status.clone());
        }
        status
    }

    pub async fn list_devices(&self) -> Vec<DeviceDescriptor> {
        self.prober.list_devices().await
    }

    pub async fn test_device(&self, device_id: Option<&str>) -> bool {
        self.prober.test_device(device_id).await
    }

    /// Acquire the microphone and begin recording.
    ///
    /// Fails with [`CaptureError::InvalidStateTransition`] unless idle, and
    /// with [`CaptureError::Cancelled`] if `reset` ran while acquiring. No
    /// stream is held after any failure.
    pub async fn start(&self) -> Result<(), CaptureError> {
        let generation = {
            let mut inner = lock(&self.inner);
            inner.machine.begin_acquire()?;
            inner.generation += 1;
            inner.pending_error = None;
            inner.chunks.clear();
            inner.publish();
            inner.generation
        };
        info!(device = ?self.config.device_id, "Acquiring microphone");

        match self.acquire(generation).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut inner = lock(&self.inner);
                if inner.generation == generation && !inner.machine.is_idle() {
                    inner.abandon();
                }
                info!(code = e.code(), error = %e, "Failed to start recording");
                Err(e)
            }
        }
    }

    async fn acquire(&self, generation: u64) -> Result<(), CaptureError> {
        let status = self.prober.probe().await;
        {
            let mut inner = lock(&self.inner);
            if inner.generation != generation {
                return Err(CaptureError::Cancelled);
            }
            inner.last_status = Some(status.clone());
        }
        status.into_result()?;

        let constraints =
            StreamConstraints::recording(self.config.device_id.clone(), self.config.sample_rate);
        let mut guard = StreamGuard::new(self.media.open_stream(&constraints).await?);

        if !guard.stream().tracks().iter().any(|t| t.enabled) {
            return Err(CaptureError::DeviceUnreadable(
                "No active audio tracks available".to_string(),
            ));
        }

        // Superseded while the stream was opening: the guard releases it
        if lock(&self.inner).generation != generation {
            return Err(CaptureError::Cancelled);
        }

        let events = guard
            .stream_mut()
            .start_recorder(&self.config.recorder_options())?;

        let mut inner = lock(&self.inner);
        if inner.generation != generation {
            return Err(CaptureError::Cancelled);
        }
        inner.machine.complete_acquire()?;
        inner.stream = Some(guard);
        inner.started_at = Some(Instant::now());
        inner.pump = Some(tokio::spawn(pump_events(
            Arc::downgrade(&self.inner),
            generation,
            events,
        )));
        inner.publish();
        info!(mime = %self.config.mime_type, "Recording started");
        Ok(())
    }

    /// Flush the encoder and return the finished recording.
    ///
    /// Fails unless recording. A failure that happened while nobody was
    /// waiting is returned here first.
    pub async fn stop(&self) -> Result<AudioArtifact, CaptureError> {
        let (generation, rx) = {
            let mut inner = lock(&self.inner);
            if let Some(error) = inner.pending_error.take() {
                return Err(error);
            }
            inner.machine.begin_stop()?;
            inner.publish();

            let (tx, rx) = oneshot::channel();
            inner.flush_waiter = Some(tx);
            let requested = match inner.stream.as_mut() {
                Some(guard) => guard.stream_mut().request_stop(),
                None => Ok(()),
            };
            if let Err(e) = requested {
                warn!(error = %e, "Failed to request encoder stop");
                inner.abandon();
                return Err(e.into());
            }
            (inner.generation, rx)
        };
        debug!("Waiting for final chunk");

        let outcome = tokio::time::timeout(self.config.flush_timeout.as_std(), rx).await;

        let mut inner = lock(&self.inner);
        if inner.generation != generation {
            return Err(CaptureError::Cancelled);
        }
        match outcome {
            Ok(Ok(Ok(()))) => {}
            // Already torn down by the event pump
            Ok(Ok(Err(error))) => return Err(error),
            Ok(Err(_)) => {
                inner.abandon();
                return Err(CaptureError::DeviceUnreadable(
                    "Recorder closed before delivering the final chunk".to_string(),
                ));
            }
            Err(_) => {
                warn!(timeout = %self.config.flush_timeout, "Timed out waiting for final chunk");
                inner.abandon();
                return Err(CaptureError::DeviceUnreadable(
                    "Timed out waiting for the final audio chunk".to_string(),
                ));
            }
        }

        inner.machine.begin_finalize()?;
        inner.publish();

        let chunks = mem::take(&mut inner.chunks);
        let duration = inner
            .started_at
            .take()
            .map(|started| started.elapsed())
            .unwrap_or_default();
        if let Some(mut stream) = inner.stream.take() {
            stream.release();
        }
        inner.pump = None;
        inner.machine.complete()?;
        inner.publish();

        let chunk_count = chunks.len();
        let artifact = AudioArtifact::from_chunks(chunks, self.config.mime_type, duration)
            .ok_or(CaptureError::NoAudioCaptured)?;
        info!(
            chunks = chunk_count,
            bytes = artifact.size_bytes(),
            secs = artifact.duration_secs(),
            "Recording finalized"
        );
        Ok(artifact)
    }

    /// Force the session back to idle from any state.
    ///
    /// Releases the stream, drops buffered chunks, forgets the last
    /// microphone status and cancels any in-flight `start` or `stop`.
    /// Never fails and may be called repeatedly.
    pub fn reset(&self) {
        let mut inner = lock(&self.inner);
        let previous = inner.machine.state();
        inner.generation += 1;
        inner.abandon();
        inner.pending_error = None;
        inner.last_status = None;
        if previous.is_active() {
            info!(from = %previous, "Session reset");
        }
    }
}

/// Apply recorder events to the session that spawned this pump.
async fn pump_events<S: MediaStream>(
    session: Weak<StdMutex<SessionInner<S>>>,
    generation: u64,
    mut events: RecorderEvents,
) {
    while let Some(event) = events.recv().await {
        let Some(shared) = session.upgrade() else {
            return;
        };
        let mut inner = lock(&shared);
        if inner.generation != generation {
            return;
        }
        match event {
            RecorderEvent::Chunk(data) => {
                if data.is_empty() {
                    trace!("Skipping empty chunk");
                    continue;
                }
                if matches!(
                    inner.machine.state(),
                    CaptureState::Recording | CaptureState::Stopping
                ) {
                    trace!(bytes = data.len(), "Chunk received");
                    inner.chunks.push(data);
                }
            }
            RecorderEvent::FatalError(e) => {
                inner.fail_hard(CaptureError::DeviceUnreadable(e.message));
                return;
            }
            RecorderEvent::Finalized => {
                if inner.machine.state() == CaptureState::Stopping {
                    if let Some(tx) = inner.flush_waiter.take() {
                        let _ = tx.send(Ok(()));
                    }
                } else {
                    inner.fail_hard(CaptureError::DeviceUnreadable(
                        "Recorder stopped unexpectedly".to_string(),
                    ));
                }
                return;
            }
        }
    }

    if let Some(shared) = session.upgrade() {
        let mut inner = lock(&shared);
        if inner.generation == generation && inner.machine.state().is_active() {
            inner.fail_hard(CaptureError::DeviceUnreadable(
                "Recorder event stream closed".to_string(),
            ));
        }
    }
}
