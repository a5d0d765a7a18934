//! Session controller use case
//!
//! Front door for UI callers: serializes start/stop, keeps the elapsed
//! clock, and makes sure nothing is left running on any exit path.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::domain::device::{DeviceDescriptor, MicrophoneStatus};
use crate::domain::error::CaptureError;
use crate::domain::recording::{self, AudioArtifact};
use crate::domain::session::{CaptureState, InvalidStateTransition};

use super::capture::CaptureSession;
use super::ports::MediaDevices;
use super::timer::ElapsedTimer;

/// Coarse recorder state exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
}

impl RecorderState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Recording => "recording",
        }
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Serialized control surface over one [`CaptureSession`]
pub struct SessionController<M: MediaDevices> {
    session: Arc<CaptureSession<M>>,
    op_lock: Mutex<()>,
    timer: StdMutex<Option<ElapsedTimer>>,
    elapsed: Arc<AtomicU64>,
}

impl<M: MediaDevices> SessionController<M> {
    pub fn new(session: Arc<CaptureSession<M>>) -> Self {
        Self {
            session,
            op_lock: Mutex::new(()),
            timer: StdMutex::new(None),
            elapsed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn session(&self) -> &Arc<CaptureSession<M>> {
        &self.session
    }

    /// Start a new recording.
    ///
    /// The elapsed clock restarts from zero and only runs once the session
    /// reaches `Recording`. Errors are returned unchanged.
    pub async fn start_recording(&self) -> Result<(), CaptureError> {
        let _op = self.op_lock.lock().await;

        let state = self.session.state();
        if state.is_active() {
            return Err(InvalidStateTransition::new(state, "start recording").into());
        }

        self.clear_timer();
        self.elapsed.store(0, Ordering::SeqCst);

        match self.session.start().await {
            Ok(()) => {
                self.start_timer();
                Ok(())
            }
            Err(e) => {
                self.clear_timer();
                Err(e)
            }
        }
    }

    /// Stop the current recording and return its artifact.
    ///
    /// Returns `Ok(None)` when nothing was recording. A call made while a
    /// start is in flight waits for it to settle first.
    pub async fn stop_recording(&self) -> Result<Option<AudioArtifact>, CaptureError> {
        let _op = self.op_lock.lock().await;
        self.clear_timer();

        if let Some(error) = self.session.take_pending_error() {
            return Err(error);
        }
        if !self.session.is_recording() {
            warn!(state = %self.session.state(), "Stop requested while not recording");
            return Ok(None);
        }

        self.session.stop().await.map(Some)
    }

    /// Abandon whatever is in progress and return to idle. Never fails.
    pub fn reset(&self) {
        self.clear_timer();
        self.session.reset();
        self.elapsed.store(0, Ordering::SeqCst);
        debug!("Controller reset");
    }

    /// Probe the microphone and remember the result.
    pub async fn check_microphone(&self) -> MicrophoneStatus {
        self.session.probe_microphone().await
    }

    /// Status from the most recent probe
    pub fn microphone_status(&self) -> Option<MicrophoneStatus> {
        self.session.microphone_status()
    }

    pub async fn list_devices(&self) -> Vec<DeviceDescriptor> {
        self.session.list_devices().await
    }

    pub async fn test_device(&self, device_id: Option<&str>) -> bool {
        self.session.test_device(device_id).await
    }

    pub fn recording_state(&self) -> RecorderState {
        if self.session.is_recording() {
            RecorderState::Recording
        } else {
            RecorderState::Inactive
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    pub fn state(&self) -> CaptureState {
        self.session.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.session.subscribe()
    }

    /// Whole seconds recorded in the current (or last) session
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed.load(Ordering::SeqCst)
    }

    /// Elapsed time as `MM:SS`
    pub fn formatted_elapsed(&self) -> String {
        recording::format_elapsed(self.elapsed_seconds())
    }

    /// Format whole seconds as `MM:SS`
    pub fn format_elapsed(seconds: u64) -> String {
        recording::format_elapsed(seconds)
    }

    fn start_timer(&self) {
        let timer = ElapsedTimer::spawn(Arc::clone(&self.elapsed), self.session.subscribe());
        let previous = self
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(timer);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    fn clear_timer(&self) {
        let timer = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(timer) = timer {
            timer.cancel();
        }
    }
}

impl<M: MediaDevices> Drop for SessionController<M> {
    fn drop(&mut self) {
        self.reset();
    }
}
