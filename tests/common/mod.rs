//! Scripted media devices for library integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use smart_memo::application::ports::{
    MediaDevices, MediaStream, PlatformError, PlatformErrorName, RecorderEvent, RecorderEvents,
    RecorderOptions, StreamConstraints, TrackInfo, TrackReadyState,
};
use smart_memo::domain::device::DeviceDescriptor;

/// Shared script and counters behind every stream a [`MockMedia`] opens
#[derive(Default)]
pub struct MockState {
    pub opened: AtomicUsize,
    pub stopped: AtomicUsize,
    pub recorders_started: AtomicUsize,
    pub tracks_dead: AtomicBool,
    pub last_constraints: Mutex<Option<StreamConstraints>>,
    recorders: Mutex<Vec<mpsc::UnboundedSender<RecorderEvent>>>,
}

impl MockState {
    /// Streams whose tracks are still running
    pub fn live_streams(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.stopped.load(Ordering::SeqCst)
    }

    fn send(&self, event: RecorderEvent) {
        if let Some(tx) = self.recorders.lock().unwrap().last() {
            let _ = tx.send(event);
        }
    }
}

/// Media API whose behavior is fixed up front
pub struct MockMedia {
    pub state: Arc<MockState>,
    pub supported: bool,
    pub devices: Result<Vec<DeviceDescriptor>, PlatformError>,
    /// Error for every open
    pub open_error: Option<PlatformError>,
    /// Error only for recording opens (processing enabled)
    pub recording_open_error: Option<PlatformError>,
    pub recorder_error: Option<PlatformError>,
    /// Tracks come back disabled
    pub disabled_tracks: bool,
    pub open_delay: Option<Duration>,
    /// Send the final chunk and `Finalized` when asked to stop
    pub finalize_on_stop: bool,
    pub final_chunk: Vec<u8>,
}

impl MockMedia {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            supported: true,
            devices: Ok(vec![DeviceDescriptor::audio_input("mic-1", "Built-in Microphone")]),
            open_error: None,
            recording_open_error: None,
            recorder_error: None,
            disabled_tracks: false,
            open_delay: None,
            finalize_on_stop: true,
            final_chunk: Vec::new(),
        }
    }

    pub fn with_devices(mut self, devices: Vec<DeviceDescriptor>) -> Self {
        self.devices = Ok(devices);
        self
    }

    pub fn with_open_error(mut self, name: PlatformErrorName, message: &str) -> Self {
        self.open_error = Some(PlatformError::new(name, message));
        self
    }

    pub fn with_recording_open_error(mut self, name: PlatformErrorName, message: &str) -> Self {
        self.recording_open_error = Some(PlatformError::new(name, message));
        self
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }

    /// Emit one encoded chunk from the active recorder
    pub fn emit_chunk(&self, data: &[u8]) {
        self.state.send(RecorderEvent::Chunk(data.to_vec()));
    }

    /// Device disappears: tracks end and the recorder reports it
    pub fn kill_track(&self) {
        self.state.tracks_dead.store(true, Ordering::SeqCst);
        self.state.send(RecorderEvent::FatalError(PlatformError::new(
            PlatformErrorName::NotReadable,
            "audio track ended",
        )));
    }
}

#[async_trait]
impl MediaDevices for MockMedia {
    type Stream = MockStream;

    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, PlatformError> {
        self.devices.clone()
    }

    async fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Self::Stream, PlatformError> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        *self.state.last_constraints.lock().unwrap() = Some(constraints.clone());

        if let Some(error) = &self.open_error {
            return Err(error.clone());
        }
        if constraints.processing.any_enabled() {
            if let Some(error) = &self.recording_open_error {
                return Err(error.clone());
            }
        }

        self.state.opened.fetch_add(1, Ordering::SeqCst);
        self.state.tracks_dead.store(false, Ordering::SeqCst);
        Ok(MockStream {
            state: Arc::clone(&self.state),
            enabled: !self.disabled_tracks,
            recorder_error: self.recorder_error.clone(),
            finalize_on_stop: self.finalize_on_stop,
            final_chunk: self.final_chunk.clone(),
            events: None,
            stopped: false,
        })
    }
}

/// Stream handed out by [`MockMedia`]. Dropping it does not stop its
/// tracks, so a missed release shows up in the counters.
pub struct MockStream {
    state: Arc<MockState>,
    enabled: bool,
    recorder_error: Option<PlatformError>,
    finalize_on_stop: bool,
    final_chunk: Vec<u8>,
    events: Option<mpsc::UnboundedSender<RecorderEvent>>,
    stopped: bool,
}

impl MediaStream for MockStream {
    fn tracks(&self) -> Vec<TrackInfo> {
        let ready_state = if self.stopped || self.state.tracks_dead.load(Ordering::SeqCst) {
            TrackReadyState::Ended
        } else {
            TrackReadyState::Live
        };
        vec![TrackInfo {
            label: "Built-in Microphone".to_string(),
            enabled: self.enabled,
            ready_state,
        }]
    }

    fn start_recorder(&mut self, _options: &RecorderOptions) -> Result<RecorderEvents, PlatformError> {
        if let Some(error) = &self.recorder_error {
            return Err(error.clone());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.recorders.lock().unwrap().push(tx.clone());
        self.state.recorders_started.fetch_add(1, Ordering::SeqCst);
        self.events = Some(tx);
        Ok(rx)
    }

    fn request_stop(&mut self) -> Result<(), PlatformError> {
        if !self.finalize_on_stop {
            return Ok(());
        }
        if let Some(tx) = &self.events {
            let _ = tx.send(RecorderEvent::Chunk(self.final_chunk.clone()));
            let _ = tx.send(RecorderEvent::Finalized);
        }
        Ok(())
    }

    fn stop_tracks(&mut self) -> Result<(), PlatformError> {
        if !self.stopped {
            self.stopped = true;
            self.state.stopped.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Input devices used across tests
pub fn two_microphones() -> Vec<DeviceDescriptor> {
    vec![
        DeviceDescriptor::audio_input("mic-1", "Built-in Microphone"),
        DeviceDescriptor::audio_input("mic-2", "USB Headset"),
    ]
}
