//! Device prober
//!
//! Answers "is there a microphone I can actually record from?" by opening a
//! short-lived test stream rather than trusting the permission state alone.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::device::{DeviceDescriptor, MicrophoneStatus};
use crate::domain::error::CaptureError;

use super::ports::{MediaDevices, MediaStream, StreamConstraints};
use super::status::classify;
use super::stream_guard::StreamGuard;

/// Queries input devices and tests whether they yield a live track
pub struct DeviceProber<M: MediaDevices> {
    media: Arc<M>,
}

impl<M: MediaDevices> Clone for DeviceProber<M> {
    fn clone(&self) -> Self {
        Self {
            media: Arc::clone(&self.media),
        }
    }
}

impl<M: MediaDevices> DeviceProber<M> {
    pub fn new(media: Arc<M>) -> Self {
        Self { media }
    }

    /// Check whether recording is possible right now.
    ///
    /// Never fails: every problem is reported through the returned status.
    /// The test stream is always released before returning.
    pub async fn probe(&self) -> MicrophoneStatus {
        if !self.media.is_supported() {
            info!("Media device API not supported");
            return MicrophoneStatus::unsupported();
        }

        let devices = match self.media.enumerate_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "Device enumeration failed");
                return MicrophoneStatus {
                    is_available: false,
                    has_devices: false,
                    has_permission: false,
                    error: Some(classify(&e)),
                };
            }
        };

        let inputs = devices.iter().filter(|d| d.is_audio_input()).count();
        if inputs == 0 {
            info!("No audio input devices found");
            return MicrophoneStatus::no_devices();
        }
        debug!(inputs, "Found audio input devices");

        let status = match self.media.open_stream(&StreamConstraints::probe()).await {
            Ok(stream) => {
                let guard = StreamGuard::new(stream);
                if has_usable_track(&guard) {
                    MicrophoneStatus::available()
                } else {
                    MicrophoneStatus::track_not_live()
                }
            }
            Err(e) => MicrophoneStatus::unavailable(classify(&e)),
        };

        match &status.error {
            None => debug!("Microphone available"),
            Some(e) => info!(code = e.code(), error = %e, "Microphone unavailable"),
        }
        status
    }

    /// List the audio inputs currently visible.
    ///
    /// Enumeration failures are logged and reported as an empty list.
    pub async fn list_devices(&self) -> Vec<DeviceDescriptor> {
        if !self.media.is_supported() {
            return Vec::new();
        }
        match self.media.enumerate_devices().await {
            Ok(devices) => devices.into_iter().filter(|d| d.is_audio_input()).collect(),
            Err(e) => {
                warn!(error = %e, "Error listing microphone devices");
                Vec::new()
            }
        }
    }

    /// Open a test stream on one device (or the default) and report whether
    /// it produced an enabled, live track.
    pub async fn test_device(&self, device_id: Option<&str>) -> bool {
        if !self.media.is_supported() {
            return false;
        }
        match self
            .media
            .open_stream(&StreamConstraints::exact_device(device_id))
            .await
        {
            Ok(stream) => has_usable_track(&StreamGuard::new(stream)),
            Err(e) => {
                let kind: CaptureError = classify(&e);
                warn!(device = ?device_id, code = kind.code(), error = %e, "Error testing microphone device");
                false
            }
        }
    }
}

fn has_usable_track<S: MediaStream>(guard: &StreamGuard<S>) -> bool {
    guard.stream().tracks().iter().any(|t| t.is_usable())
}
