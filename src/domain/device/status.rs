//! Microphone availability snapshot

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::domain::error::CaptureError;

/// Result of one probe. Built fresh per probe and never mutated.
///
/// `is_available` holds only when a device exists, permission was granted
/// and a live, enabled track was actually obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrophoneStatus {
    pub is_available: bool,
    pub has_devices: bool,
    pub has_permission: bool,
    pub error: Option<CaptureError>,
}

impl MicrophoneStatus {
    pub fn available() -> Self {
        Self {
            is_available: true,
            has_devices: true,
            has_permission: true,
            error: None,
        }
    }

    /// No media device API on this platform
    pub fn unsupported() -> Self {
        Self {
            is_available: false,
            has_devices: false,
            has_permission: false,
            error: Some(CaptureError::Unsupported),
        }
    }

    pub fn no_devices() -> Self {
        Self {
            is_available: false,
            has_devices: false,
            has_permission: false,
            error: Some(CaptureError::NoDevice),
        }
    }

    /// Devices exist but opening a test stream failed
    pub fn unavailable(error: CaptureError) -> Self {
        Self {
            is_available: false,
            has_devices: true,
            has_permission: error != CaptureError::PermissionDenied,
            error: Some(error),
        }
    }

    /// Stream opened but no track was enabled and live
    pub fn track_not_live() -> Self {
        Self {
            is_available: false,
            has_devices: true,
            has_permission: true,
            error: Some(CaptureError::DeviceUnreadable(
                "Microphone track not active".to_string(),
            )),
        }
    }

    /// Turn the snapshot into the error a recording attempt should fail with.
    pub fn into_result(self) -> Result<(), CaptureError> {
        if self.is_available {
            return Ok(());
        }
        Err(match self.error {
            Some(error) => error,
            None if !self.has_devices => CaptureError::NoDevice,
            None if !self.has_permission => CaptureError::PermissionDenied,
            None => CaptureError::DeviceUnreadable("no live audio track".to_string()),
        })
    }
}

impl Serialize for MicrophoneStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("MicrophoneStatus", 5)?;
        state.serialize_field("isAvailable", &self.is_available)?;
        state.serialize_field("hasDevices", &self.has_devices)?;
        state.serialize_field("hasPermission", &self.has_permission)?;
        state.serialize_field("error", &self.error.as_ref().map(|e| e.to_string()))?;
        state.serialize_field("errorCode", &self.error.as_ref().map(|e| e.code()))?;
        state.end()
    }
}
