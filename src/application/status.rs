//! Translation of platform failures into the capture error taxonomy

use crate::domain::error::CaptureError;

use super::ports::{PlatformError, PlatformErrorName};

/// Classify a raw platform error.
///
/// Every platform error name has exactly one arm; adding a name to
/// [`PlatformErrorName`] must be decided here.
pub fn classify(error: &PlatformError) -> CaptureError {
    match error.name {
        PlatformErrorName::NotAllowed | PlatformErrorName::Security => {
            CaptureError::PermissionDenied
        }
        PlatformErrorName::NotFound => CaptureError::NoDevice,
        PlatformErrorName::NotReadable
        | PlatformErrorName::Aborted
        | PlatformErrorName::InvalidState => CaptureError::DeviceUnreadable(error.message.clone()),
        PlatformErrorName::Overconstrained => {
            CaptureError::ConstraintsUnsatisfiable(error.message.clone())
        }
        PlatformErrorName::NotSupported => CaptureError::Unsupported,
        PlatformErrorName::Encoding | PlatformErrorName::Unknown => {
            CaptureError::Unknown(error.to_string())
        }
    }
}

impl From<PlatformError> for CaptureError {
    fn from(error: PlatformError) -> Self {
        classify(&error)
    }
}
