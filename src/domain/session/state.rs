//! Capture session state machine

use std::fmt;
use thiserror::Error;

/// Capture session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Acquiring,
    Recording,
    Stopping,
    Finalizing,
}

impl CaptureState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Finalizing => "finalizing",
        }
    }

    /// Whether a session is in flight (anything but idle)
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub current_state: CaptureState,
    pub action: String,
}

impl InvalidStateTransition {
    pub fn new(current_state: CaptureState, action: impl Into<String>) -> Self {
        Self {
            current_state,
            action: action.into(),
        }
    }
}

/// Capture session state machine.
///
/// State machine:
///   IDLE -> ACQUIRING (begin_acquire)
///   ACQUIRING -> RECORDING (complete_acquire)
///   RECORDING -> STOPPING (begin_stop)
///   STOPPING -> FINALIZING (begin_finalize)
///   FINALIZING -> IDLE (complete)
///   any -> IDLE (reset)
#[derive(Debug, Default)]
pub struct SessionMachine {
    state: CaptureState,
}

impl SessionMachine {
    /// Create a new machine in idle state
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
        }
    }

    /// Get the current state
    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == CaptureState::Idle
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    fn transition(
        &mut self,
        from: CaptureState,
        to: CaptureState,
        action: &str,
    ) -> Result<(), InvalidStateTransition> {
        if self.state != from {
            return Err(InvalidStateTransition::new(self.state, action));
        }
        self.state = to;
        Ok(())
    }

    /// Transition from IDLE to ACQUIRING
    pub fn begin_acquire(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(CaptureState::Idle, CaptureState::Acquiring, "start recording")
    }

    /// Transition from ACQUIRING to RECORDING
    pub fn complete_acquire(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            CaptureState::Acquiring,
            CaptureState::Recording,
            "begin capturing",
        )
    }

    /// Transition from RECORDING to STOPPING
    pub fn begin_stop(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(CaptureState::Recording, CaptureState::Stopping, "stop recording")
    }

    /// Transition from STOPPING to FINALIZING
    pub fn begin_finalize(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            CaptureState::Stopping,
            CaptureState::Finalizing,
            "finalize recording",
        )
    }

    /// Transition from FINALIZING to IDLE
    pub fn complete(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(CaptureState::Finalizing, CaptureState::Idle, "complete recording")
    }

    /// Force the machine back to IDLE from any state
    pub fn reset(&mut self) {
        self.state = CaptureState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> SessionMachine {
        let mut machine = SessionMachine::new();
        machine.begin_acquire().unwrap();
        machine.complete_acquire().unwrap();
        machine
    }

    #[test]
    fn new_machine_is_idle() {
        let machine = SessionMachine::new();
        assert!(machine.is_idle());
        assert!(!machine.is_recording());
    }

    #[test]
    fn acquire_then_record() {
        let mut machine = SessionMachine::new();
        machine.begin_acquire().unwrap();
        assert_eq!(machine.state(), CaptureState::Acquiring);
        machine.complete_acquire().unwrap();
        assert!(machine.is_recording());
    }

    #[test]
    fn begin_acquire_while_acquiring_fails() {
        let mut machine = SessionMachine::new();
        machine.begin_acquire().unwrap();

        let err = machine.begin_acquire().unwrap_err();
        assert_eq!(err.current_state, CaptureState::Acquiring);
        assert!(err.action.contains("start recording"));
    }

    #[test]
    fn begin_acquire_while_recording_fails() {
        let mut machine = recording();
        let err = machine.begin_acquire().unwrap_err();
        assert_eq!(err.current_state, CaptureState::Recording);
    }

    #[test]
    fn begin_stop_from_idle_fails() {
        let mut machine = SessionMachine::new();
        let err = machine.begin_stop().unwrap_err();
        assert_eq!(err.current_state, CaptureState::Idle);
    }

    #[test]
    fn begin_stop_while_acquiring_fails() {
        let mut machine = SessionMachine::new();
        machine.begin_acquire().unwrap();
        let err = machine.begin_stop().unwrap_err();
        assert_eq!(err.current_state, CaptureState::Acquiring);
    }

    #[test]
    fn full_cycle() {
        let mut machine = recording();
        machine.begin_stop().unwrap();
        assert_eq!(machine.state(), CaptureState::Stopping);
        machine.begin_finalize().unwrap();
        assert_eq!(machine.state(), CaptureState::Finalizing);
        machine.complete().unwrap();
        assert!(machine.is_idle());

        // Can start another cycle
        machine.begin_acquire().unwrap();
        assert_eq!(machine.state(), CaptureState::Acquiring);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut machine = recording();
        machine.reset();
        machine.reset();
        assert!(machine.is_idle());
    }

    #[test]
    fn state_display() {
        assert_eq!(CaptureState::Idle.to_string(), "idle");
        assert_eq!(CaptureState::Acquiring.to_string(), "acquiring");
        assert_eq!(CaptureState::Recording.to_string(), "recording");
        assert_eq!(CaptureState::Stopping.to_string(), "stopping");
        assert_eq!(CaptureState::Finalizing.to_string(), "finalizing");
    }

    #[test]
    fn error_display() {
        let err = InvalidStateTransition::new(CaptureState::Recording, "start recording");
        let msg = err.to_string();
        assert!(msg.contains("start recording"));
        assert!(msg.contains("recording"));
    }
}
