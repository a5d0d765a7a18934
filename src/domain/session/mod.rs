//! Recording session lifecycle

mod state;

pub use state::{CaptureState, InvalidStateTransition, SessionMachine};
