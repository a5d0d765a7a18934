//! SmartMemo - voice memo recorder
//!
//! This crate provides microphone probing, a recording session state
//! machine and streaming Ogg/Opus capture for short voice memos.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Value objects, the capture state machine, and errors
//! - **Application**: Prober, capture session and controller use cases, plus port traits
//! - **Infrastructure**: Adapter implementations (cpal capture, Opus encoding, XDG config)
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
