//! CLI presenter for output formatting

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::device::{DeviceDescriptor, MicrophoneStatus};
use crate::domain::error::CaptureError;
use crate::domain::recording::format_elapsed;

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
    is_spinner_active: Arc<AtomicBool>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self {
            spinner: None,
            is_spinner_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.red} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
        self.is_spinner_active.store(true, Ordering::SeqCst);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
        self.is_spinner_active.store(false, Ordering::SeqCst);
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
        self.is_spinner_active.store(false, Ordering::SeqCst);
    }

    pub fn is_spinner_active(&self) -> bool {
        self.is_spinner_active.load(Ordering::SeqCst)
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Print a capture failure followed by what the user can do about it
    pub fn capture_error(&self, error: &CaptureError) {
        self.error(&error.to_string());
        if let Some(hint) = hint_for(error) {
            eprintln!("  {}", hint.dimmed());
        }
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Format the recording line shown next to the spinner
    pub fn format_recording(&self, elapsed_secs: u64, max_secs: u64) -> String {
        format!(
            "Recording {} / {}  (press Enter to stop)",
            format_elapsed(elapsed_secs).bold(),
            format_elapsed(max_secs)
        )
    }

    /// Update recording progress
    pub fn update_recording(&self, elapsed_secs: u64, max_secs: u64) {
        self.update_spinner(&self.format_recording(elapsed_secs, max_secs));
    }

    /// Print a human-readable microphone status
    pub fn microphone_status(&self, status: &MicrophoneStatus) {
        let mark = |ok: bool| if ok { "yes".green() } else { "no".red() };
        self.key_value("available", &mark(status.is_available).to_string());
        self.key_value("devices", &mark(status.has_devices).to_string());
        self.key_value("permission", &mark(status.has_permission).to_string());
        if let Some(error) = &status.error {
            self.key_value("error", &error.to_string());
            if let Some(hint) = hint_for(error) {
                eprintln!("  {}", hint.dimmed());
            }
        }
    }

    /// Print one line per input device
    pub fn devices(&self, devices: &[DeviceDescriptor]) {
        for device in devices {
            if device.label == device.id {
                println!("{} {}", "●".cyan(), device.display_name());
            } else {
                println!("{} {} ({})", "●".cyan(), device.display_name(), device.id.dimmed());
            }
        }
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Actionable advice for each failure kind
pub fn hint_for(error: &CaptureError) -> Option<&'static str> {
    match error {
        CaptureError::Unsupported => Some("No audio host is available on this system."),
        CaptureError::NoDevice => {
            Some("Connect a microphone, or pick one from `smart-memo devices` with --device.")
        }
        CaptureError::PermissionDenied => {
            Some("Allow microphone access for this terminal in your system privacy settings.")
        }
        CaptureError::DeviceUnreadable(_) => {
            Some("The microphone may be in use by another application. Close it and try again.")
        }
        CaptureError::ConstraintsUnsatisfiable(_) => {
            Some("Try another --sample-rate or leave it unset to use the device default.")
        }
        CaptureError::NoAudioCaptured => {
            Some("Nothing was recorded. Check that the microphone is not muted.")
        }
        CaptureError::InvalidStateTransition(_) | CaptureError::Cancelled => None,
        CaptureError::Unknown(_) => Some("Run with SMART_MEMO_LOG=debug for details."),
    }
}
