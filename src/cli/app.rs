//! Main app runners

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::oneshot;
use tokio::time::{interval, sleep, Duration as TokioDuration};
use tracing::{debug, warn};

use crate::application::ports::{ConfigStore, MediaDevices};
use crate::application::{CaptureConfig, CaptureSession, SessionController};
use crate::domain::config::AppConfig;
use crate::domain::error::CaptureError;
use crate::domain::recording::{format_elapsed, AudioArtifact, AudioMimeType};
use crate::domain::session::CaptureState;
use crate::infrastructure::{CpalMediaDevices, XdgConfigStore};

use super::args::RecordOptions;
use super::presenter::Presenter;
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment variable overriding the input device
pub const ENV_DEVICE: &str = "SMART_MEMO_DEVICE";

/// Environment variable overriding the log filter
pub const ENV_LOG: &str = "SMART_MEMO_LOG";

/// How often the spinner refreshes the elapsed time
const REFRESH_INTERVAL: TokioDuration = TokioDuration::from_millis(250);

/// Why the recording loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    UserRequested,
    Signal,
    MaxDuration,
    SessionEnded,
}

/// Build a controller over the cpal host
pub fn create_controller(config: CaptureConfig) -> SessionController<CpalMediaDevices> {
    let media = Arc::new(CpalMediaDevices::new());
    SessionController::new(Arc::new(CaptureSession::new(media, config)))
}

/// Record until Enter, a shutdown signal or the duration cap, then write
/// the memo to disk.
pub async fn run_record(options: RecordOptions) -> ExitCode {
    let mut presenter = Presenter::new();

    let shutdown = ShutdownSignal::new();
    if let Err(e) = shutdown.setup().await {
        presenter.error(&format!("Failed to setup signal handler: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }

    let controller = create_controller(CaptureConfig {
        device_id: options.device.clone(),
        sample_rate: options.sample_rate,
        timeslice: options.timeslice,
        bitrate: options.bitrate,
        mime_type: AudioMimeType::OggOpus,
        flush_timeout: options.flush_timeout,
    });

    presenter.start_spinner("Opening microphone...");
    if let Err(e) = controller.start_recording().await {
        presenter.spinner_fail("Could not start recording");
        presenter.capture_error(&e);
        return ExitCode::from(EXIT_ERROR);
    }

    let max_secs = options.max_duration.as_secs();
    let reason = wait_for_stop(&controller, &presenter, &shutdown, &options).await;
    debug!(?reason, elapsed = controller.elapsed_seconds(), "Recording loop ended");
    if reason == StopReason::MaxDuration {
        presenter.update_spinner(&format!(
            "Reached the {} limit, finishing...",
            format_elapsed(max_secs)
        ));
    } else {
        presenter.update_spinner("Finishing...");
    }

    match controller.stop_recording().await {
        Ok(Some(artifact)) => match save_artifact(&options.output, &artifact).await {
            Ok(()) => {
                presenter.spinner_success(&format!(
                    "Saved {} ({}, {})",
                    options.output.display(),
                    artifact.human_readable_size(),
                    format_elapsed(artifact.duration().as_secs())
                ));
                ExitCode::from(EXIT_SUCCESS)
            }
            Err(e) => {
                presenter.spinner_fail("Could not save recording");
                presenter.error(&format!("{}: {}", options.output.display(), e));
                ExitCode::from(EXIT_ERROR)
            }
        },
        Ok(None) => {
            presenter.spinner_fail("Recording was not active");
            ExitCode::from(EXIT_ERROR)
        }
        Err(e) => {
            presenter.spinner_fail("Recording failed");
            presenter.capture_error(&e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn wait_for_stop<M: MediaDevices>(
    controller: &SessionController<M>,
    presenter: &Presenter,
    shutdown: &ShutdownSignal,
    options: &RecordOptions,
) -> StopReason {
    let max_secs = options.max_duration.as_secs();
    let deadline = sleep(options.max_duration.as_std());
    tokio::pin!(deadline);

    let mut refresh = interval(REFRESH_INTERVAL);
    let mut state = controller.subscribe();
    let mut enter = spawn_enter_listener();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                presenter.update_recording(controller.elapsed_seconds(), max_secs);
            }
            pressed = &mut enter, if stdin_open => match pressed {
                Ok(()) => return StopReason::UserRequested,
                // Keep recording without a terminal; signals still stop it
                Err(_) => stdin_open = false,
            },
            _ = shutdown.wait() => return StopReason::Signal,
            _ = &mut deadline => return StopReason::MaxDuration,
            changed = state.changed() => {
                if changed.is_err() || *state.borrow_and_update() != CaptureState::Recording {
                    return StopReason::SessionEnded;
                }
            }
        }
    }
}

/// Resolves on Enter; the sender is dropped if stdin closes first.
fn spawn_enter_listener() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    let spawned = thread::Builder::new()
        .name("memo-stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(n) if n > 0 => {
                    let _ = tx.send(());
                }
                Ok(_) => debug!("stdin closed"),
                Err(e) => warn!(error = %e, "Failed to read stdin"),
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to spawn stdin listener");
    }
    rx
}

async fn save_artifact(path: &Path, artifact: &AudioArtifact) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, artifact.data()).await
}

/// Probe the microphone and print its status
pub async fn run_probe(config: CaptureConfig, json: bool) -> ExitCode {
    let presenter = Presenter::new();
    let controller = create_controller(config);
    let status = controller.check_microphone().await;

    if json {
        match serde_json::to_string_pretty(&status) {
            Ok(text) => presenter.output(&text),
            Err(e) => {
                presenter.error(&format!("Failed to serialize status: {}", e));
                return ExitCode::from(EXIT_ERROR);
            }
        }
    } else {
        presenter.microphone_status(&status);
    }

    if status.is_available {
        ExitCode::from(EXIT_SUCCESS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}

/// List audio input devices
pub async fn run_devices(config: CaptureConfig, json: bool) -> ExitCode {
    let presenter = Presenter::new();
    let controller = create_controller(config);
    let devices = controller.list_devices().await;

    if json {
        return match serde_json::to_string_pretty(&devices) {
            Ok(text) => {
                presenter.output(&text);
                ExitCode::from(EXIT_SUCCESS)
            }
            Err(e) => {
                presenter.error(&format!("Failed to serialize devices: {}", e));
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    if devices.is_empty() {
        presenter.capture_error(&CaptureError::NoDevice);
        return ExitCode::from(EXIT_ERROR);
    }
    presenter.devices(&devices);
    ExitCode::from(EXIT_SUCCESS)
}

/// Open one device briefly and report whether it works
pub async fn run_test_device(config: CaptureConfig, device: Option<String>) -> ExitCode {
    let presenter = Presenter::new();
    let controller = create_controller(config);
    let name = device.as_deref().unwrap_or("default input");

    if controller.test_device(device.as_deref()).await {
        presenter.success(&format!("{} is working", name));
        ExitCode::from(EXIT_SUCCESS)
    } else {
        presenter.error(&format!("{} did not produce a live audio track", name));
        ExitCode::from(EXIT_ERROR)
    }
}

/// Default output path: `<dir>/memo-<unix seconds>.<ext>`
pub fn default_output_path(dir: &Path, mime_type: AudioMimeType) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    dir.join(format!("memo-{}.{}", stamp, mime_type.extension()))
}

/// Build the env config layer
pub fn env_config() -> AppConfig {
    AppConfig {
        device: env::var(ENV_DEVICE).ok().filter(|s| !s.is_empty()),
        log_level: env::var(ENV_LOG).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    }
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %store.path().display(), error = %e, "Ignoring unreadable config file");
            AppConfig::empty()
        }
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config())
        .merge(cli_config)
}
