//! SmartMemo CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use smart_memo::application::CaptureConfig;
use smart_memo::cli::{
    app::{
        default_output_path, load_merged_config, run_devices, run_probe, run_record,
        run_test_device, EXIT_ERROR, EXIT_USAGE_ERROR,
    },
    args::{Cli, Commands, RecordOptions},
    config_cmd::handle_config_command,
    presenter::Presenter,
};
use smart_memo::domain::config::AppConfig;
use smart_memo::domain::recording::{AudioMimeType, Duration};
use smart_memo::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let presenter = Presenter::new();

    // Config subcommands work on the file alone
    if let Some(Commands::Config { action }) = cli.command {
        let store = XdgConfigStore::new();
        if let Err(e) = handle_config_command(action, &store, &presenter).await {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
        return ExitCode::SUCCESS;
    }

    // Build CLI config from args
    let cli_config = AppConfig {
        device: cli.device.clone(),
        sample_rate: cli.sample_rate,
        bitrate: cli.bitrate,
        max_duration: cli.max_duration.clone(),
        ..Default::default()
    };

    // Merge config
    let config = load_merged_config(cli_config).await;
    init_tracing(config.log_level_or_default());

    let capture = match capture_config(&config) {
        Ok(capture) => capture,
        Err(message) => {
            presenter.error(&message);
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    match cli.command {
        Some(Commands::Probe { json }) => run_probe(capture, json).await,
        Some(Commands::Devices { json }) => run_devices(capture, json).await,
        Some(Commands::TestDevice { device }) => {
            run_test_device(capture, device.or(config.device.clone())).await
        }
        Some(Commands::Config { .. }) => ExitCode::SUCCESS,
        None => {
            let max_duration = match parse_duration("max-duration", config.max_duration.as_deref()) {
                Ok(d) => d.unwrap_or_else(Duration::default_max_duration),
                Err(message) => {
                    presenter.error(&message);
                    return ExitCode::from(EXIT_USAGE_ERROR);
                }
            };
            if max_duration.as_millis() == 0 {
                presenter.error("Invalid max-duration: must be greater than zero");
                return ExitCode::from(EXIT_USAGE_ERROR);
            }

            let output = cli.output.clone().unwrap_or_else(|| {
                default_output_path(&config.output_dir_or_default(), capture.mime_type)
            });

            let options = RecordOptions {
                output,
                max_duration,
                device: capture.device_id,
                sample_rate: capture.sample_rate,
                timeslice: capture.timeslice,
                bitrate: capture.bitrate,
                flush_timeout: capture.flush_timeout,
            };

            run_record(options).await
        }
    }
}

/// Log to stderr so stdout stays clean for `--json` output
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Build capture settings, rejecting malformed durations
fn capture_config(config: &AppConfig) -> Result<CaptureConfig, String> {
    let timeslice = parse_duration("timeslice", config.timeslice.as_deref())?
        .unwrap_or_else(Duration::default_timeslice);
    let flush_timeout = parse_duration("flush-timeout", config.flush_timeout.as_deref())?
        .unwrap_or_else(Duration::default_flush_timeout);

    if timeslice.as_millis() == 0 {
        return Err("Invalid timeslice: must be greater than zero".to_string());
    }

    Ok(CaptureConfig {
        device_id: config.device.clone(),
        sample_rate: config.sample_rate_or_default(),
        timeslice,
        bitrate: config.bitrate_or_default(),
        mime_type: AudioMimeType::OggOpus,
        flush_timeout,
    })
}

fn parse_duration(name: &str, value: Option<&str>) -> Result<Option<Duration>, String> {
    value
        .map(|s| {
            s.parse::<Duration>()
                .map_err(|e| format!("Invalid {}: {}", name, e))
        })
        .transpose()
}
