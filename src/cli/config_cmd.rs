//! Config command handler

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, BITRATE_RANGE};
use crate::domain::error::ConfigError;
use crate::domain::recording::Duration;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;
    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let config = store.load().await?;
    match lookup(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output(NOT_SET),
    }

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;
    for key in VALID_CONFIG_KEYS {
        let value = lookup(&config, key);
        presenter.key_value(key, value.as_deref().unwrap_or(NOT_SET));
    }
    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Validate a value and store it under `key`
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "device" => {
            if value.trim().is_empty() {
                return Err(invalid(key, "Device name must not be empty"));
            }
            config.device = Some(value.to_string());
        }
        "sample_rate" => {
            let rate = value
                .parse::<u32>()
                .ok()
                .filter(|rate| *rate > 0)
                .ok_or_else(|| invalid(key, "Value must be a positive integer (Hz)"))?;
            config.sample_rate = Some(rate);
        }
        "bitrate" => {
            let bitrate = value
                .parse::<u32>()
                .ok()
                .filter(|b| BITRATE_RANGE.contains(b))
                .ok_or_else(|| {
                    invalid(
                        key,
                        format!(
                            "Value must be between {} and {} bits/s",
                            BITRATE_RANGE.start(),
                            BITRATE_RANGE.end()
                        ),
                    )
                })?;
            config.bitrate = Some(bitrate);
        }
        "timeslice" | "flush_timeout" | "max_duration" => {
            let duration = value
                .parse::<Duration>()
                .map_err(|e| invalid(key, e.to_string()))?;
            let text = Some(duration.to_string());
            match key {
                "timeslice" => config.timeslice = text,
                "flush_timeout" => config.flush_timeout = text,
                _ => config.max_duration = text,
            }
        }
        "output_dir" => config.output_dir = Some(PathBuf::from(value)),
        "log_level" => {
            EnvFilter::try_new(value).map_err(|e| invalid(key, e.to_string()))?;
            config.log_level = Some(value.to_string());
        }
        _ => return check_key(key),
    }
    Ok(())
}

fn lookup(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "device" => config.device.clone(),
        "sample_rate" => config.sample_rate.map(|v| v.to_string()),
        "timeslice" => config.timeslice.clone(),
        "bitrate" => config.bitrate.map(|v| v.to_string()),
        "flush_timeout" => config.flush_timeout.clone(),
        "max_duration" => config.max_duration.clone(),
        "output_dir" => config
            .output_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        "log_level" => config.log_level.clone(),
        _ => None,
    }
}
