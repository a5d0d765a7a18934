//! Configuration value objects

mod app_config;

pub use app_config::{
    AppConfig, BITRATE_RANGE, DEFAULT_BITRATE, DEFAULT_LOG_LEVEL, DEFAULT_SAMPLE_RATE,
};
