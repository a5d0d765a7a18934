//! Settings file in the user's config directory

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

const APP_DIR: &str = "smart-memo";
const FILE_NAME: &str = "config.toml";

/// TOML file at `$XDG_CONFIG_HOME/smart-memo/config.toml`.
///
/// Saves go through a sibling staging file and a rename, so a crash
/// mid-write never leaves a truncated config behind.
#[derive(Debug, Clone)]
pub struct XdgConfigStore {
    file: PathBuf,
}

impl XdgConfigStore {
    pub fn new() -> Self {
        Self::with_path(default_location())
    }

    pub fn with_path(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    fn staging_file(&self) -> PathBuf {
        self.file.with_extension("toml.tmp")
    }

    fn read_error(&self, e: io::Error) -> ConfigError {
        ConfigError::ReadError(format!("{}: {}", self.file.display(), e))
    }

    fn write_error(&self, e: io::Error) -> ConfigError {
        ConfigError::WriteError(format!("{}: {}", self.file.display(), e))
    }
}

impl Default for XdgConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Falls back to `~/.config`, then the working directory.
fn default_location() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_default()
        .join(APP_DIR)
        .join(FILE_NAME)
}

fn decode(text: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn encode(config: &AppConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::WriteError(e.to_string()))
}

#[async_trait]
impl ConfigStore for XdgConfigStore {
    fn path(&self) -> &Path {
        &self.file
    }

    async fn read(&self) -> Result<Option<AppConfig>, ConfigError> {
        match fs::read_to_string(&self.file).await {
            Ok(text) => decode(&text).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.read_error(e)),
        }
    }

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let text = encode(config)?;
        if let Some(dir) = self.file.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(|e| self.write_error(e))?;
        }

        let staging = self.staging_file();
        fs::write(&staging, text).await.map_err(|e| self.write_error(e))?;
        if let Err(e) = fs::rename(&staging, &self.file).await {
            let _ = fs::remove_file(&staging).await;
            return Err(self.write_error(e));
        }
        debug!(path = %self.file.display(), "Config saved");
        Ok(())
    }

    async fn exists(&self) -> Result<bool, ConfigError> {
        fs::try_exists(&self.file).await.map_err(|e| self.read_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> XdgConfigStore {
        XdgConfigStore::with_path(dir.path().join("nested/config.toml"))
    }

    #[test]
    fn default_location_ends_in_app_dir() {
        let path = default_location();
        assert!(path.ends_with("smart-memo/config.toml"));
    }

    #[test]
    fn decode_reads_flat_keys() {
        let config = decode(
            r#"
device = "USB Audio Device"
sample_rate = 48000
timeslice = "2s"
output_dir = "/tmp/memos"
"#,
        )
        .unwrap();
        assert_eq!(config.device.as_deref(), Some("USB Audio Device"));
        assert_eq!(config.sample_rate, Some(48_000));
        assert_eq!(config.timeslice.as_deref(), Some("2s"));
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/memos")));
        assert!(config.bitrate.is_none());
    }

    #[test]
    fn decode_rejects_wrong_types() {
        assert!(matches!(
            decode("sample_rate = \"fast\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_reads_as_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.read().await.unwrap().is_none());
        assert!(!store.exists().await.unwrap());
        assert_eq!(store.load().await.unwrap(), AppConfig::empty());
    }

    #[tokio::test]
    async fn save_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let config = AppConfig {
            device: Some("hw:1".to_string()),
            bitrate: Some(24_000),
            flush_timeout: Some("3s".to_string()),
            ..Default::default()
        };

        store.save(&AppConfig::defaults()).await.unwrap();
        store.save(&config).await.unwrap();

        assert_eq!(store.read().await.unwrap(), Some(config));
        assert!(!store.staging_file().exists());
    }

    #[tokio::test]
    async fn unparseable_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(store.path(), "bitrate = [").unwrap();

        assert!(matches!(store.load().await, Err(ConfigError::ParseError(_))));
    }

    #[tokio::test]
    async fn init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.init().await.unwrap();
        assert_eq!(store.load().await.unwrap(), AppConfig::defaults());

        assert!(matches!(
            store.init().await,
            Err(ConfigError::AlreadyExists(_))
        ));
    }
}
