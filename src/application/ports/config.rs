//! Persisted settings port

use std::path::Path;

use async_trait::async_trait;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Backing store for the settings file.
///
/// Only the file layer lives here. Environment and command line values are
/// merged on top by the caller.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Location shown to the user
    fn path(&self) -> &Path;

    /// Stored settings, or `None` when nothing has been saved yet.
    async fn read(&self) -> Result<Option<AppConfig>, ConfigError>;

    /// Replace the stored settings.
    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;

    async fn exists(&self) -> Result<bool, ConfigError>;

    /// Stored settings with every key unset when there are none.
    async fn load(&self) -> Result<AppConfig, ConfigError> {
        Ok(self.read().await?.unwrap_or_else(AppConfig::empty))
    }

    /// Seed the store with defaults, never overwriting existing settings.
    async fn init(&self) -> Result<(), ConfigError> {
        if self.exists().await? {
            return Err(ConfigError::AlreadyExists(self.path().display().to_string()));
        }
        self.save(&AppConfig::defaults()).await
    }
}
