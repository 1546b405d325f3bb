//! Shared configuration
//!
//! One logical copy lives in a [`ConfigStore`]; every session keeps a cached
//! shadow and refreshes it from change notifications. Writers overwrite keys
//! wholesale and the last writer wins.

mod fanout;
mod sqlite;
mod store;

pub use fanout::{ConfigFanout, Subscription};
pub use sqlite::SqliteConfigStore;
pub use store::MemoryConfigStore;

use crate::llm::Model;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid stored value: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Keys recognized in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ApiKey,
    Model,
    ShortcutEnabled,
}

impl ConfigKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::ApiKey => "apiKey",
            ConfigKey::Model => "model",
            ConfigKey::ShortcutEnabled => "shortcutEnabled",
        }
    }
}

/// Typed view of the stored settings
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Configuration {
    pub api_key: Option<String>,
    pub model: Model,
    pub shortcut_enabled: bool,
}

impl Configuration {
    pub fn api_key_present(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Build from raw entries. Missing or ill-typed values take defaults.
    pub fn from_entries(entries: &HashMap<String, Value>) -> Self {
        let api_key = entries
            .get(ConfigKey::ApiKey.as_str())
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(ToString::to_string);
        let model = Model::from_stored(
            entries
                .get(ConfigKey::Model.as_str())
                .and_then(Value::as_str),
        );
        let shortcut_enabled = entries
            .get(ConfigKey::ShortcutEnabled.as_str())
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Self {
            api_key,
            model,
            shortcut_enabled,
        }
    }

    /// Keys whose values differ between two snapshots
    pub fn diff(&self, other: &Configuration) -> Vec<ConfigKey> {
        let mut changed = Vec::new();
        if self.api_key != other.api_key {
            changed.push(ConfigKey::ApiKey);
        }
        if self.model != other.model {
            changed.push(ConfigKey::Model);
        }
        if self.shortcut_enabled != other.shortcut_enabled {
            changed.push(ConfigKey::ShortcutEnabled);
        }
        changed
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("api_key_present", &self.api_key_present())
            .field("model", &self.model)
            .field("shortcut_enabled", &self.shortcut_enabled)
            .finish()
    }
}

/// Partial write; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub api_key: Option<String>,
    pub model: Option<Model>,
    pub shortcut_enabled: Option<bool>,
}

impl ConfigUpdate {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn shortcut_enabled(mut self, enabled: bool) -> Self {
        self.shortcut_enabled = Some(enabled);
        self
    }

    /// Raw key/value pairs to write
    pub fn entries(&self) -> Vec<(ConfigKey, Value)> {
        let mut out = Vec::new();
        if let Some(key) = &self.api_key {
            out.push((ConfigKey::ApiKey, Value::String(key.trim().to_string())));
        }
        if let Some(model) = self.model {
            out.push((ConfigKey::Model, Value::String(model.api_name().to_string())));
        }
        if let Some(enabled) = self.shortcut_enabled {
            out.push((ConfigKey::ShortcutEnabled, Value::Bool(enabled)));
        }
        out
    }
}

/// A committed change as seen by subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    /// Commit sequence number, strictly increasing per store
    pub seq: u64,
    pub changed: Vec<ConfigKey>,
    /// Full configuration after the commit
    pub config: Configuration,
}

/// Persisted configuration with change subscription
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read all recognized keys, defaulting missing ones
    async fn load(&self) -> ConfigResult<Configuration>;

    /// Commit a write and notify subscribers if anything changed
    async fn set(&self, update: ConfigUpdate) -> ConfigResult<Configuration>;

    /// Observe every subsequent committed change
    fn subscribe(&self) -> Subscription;
}

#[async_trait]
impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
    async fn load(&self) -> ConfigResult<Configuration> {
        (**self).load().await
    }

    async fn set(&self, update: ConfigUpdate) -> ConfigResult<Configuration> {
        (**self).set(update).await
    }

    fn subscribe(&self) -> Subscription {
        (**self).subscribe()
    }
}
