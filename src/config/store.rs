//! In-memory configuration store

use super::{
    ConfigFanout, ConfigResult, ConfigStore, ConfigUpdate, Configuration, Subscription,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Process-local store. Useful for tests and for hosts that persist elsewhere.
#[derive(Default)]
pub struct MemoryConfigStore {
    entries: Mutex<HashMap<String, Value>>,
    fanout: ConfigFanout,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `config`, without notifying anyone
    pub fn with_config(config: &Configuration) -> Self {
        let update = ConfigUpdate {
            api_key: config.api_key.clone(),
            model: Some(config.model),
            shortcut_enabled: Some(config.shortcut_enabled),
        };
        let entries = update
            .entries()
            .into_iter()
            .map(|(k, v)| (k.as_str().to_string(), v))
            .collect();
        Self {
            entries: Mutex::new(entries),
            fanout: ConfigFanout::new(),
        }
    }

    pub fn fanout(&self) -> &ConfigFanout {
        &self.fanout
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> ConfigResult<Configuration> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Configuration::from_entries(&entries))
    }

    async fn set(&self, update: ConfigUpdate) -> ConfigResult<Configuration> {
        // Held across publish so notification order matches commit order
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = Configuration::from_entries(&entries);

        for (key, value) in update.entries() {
            entries.insert(key.as_str().to_string(), value);
        }

        let after = Configuration::from_entries(&entries);
        let changed = before.diff(&after);
        if !changed.is_empty() {
            self.fanout.publish(changed, after.clone());
        }
        Ok(after)
    }

    fn subscribe(&self) -> Subscription {
        self.fanout.subscribe()
    }
}
