//! Supported chat models
//!
//! The set is closed: configuration values outside it fall back to the
//! default rather than being sent upstream.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Models the summarizer can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Model {
    #[default]
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

/// All supported models, in the order a model picker shows them
pub const SUPPORTED_MODELS: &[Model] = &[Model::Gpt4oMini, Model::Gpt4, Model::Gpt35Turbo];

impl Model {
    /// Name used on the wire and in the configuration store
    pub fn api_name(self) -> &'static str {
        match self {
            Model::Gpt4oMini => "gpt-4o-mini",
            Model::Gpt4 => "gpt-4",
            Model::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }

    /// Parse a stored value, tolerating unknown or missing entries
    pub fn from_stored(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Returned when a model name is not in [`SUPPORTED_MODELS`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported model: {0}")]
pub struct UnsupportedModel(pub String);

impl FromStr for Model {
    type Err = UnsupportedModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SUPPORTED_MODELS
            .iter()
            .copied()
            .find(|m| m.api_name() == s.trim())
            .ok_or_else(|| UnsupportedModel(s.to_string()))
    }
}
