use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{FalError, Result};

use super::settings::UserSettings;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_step_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FalConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, alias = "model")]
    pub variant: Option<String>,
    /// Env keys searched for the API key when settings carry none.
    #[serde(default, alias = "api_key_envs")]
    pub api_key_env: Vec<String>,
    #[serde(default)]
    pub http_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub poll: Option<PollOverrides>,
    /// Replaces the variant's defaults for absent settings.
    #[serde(default)]
    pub settings: UserSettings,
}

impl FalConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let parsed = toml::from_str::<Self>(contents)
            .map_err(|err| FalError::Config(format!("parse toml: {err}")))?;
        if parsed.settings.fal_ai_api_key.is_some() {
            return Err(FalError::Config(
                "settings.fal_ai_api_key is not accepted in config files (use api_key_env)"
                    .to_string(),
            ));
        }
        if parsed.poll.as_ref().and_then(|poll| poll.max_attempts) == Some(0) {
            return Err(FalError::Config(
                "poll.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(parsed)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|err| {
            FalError::Config(format!("read {} failed: {err}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }
}
