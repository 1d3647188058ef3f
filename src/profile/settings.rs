use serde::{Deserialize, Serialize};

use crate::{FalError, Result};

/// Settings as a host application stores them: every value is text and may be absent.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fal_ai_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_inference_steps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_images: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_safety_checker: Option<String>,
}

impl std::fmt::Debug for UserSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSettings")
            .field(
                "fal_ai_api_key",
                &self.fal_ai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("image_size", &self.image_size)
            .field("num_inference_steps", &self.num_inference_steps)
            .field("num_images", &self.num_images)
            .field("enable_safety_checker", &self.enable_safety_checker)
            .finish()
    }
}

impl UserSettings {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            fal_ai_api_key: Some(api_key.into()),
            ..Self::default()
        }
    }
}

/// Fallback values for absent settings, kept in the same textual form as [`UserSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingDefaults {
    pub image_size: String,
    pub num_inference_steps: String,
    pub num_images: String,
    pub enable_safety_checker: String,
}

impl SettingDefaults {
    pub fn new(
        image_size: &str,
        num_inference_steps: &str,
        num_images: &str,
        enable_safety_checker: &str,
    ) -> Self {
        Self {
            image_size: image_size.to_string(),
            num_inference_steps: num_inference_steps.to_string(),
            num_images: num_images.to_string(),
            enable_safety_checker: enable_safety_checker.to_string(),
        }
    }

    /// Present values in `overrides` replace the defaults.
    pub fn overlay(&self, overrides: &UserSettings) -> Self {
        let pick = |value: &Option<String>, fallback: &String| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| fallback.clone())
        };
        Self {
            image_size: pick(&overrides.image_size, &self.image_size),
            num_inference_steps: pick(&overrides.num_inference_steps, &self.num_inference_steps),
            num_images: pick(&overrides.num_images, &self.num_images),
            enable_safety_checker: pick(
                &overrides.enable_safety_checker,
                &self.enable_safety_checker,
            ),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: String,
    pub image_size: String,
    pub inference_steps: u32,
    pub image_count: u32,
    pub safety_checker_enabled: bool,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &"<redacted>")
            .field("image_size", &self.image_size)
            .field("inference_steps", &self.inference_steps)
            .field("image_count", &self.image_count)
            .field("safety_checker_enabled", &self.safety_checker_enabled)
            .finish()
    }
}

impl ProviderSettings {
    pub fn resolve(user: &UserSettings, defaults: &SettingDefaults) -> Result<Self> {
        let merged = defaults.overlay(user);
        Ok(Self {
            api_key: user.fal_ai_api_key.clone().unwrap_or_default(),
            image_size: merged.image_size,
            inference_steps: parse_count("num_inference_steps", &merged.num_inference_steps)?,
            image_count: parse_count("num_images", &merged.num_images)?,
            // Anything other than the literal "true" disables the checker.
            safety_checker_enabled: merged.enable_safety_checker == "true",
        })
    }
}

fn parse_count(name: &'static str, raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .map_err(|err| FalError::InvalidSetting {
            name,
            details: format!("expected a non-negative integer, got {raw:?} ({err})"),
        })
}
