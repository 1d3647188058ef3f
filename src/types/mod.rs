use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{FalError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    TextToImage,
    ImageToImage,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextToImage => "text_to_image",
            Self::ImageToImage => "image_to_image",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationKind {
    type Err = FalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text_to_image" => Ok(Self::TextToImage),
            "image_to_image" => Ok(Self::ImageToImage),
            _ => Err(FalError::InvalidKind),
        }
    }
}

/// Raw parameters as a host application passes them, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub kind: GenerationKind,
    pub prompt: String,
    /// Only meaningful for image-to-image. Its absence is left for the provider to reject.
    pub source_image_url: Option<String>,
}

impl GenerationRequest {
    pub fn text_to_image(prompt: impl Into<String>) -> Self {
        Self {
            kind: GenerationKind::TextToImage,
            prompt: prompt.into(),
            source_image_url: None,
        }
    }

    pub fn image_to_image(prompt: impl Into<String>, source_image_url: impl Into<String>) -> Self {
        Self {
            kind: GenerationKind::ImageToImage,
            prompt: prompt.into(),
            source_image_url: Some(source_image_url.into()),
        }
    }
}

impl TryFrom<GenerationParams> for GenerationRequest {
    type Error = FalError;

    fn try_from(params: GenerationParams) -> Result<Self> {
        let kind = params.kind.parse::<GenerationKind>()?;
        Ok(Self {
            kind,
            prompt: params.prompt,
            source_image_url: params.image_url.filter(|url| !url.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Pending { status: String },
    Completed(GenerationResult),
    Failed { reason: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<GeneratedImage>,
    /// The prompt as echoed back by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCaption {
    pub url: String,
    pub caption: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_deserialize_with_wire_names() -> Result<()> {
        let params = serde_json::from_str::<GenerationParams>(
            r#"{"type":"image_to_image","prompt":"a cat","image_url":"https://example.com/in.png"}"#,
        )?;
        let request = GenerationRequest::try_from(params)?;
        assert_eq!(request.kind, GenerationKind::ImageToImage);
        assert_eq!(
            request.source_image_url.as_deref(),
            Some("https://example.com/in.png")
        );
        Ok(())
    }

    #[test]
    fn unknown_kind_is_rejected() {
        for kind in ["", "TEXT_TO_IMAGE", "text-to-image", "video"] {
            let params = GenerationParams {
                kind: kind.to_string(),
                prompt: "x".to_string(),
                image_url: None,
            };
            let err = GenerationRequest::try_from(params).expect_err("kind should be rejected");
            assert!(matches!(err, FalError::InvalidKind), "kind {kind:?}");
        }
    }

    #[test]
    fn result_tolerates_missing_fields() -> Result<()> {
        let parsed = serde_json::from_str::<GenerationResult>(
            r#"{"images":[{"url":"https://cdn/x.png","width":1024}],"timings":{"inference":1.2}}"#,
        )?;
        assert_eq!(parsed.images.len(), 1);
        assert_eq!(parsed.images[0].width, Some(1024));
        assert_eq!(parsed.prompt, None);

        let empty = serde_json::from_str::<GenerationResult>("{}")?;
        assert!(empty.images.is_empty());

        let null_images = serde_json::from_str::<GenerationResult>(r#"{"images":null,"prompt":"x"}"#)?;
        assert!(null_images.images.is_empty());
        assert_eq!(null_images.prompt.as_deref(), Some("x"));
        Ok(())
    }
}
