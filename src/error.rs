use std::fmt;

use thiserror::Error;

/// Which of the three queue calls produced a non-success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submit,
    Status,
    Result,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Submit => "Fal.ai API request",
            Self::Status => "Fal.ai status check",
            Self::Result => "Fal.ai result fetch",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    TransportFailure,
    ProtocolFailure,
    Timeout,
}

#[derive(Debug, Error)]
pub enum FalError {
    #[error("Invalid 'type' parameter. Must be 'text_to_image' or 'image_to_image'.")]
    InvalidKind,
    #[error("invalid setting {name}: {details}")]
    InvalidSetting { name: &'static str, details: String },
    #[error("invalid config: {0}")]
    Config(String),
    #[error(
        "{stage} failed: Status: {code}, StatusText: {reason}, Body: {body}",
        code = .status.as_u16(),
        reason = .status.canonical_reason().unwrap_or("")
    )]
    Api {
        stage: Stage,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Did not receive a request_id from Fal.ai API.")]
    MissingRequestId,
    #[error("Fal.ai request failed: {0}")]
    JobFailed(String),
    #[error("Fal.ai request timed out after {attempts} attempts.")]
    Timeout { attempts: u32 },
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKind | Self::InvalidSetting { .. } | Self::Config(_) | Self::Io(_) => {
                ErrorKind::InvalidInput
            }
            Self::Api { .. } | Self::Http(_) => ErrorKind::TransportFailure,
            Self::MissingRequestId | Self::JobFailed(_) | Self::Json(_) => {
                ErrorKind::ProtocolFailure
            }
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// The caller-facing rendering used when errors must not escape as `Err`.
    pub fn to_markdown(&self) -> String {
        format!("**Error:** {self}")
    }
}

pub type Result<T> = std::result::Result<T, FalError>;
