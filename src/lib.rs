mod error;
pub mod image;
mod profile;
pub mod render;

pub mod providers;
pub mod types;
pub mod utils;

#[cfg(feature = "cli")]
pub mod logging;

pub use error::{ErrorKind, FalError, Result, Stage};
pub use profile::{
    Env, FalConfig, PollOverrides, ProviderSettings, SettingDefaults, UserSettings, parse_dotenv,
};

pub use image::ImageGenerationModel;
pub use providers::{FalQueueImages, ModelVariant, PollPolicy};
pub use types::{
    GeneratedImage, GenerationKind, GenerationParams, GenerationRequest, GenerationResult,
    ImageCaption, JobHandle, JobStatus,
};
