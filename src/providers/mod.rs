pub mod fal_queue;
pub mod variant;

pub use fal_queue::FalQueueImages;
pub use variant::{DEFAULT_BASE_URL, ModelVariant, PollPolicy};
