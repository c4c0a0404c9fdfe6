pub mod constants;
pub mod error;
pub mod model_resolver;
pub mod settings;
pub mod video_metadata;
