use std::path::Path;

use crate::shared::error::PipelineError;
use crate::shared::video_metadata::VideoMetadata;

/// Domain interface for reading a video's canvas size without decoding frames.
pub trait VideoProber: Send + Sync {
    fn probe(&self, video_path: &Path) -> Result<VideoMetadata, PipelineError>;
}
