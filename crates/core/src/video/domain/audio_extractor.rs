use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use crate::shared::error::PipelineError;

/// Limits applied to a single extraction run.
pub struct ExtractionLimits<'a> {
    pub deadline: Option<Instant>,
    pub cancelled: &'a AtomicBool,
}

/// Domain interface for pulling the audio track out of a video file.
pub trait AudioExtractor: Send + Sync {
    /// Writes the audio of `video_path` to `output_path` as mono 16-bit 16 kHz PCM WAV.
    fn extract(
        &self,
        video_path: &Path,
        output_path: &Path,
        limits: &ExtractionLimits<'_>,
    ) -> Result<(), PipelineError>;
}
