use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use crate::audio::domain::audio_source::AudioSource;
use crate::audio::domain::speech_recognizer::SpeechRecognizer;
use crate::audio::domain::transcript::Transcript;
use crate::shared::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_QUEUED_CHUNKS, DEFAULT_PROGRESS_EVERY,
};
use crate::shared::error::PipelineError;

/// Progress callback: `(windows_dispatched, total_windows)`.
/// `total_windows` is 0 when the source length is unknown.
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send>;

/// Configuration for one transcription pass.
pub struct TranscriptionConfig {
    /// Samples per recognition window.
    pub chunk_size: usize,
    /// Windows allowed to wait for a free worker before reading pauses.
    pub max_queued_chunks: usize,
    /// Report progress every N dispatched windows.
    pub progress_every: usize,
    pub on_progress: Option<ProgressFn>,
    pub cancelled: Arc<AtomicBool>,
    pub deadline: Option<Instant>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_queued_chunks: DEFAULT_MAX_QUEUED_CHUNKS,
            progress_every: DEFAULT_PROGRESS_EVERY,
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }
}

/// Number of windows `total_samples` splits into, counting a trailing partial window.
pub fn window_count(total_samples: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    total_samples.div_ceil(chunk_size)
}

/// Turns a PCM source into an ordered transcript.
///
/// This is a port. Infrastructure decides how windows are scheduled, but every
/// implementation must return entries in sequence order regardless of the
/// order recognition finishes in, and must fail as a whole if any window fails.
pub trait TranscriptionExecutor: Send + Sync {
    fn execute(
        &self,
        source: Box<dyn AudioSource>,
        recognizer: Arc<dyn SpeechRecognizer>,
        config: TranscriptionConfig,
    ) -> Result<Transcript, PipelineError>;
}
