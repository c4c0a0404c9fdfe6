use super::audio_buffer::AudioBuffer;
use crate::shared::error::RecognitionError;

/// Domain interface for speech-to-text recognition of one buffer.
///
/// Called concurrently from several worker threads. Implementations must not
/// share mutable decoder state between calls; only the loaded model may be shared.
pub trait SpeechRecognizer: Send + Sync {
    /// Returns the recognized text, possibly empty. Errors carry the buffer's index.
    fn recognize(&self, buffer: &AudioBuffer) -> Result<String, RecognitionError>;
}
