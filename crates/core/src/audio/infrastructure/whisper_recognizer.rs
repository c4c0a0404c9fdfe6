use std::path::Path;

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::audio::domain::speech_recognizer::SpeechRecognizer;
use crate::shared::error::{PipelineError, RecognitionError};

/// Speech recognizer using whisper.cpp via whisper-rs.
///
/// The model is loaded once and shared read-only. Every `recognize` call
/// creates its own decoder state, so concurrent calls never share mutable state.
pub struct WhisperRecognizer {
    context: WhisperContext,
    language: String,
    threads_per_call: i32,
}

impl WhisperRecognizer {
    /// Loads the model, failing fast if it is missing or unreadable.
    pub fn new(model_path: &Path, language: &str) -> Result<Self, PipelineError> {
        if !model_path.exists() {
            return Err(PipelineError::ModelUnavailable {
                path: model_path.to_path_buf(),
                message: "model file not found".to_string(),
            });
        }

        let path_str = model_path
            .to_str()
            .ok_or_else(|| PipelineError::ModelUnavailable {
                path: model_path.to_path_buf(),
                message: "model path is not valid UTF-8".to_string(),
            })?;

        let context =
            WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
                .map_err(|e| PipelineError::ModelUnavailable {
                    path: model_path.to_path_buf(),
                    message: format!("failed to load Whisper model: {e}"),
                })?;

        log::info!("Loaded Whisper model from {}", model_path.display());

        Ok(Self {
            context,
            language: language.to_string(),
            threads_per_call: 1,
        })
    }

    /// Inference threads used inside a single `recognize` call.
    ///
    /// Parallelism normally comes from running many calls at once, so this stays at 1
    /// unless the recognition pool is smaller than the machine.
    pub fn with_threads_per_call(mut self, threads: usize) -> Self {
        self.threads_per_call = threads.max(1) as i32;
        self
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn recognize(&self, buffer: &AudioBuffer) -> Result<String, RecognitionError> {
        let index = buffer.index();

        let mut state = self
            .context
            .create_state()
            .map_err(|e| RecognitionError::new(index, format!("failed to create Whisper state: {e}")))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(&self.language));
        params.set_translate(false);
        params.set_no_context(true);
        params.set_single_segment(true);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_n_threads(self.threads_per_call);

        let samples = buffer.to_f32();
        state
            .full(params, &samples)
            .map_err(|e| RecognitionError::new(index, format!("Whisper inference failed: {e}")))?;

        let mut text = String::new();
        let num_segments = state.full_n_segments();

        for seg_idx in 0..num_segments {
            let segment = match state.get_segment(seg_idx) {
                Some(s) => s,
                None => continue,
            };

            for tok_idx in 0..segment.n_tokens() {
                let token = match segment.get_token(tok_idx) {
                    Some(t) => t,
                    None => continue,
                };

                let piece = match token.to_str() {
                    Ok(t) => t,
                    Err(_) => continue,
                };

                // Special tokens look like [_BEG_], [_SOT_], <|endoftext|>
                let trimmed = piece.trim();
                if trimmed.starts_with('[') || trimmed.starts_with('<') {
                    continue;
                }
                text.push_str(piece);
            }
        }

        Ok(text.trim().to_string())
    }
}
