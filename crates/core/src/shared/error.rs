use std::path::PathBuf;

use thiserror::Error;

/// Failure while recognizing a single audio chunk.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("recognition failed on chunk {index}: {message}")]
pub struct RecognitionError {
    pub index: usize,
    pub message: String,
}

impl RecognitionError {
    pub fn new(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            message: message.into(),
        }
    }
}

/// Errors raised by any stage of the subtitle generation pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("audio extraction failed for {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("could not probe video {path}: {message}")]
    Probe { path: PathBuf, message: String },

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error("recognition model unavailable at {path}: {message}")]
    ModelUnavailable { path: PathBuf, message: String },

    #[error("could not read audio {path}: {message}")]
    Audio { path: PathBuf, message: String },

    #[error("failed to write subtitles to {path}: {source}")]
    SubtitleWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("{stage} timed out")]
    TimedOut { stage: &'static str },

    #[error("{context} panicked")]
    WorkerPanicked { context: String },
}

impl PipelineError {
    pub fn extraction(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn probe(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Probe {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn audio(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Audio {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
