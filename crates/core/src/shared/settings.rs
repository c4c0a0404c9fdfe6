use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_EVENT_DURATION_SECS, DEFAULT_EXTRACTION_TIMEOUT_SECS,
    DEFAULT_MAX_CONCURRENT_TASKS, DEFAULT_MAX_QUEUED_CHUNKS, DEFAULT_PROGRESS_EVERY,
    DEFAULT_TASK_QUEUE_CAPACITY,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// How dialogue events are placed on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TimingMode {
    /// Back-to-back events of a fixed duration, one per non-empty chunk.
    #[default]
    Fixed,
    /// Each event starts at its chunk's offset in the audio stream.
    ChunkOffset,
}

impl std::fmt::Display for TimingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimingMode::Fixed => write!(f, "fixed"),
            TimingMode::ChunkOffset => write!(f, "chunk-offset"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Samples per recognition window.
    pub chunk_size: usize,
    /// Recognition threads per task. 0 uses the available parallelism.
    pub recognition_workers: usize,
    /// Windows allowed to wait for a free recognition thread.
    pub max_queued_chunks: usize,
    /// Report transcription progress every N dispatched windows.
    pub progress_every: usize,
    pub timing: TimingMode,
    pub event_duration_secs: f64,
    pub language: String,
    pub max_concurrent_tasks: usize,
    pub task_queue_capacity: usize,
    /// Terminal tasks older than this are evicted from the registry.
    pub retention_secs: Option<u64>,
    pub extraction_timeout_secs: Option<u64>,
    pub transcription_timeout_secs: Option<u64>,
    pub output_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            recognition_workers: 0,
            max_queued_chunks: DEFAULT_MAX_QUEUED_CHUNKS,
            progress_every: DEFAULT_PROGRESS_EVERY,
            timing: TimingMode::Fixed,
            event_duration_secs: DEFAULT_EVENT_DURATION_SECS,
            language: "en".to_string(),
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            task_queue_capacity: DEFAULT_TASK_QUEUE_CAPACITY,
            retention_secs: None,
            extraction_timeout_secs: Some(DEFAULT_EXTRACTION_TIMEOUT_SECS),
            transcription_timeout_secs: None,
            output_dir: None,
            work_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Self = serde_json::from_str(&json).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size", "must be greater than zero"));
        }
        if self.progress_every == 0 {
            return Err(invalid("progress_every", "must be greater than zero"));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(invalid("max_concurrent_tasks", "must be greater than zero"));
        }
        if !self.event_duration_secs.is_finite() || self.event_duration_secs <= 0.0 {
            return Err(invalid(
                "event_duration_secs",
                format!("must be a positive finite number, got {}", self.event_duration_secs),
            ));
        }
        if self.language.trim().is_empty() {
            return Err(invalid("language", "must not be empty"));
        }
        Ok(())
    }

    /// Resolved recognition thread count.
    pub fn recognition_threads(&self) -> usize {
        if self.recognition_workers > 0 {
            self.recognition_workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    pub fn retention(&self) -> Option<Duration> {
        self.retention_secs.map(Duration::from_secs)
    }

    pub fn extraction_timeout(&self) -> Option<Duration> {
        self.extraction_timeout_secs.map(Duration::from_secs)
    }

    pub fn transcription_timeout(&self) -> Option<Duration> {
        self.transcription_timeout_secs.map(Duration::from_secs)
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        field,
        message: message.into(),
    }
}
