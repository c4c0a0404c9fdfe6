use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use uuid::Uuid;

/// Opaque identifier of a submitted job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Where a task is in the pipeline.
///
/// `Queued → Processing → AudioExtracted → Transcribing → TranscriptionComplete
/// → SubtitleCreated → Completed`. Any stage may end in `Error` or `Cancelled`.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskState {
    Queued,
    Processing,
    AudioExtracted,
    /// Fraction of audio windows dispatched, in `[0.0, 1.0]`.
    Transcribing { progress: f64 },
    TranscriptionComplete,
    SubtitleCreated,
    Completed,
    Error(String),
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Error(_) | TaskState::Cancelled
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Queued => write!(f, "Queued"),
            TaskState::Processing => write!(f, "Processing"),
            TaskState::AudioExtracted => write!(f, "Audio extracted"),
            TaskState::Transcribing { progress } => write!(f, "Transcribing: {progress:.2}"),
            TaskState::TranscriptionComplete => write!(f, "Transcription complete"),
            TaskState::SubtitleCreated => write!(f, "Subtitle created"),
            TaskState::Completed => write!(f, "Completed"),
            TaskState::Error(message) => write!(f, "Error: {message}"),
            TaskState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

pub const NOT_FOUND_STATUS: &str = "Not found";

/// Point-in-time view of a task, as returned to observers.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskStatus {
    /// `None` when the id is unknown or was evicted.
    pub state: Option<TaskState>,
    /// Path of the subtitle artifact once the task has completed.
    pub result: Option<PathBuf>,
}

impl TaskStatus {
    pub fn not_found() -> Self {
        Self {
            state: None,
            result: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.state.is_none()
    }

    /// Human-readable status line; error messages are included verbatim.
    pub fn status(&self) -> String {
        self.state
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| NOT_FOUND_STATUS.to_string())
    }
}
