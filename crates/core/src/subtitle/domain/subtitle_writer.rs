use std::path::Path;

use super::subtitle_document::SubtitleDocument;
use crate::shared::error::PipelineError;

/// Persists a finished subtitle document.
///
/// Readers must never observe a partially written file at `path`.
pub trait SubtitleWriter: Send + Sync {
    fn write(&self, path: &Path, document: &SubtitleDocument) -> Result<(), PipelineError>;
}
