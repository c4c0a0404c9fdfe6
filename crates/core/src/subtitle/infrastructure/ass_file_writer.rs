use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::shared::error::PipelineError;
use crate::subtitle::domain::subtitle_document::SubtitleDocument;
use crate::subtitle::domain::subtitle_writer::SubtitleWriter;

/// Writes `.ass` scripts atomically: render to a temp file next to the
/// destination, then rename over it.
///
/// Every write gets its own temp file, so concurrent writes to the same
/// destination never share an inode. The last rename wins.
pub struct AssFileWriter;

impl AssFileWriter {
    fn temp_path(path: &Path) -> PathBuf {
        let mut name = std::ffi::OsString::from(".");
        name.push(path.file_name().unwrap_or_default());
        name.push(format!(".{}.part", Uuid::new_v4().simple()));
        path.with_file_name(name)
    }
}

impl SubtitleWriter for AssFileWriter {
    fn write(&self, path: &Path, document: &SubtitleDocument) -> Result<(), PipelineError> {
        let temp_path = Self::temp_path(path);

        let result = write_file(&temp_path, document).and_then(|()| {
            fs::rename(&temp_path, path).map_err(|e| PipelineError::SubtitleWrite {
                path: path.to_path_buf(),
                source: e,
            })
        });

        if result.is_err() && temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }
}

fn write_file(path: &Path, document: &SubtitleDocument) -> Result<(), PipelineError> {
    let to_err = |e| PipelineError::SubtitleWrite {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = fs::File::create(path).map_err(to_err)?;
    file.write_all(document.render().as_bytes())
        .map_err(to_err)?;
    file.sync_all().map_err(to_err)
}
