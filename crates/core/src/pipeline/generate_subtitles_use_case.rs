use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::audio::domain::speech_recognizer::SpeechRecognizer;
use crate::audio::infrastructure::wav_audio_source::WavAudioSource;
use crate::pipeline::transcription_executor::{TranscriptionConfig, TranscriptionExecutor};
use crate::shared::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_QUEUED_CHUNKS, DEFAULT_PROGRESS_EVERY, SUBTITLE_EXTENSION,
};
use crate::shared::error::PipelineError;
use crate::shared::settings::Settings;
use crate::subtitle::domain::subtitle_synthesizer::SubtitleSynthesizer;
use crate::subtitle::domain::subtitle_writer::SubtitleWriter;
use crate::tasks::domain::task::{TaskId, TaskState};
use crate::video::domain::audio_extractor::{AudioExtractor, ExtractionLimits};
use crate::video::domain::video_prober::VideoProber;

/// Receives every state transition of a running job.
pub type StateReporter = Arc<dyn Fn(TaskState) + Send + Sync>;

/// Tunables for one pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub chunk_size: usize,
    pub max_queued_chunks: usize,
    pub progress_every: usize,
    pub extraction_timeout: Option<Duration>,
    pub transcription_timeout: Option<Duration>,
    /// Where the subtitle file goes. Defaults to the video's directory.
    pub output_dir: Option<PathBuf>,
    /// Where the intermediate PCM file goes. Defaults to the video's directory.
    pub work_dir: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_queued_chunks: DEFAULT_MAX_QUEUED_CHUNKS,
            progress_every: DEFAULT_PROGRESS_EVERY,
            extraction_timeout: None,
            transcription_timeout: None,
            output_dir: None,
            work_dir: None,
        }
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            max_queued_chunks: settings.max_queued_chunks,
            progress_every: settings.progress_every,
            extraction_timeout: settings.extraction_timeout(),
            transcription_timeout: settings.transcription_timeout(),
            output_dir: settings.output_dir.clone(),
            work_dir: settings.work_dir.clone(),
        }
    }
}

/// One video to process.
pub struct PipelineJob {
    pub task_id: TaskId,
    pub video_path: PathBuf,
    pub cancelled: Arc<AtomicBool>,
}

/// Intermediate PCM file, removed when dropped.
struct IntermediateAudio {
    path: PathBuf,
}

impl Drop for IntermediateAudio {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed intermediate audio {}", self.path.display()),
            Err(e) => log::warn!(
                "Failed to remove intermediate audio {}: {e}",
                self.path.display()
            ),
        }
    }
}

/// Runs extraction → transcription → synthesis for a single video.
pub struct GenerateSubtitlesUseCase {
    extractor: Box<dyn AudioExtractor>,
    prober: Box<dyn VideoProber>,
    recognizer: Arc<dyn SpeechRecognizer>,
    executor: Box<dyn TranscriptionExecutor>,
    synthesizer: SubtitleSynthesizer,
    writer: Box<dyn SubtitleWriter>,
    options: PipelineOptions,
    /// Subtitle paths written or being written by jobs of this use case.
    claimed_outputs: Mutex<HashSet<PathBuf>>,
}

impl GenerateSubtitlesUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        extractor: Box<dyn AudioExtractor>,
        prober: Box<dyn VideoProber>,
        recognizer: Arc<dyn SpeechRecognizer>,
        executor: Box<dyn TranscriptionExecutor>,
        synthesizer: SubtitleSynthesizer,
        writer: Box<dyn SubtitleWriter>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            extractor,
            prober,
            recognizer,
            executor,
            synthesizer,
            writer,
            options,
            claimed_outputs: Mutex::new(HashSet::new()),
        }
    }

    /// Preferred subtitle path for `video_path`: `<stem>.ass` in the output directory.
    pub fn output_path(&self, video_path: &Path) -> PathBuf {
        let dir = self
            .options
            .output_dir
            .clone()
            .unwrap_or_else(|| parent_dir(video_path));
        dir.join(format!("{}.{SUBTITLE_EXTENSION}", file_stem(video_path)))
    }

    /// Reserves the subtitle path for `job`.
    ///
    /// The first job gets the preferred path. While that path is held, other
    /// jobs with the same stem get `<stem>.<taskId>.ass`. Paths of completed
    /// jobs stay reserved so a finished task's result is never overwritten.
    fn claim_output(&self, job: &PipelineJob) -> PathBuf {
        let preferred = self.output_path(&job.video_path);
        let mut claimed = self
            .claimed_outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let path = if claimed.contains(&preferred) {
            preferred.with_file_name(format!(
                "{}.{}.{SUBTITLE_EXTENSION}",
                file_stem(&job.video_path),
                job.task_id
            ))
        } else {
            preferred
        };
        claimed.insert(path.clone());
        path
    }

    fn release_output(&self, path: &Path) {
        self.claimed_outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }

    fn audio_path(&self, job: &PipelineJob) -> PathBuf {
        let dir = self
            .options
            .work_dir
            .clone()
            .unwrap_or_else(|| parent_dir(&job.video_path));
        dir.join(format!("{}.{}.wav", file_stem(&job.video_path), job.task_id))
    }

    /// Returns the path of the written subtitle file.
    ///
    /// The intermediate audio file never outlives this call, whatever the outcome.
    pub fn run(&self, job: &PipelineJob, report: StateReporter) -> Result<PathBuf, PipelineError> {
        report(TaskState::Processing);
        ensure_active(job)?;

        // 1. Extract audio
        let audio = IntermediateAudio {
            path: self.audio_path(job),
        };
        let limits = ExtractionLimits {
            deadline: self.options.extraction_timeout.map(|t| Instant::now() + t),
            cancelled: &job.cancelled,
        };
        self.extractor
            .extract(&job.video_path, &audio.path, &limits)?;
        report(TaskState::AudioExtracted);
        ensure_active(job)?;

        // 2. Transcribe in parallel chunks
        let source = WavAudioSource::open(&audio.path)?;
        let progress_report = report.clone();
        let config = TranscriptionConfig {
            chunk_size: self.options.chunk_size,
            max_queued_chunks: self.options.max_queued_chunks,
            progress_every: self.options.progress_every,
            on_progress: Some(Box::new(move |dispatched, total| {
                let progress = if total > 0 {
                    dispatched as f64 / total as f64
                } else {
                    0.0
                };
                progress_report(TaskState::Transcribing { progress });
            })),
            cancelled: job.cancelled.clone(),
            deadline: self
                .options
                .transcription_timeout
                .map(|t| Instant::now() + t),
        };
        let transcript = self
            .executor
            .execute(Box::new(source), self.recognizer.clone(), config);
        drop(audio);
        let transcript = transcript?;
        report(TaskState::TranscriptionComplete);
        ensure_active(job)?;

        // 3. Synthesize subtitles sized to the video canvas
        let video = self.prober.probe(&job.video_path)?;
        let document = self.synthesizer.synthesize(&transcript, &video);
        let output_path = self.claim_output(job);
        if let Err(e) = self.writer.write(&output_path, &document) {
            self.release_output(&output_path);
            return Err(e);
        }
        log::info!(
            "Wrote {} subtitle events to {}",
            document.events().len(),
            output_path.display()
        );
        report(TaskState::SubtitleCreated);

        Ok(output_path)
    }
}

fn ensure_active(job: &PipelineJob) -> Result<(), PipelineError> {
    if job.cancelled.load(Ordering::Relaxed) {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}
