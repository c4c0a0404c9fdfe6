use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use subtitler_core::audio::infrastructure::whisper_recognizer::WhisperRecognizer;
use subtitler_core::pipeline::generate_subtitles_use_case::{
    GenerateSubtitlesUseCase, PipelineOptions,
};
use subtitler_core::pipeline::infrastructure::threaded_transcription_executor::ThreadedTranscriptionExecutor;
use subtitler_core::shared::constants::{VIDEO_EXTENSIONS, WHISPER_MODEL_NAME, WHISPER_MODEL_URL};
use subtitler_core::shared::model_resolver::{self, DownloadPolicy, ModelResolveError};
use subtitler_core::shared::settings::{Settings, TimingMode};
use subtitler_core::subtitle::domain::subtitle_synthesizer::SubtitleSynthesizer;
use subtitler_core::subtitle::infrastructure::ass_file_writer::AssFileWriter;
use subtitler_core::tasks::domain::task::{TaskId, TaskState};
use subtitler_core::tasks::task_manager::{TaskManager, TaskManagerConfig};
use subtitler_core::video::infrastructure::ffmpeg_audio_extractor::FfmpegAudioExtractor;
use subtitler_core::video::infrastructure::ffmpeg_video_prober::FfmpegVideoProber;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Generate ASS subtitles for videos with local speech recognition.
#[derive(Parser)]
#[command(name = "subtitler")]
struct Cli {
    /// Input video files (mp4, avi, mov, mkv).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Whisper model file. Defaults to the cached ggml-base model.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Download the default model if it is not cached yet.
    #[arg(long)]
    download_model: bool,

    /// JSON settings file. Flags below override its values.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Recognition threads per video (0 = all cores).
    #[arg(long)]
    workers: Option<usize>,

    /// Samples per recognition window (16 kHz mono).
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Subtitle timing: fixed or chunk-offset.
    #[arg(long, value_parser = parse_timing)]
    timing: Option<TimingMode>,

    /// Recognition language code.
    #[arg(long)]
    language: Option<String>,

    /// Videos processed at the same time.
    #[arg(long)]
    max_tasks: Option<usize>,

    /// Directory for subtitle files. Defaults to each video's directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let settings = build_settings(&cli)?;

    let model_path = resolve_model(&cli)?;
    let workers = settings.recognition_threads();
    let recognizer = WhisperRecognizer::new(&model_path, &settings.language)?
        .with_threads_per_call(threads_per_call(workers, settings.max_concurrent_tasks));

    let use_case = GenerateSubtitlesUseCase::new(
        Box::new(FfmpegAudioExtractor),
        Box::new(FfmpegVideoProber),
        Arc::new(recognizer),
        Box::new(ThreadedTranscriptionExecutor::new(workers)),
        SubtitleSynthesizer::from_settings(&settings),
        Box::new(AssFileWriter),
        PipelineOptions::from_settings(&settings),
    );
    let manager = TaskManager::new(use_case, TaskManagerConfig::from_settings(&settings));

    // More inputs than queue slots: wait for room rather than reject.
    let mut tasks = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let id = manager.submit_blocking(input)?;
        tasks.push((id, input.clone()));
    }

    let failed = wait_for_tasks(&manager, &tasks);
    manager.shutdown();

    if failed > 0 {
        return Err(format!("{failed} of {} video(s) failed", tasks.len()).into());
    }
    Ok(())
}

/// Polls every task until it finishes, printing each subtitle path as it lands.
/// Returns the number of tasks that did not complete.
fn wait_for_tasks(manager: &TaskManager, tasks: &[(TaskId, PathBuf)]) -> usize {
    let mut last_seen: HashMap<TaskId, String> = HashMap::new();
    let mut failed = 0;
    let mut remaining: Vec<&(TaskId, PathBuf)> = tasks.iter().collect();

    while !remaining.is_empty() {
        remaining.retain(|(id, input)| {
            let status = manager.get_status(id);
            let line = status.status();
            if last_seen.get(id) != Some(&line) {
                log::info!("{}: {line}", input.display());
                last_seen.insert(*id, line.clone());
            }

            match status.state {
                Some(TaskState::Completed) => {
                    if let Some(path) = &status.result {
                        println!("{}", path.display());
                    }
                    false
                }
                Some(ref state) if state.is_terminal() => {
                    eprintln!("{}: {line}", input.display());
                    failed += 1;
                    false
                }
                Some(_) => true,
                None => {
                    eprintln!("{}: task disappeared", input.display());
                    failed += 1;
                    false
                }
            }
        });
        if !remaining.is_empty() {
            std::thread::sleep(POLL_INTERVAL);
        }
    }
    failed
}

fn build_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(workers) = cli.workers {
        settings.recognition_workers = workers;
    }
    if let Some(chunk_size) = cli.chunk_size {
        settings.chunk_size = chunk_size;
    }
    if let Some(timing) = cli.timing {
        settings.timing = timing;
    }
    if let Some(language) = &cli.language {
        settings.language = language.clone();
    }
    if let Some(max_tasks) = cli.max_tasks {
        settings.max_concurrent_tasks = max_tasks;
    }
    if let Some(dir) = &cli.output_dir {
        settings.output_dir = Some(dir.clone());
    }
    settings.validate()?;
    Ok(settings)
}

fn resolve_model(cli: &Cli) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.model {
        return Ok(path.clone());
    }

    log::info!("Resolving model: {WHISPER_MODEL_NAME}");
    let policy = if cli.download_model {
        DownloadPolicy::Allowed(Some(Box::new(download_progress)))
    } else {
        DownloadPolicy::Never
    };
    match model_resolver::resolve(WHISPER_MODEL_NAME, WHISPER_MODEL_URL, None, policy) {
        Ok(path) => {
            if cli.download_model {
                eprintln!();
            }
            Ok(path)
        }
        Err(e @ ModelResolveError::NotInstalled { .. }) => {
            Err(format!("{e}; pass --download-model or --model <path>").into())
        }
        Err(e) => Err(e.into()),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for input in &cli.inputs {
        if !input.is_file() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
        if !is_video(input) {
            return Err(format!(
                "Unsupported file type: {} (expected one of: {})",
                input.display(),
                VIDEO_EXTENSIONS.join(", ")
            )
            .into());
        }
    }
    if let Some(dir) = &cli.output_dir {
        if !dir.is_dir() {
            return Err(format!("Output directory not found: {}", dir.display()).into());
        }
    }
    if cli.model.is_some() && cli.download_model {
        return Err("--model and --download-model are mutually exclusive".into());
    }
    Ok(())
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn parse_timing(value: &str) -> Result<TimingMode, String> {
    match value {
        "fixed" => Ok(TimingMode::Fixed),
        "chunk-offset" => Ok(TimingMode::ChunkOffset),
        other => Err(format!(
            "timing must be 'fixed' or 'chunk-offset', got '{other}'"
        )),
    }
}

/// Spreads spare cores across concurrent recognition calls.
fn threads_per_call(workers: usize, tasks: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores / (workers * tasks).max(1)).max(1)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading speech recognition model... {pct}%");
    } else {
        eprint!("\rDownloading speech recognition model... {downloaded} bytes");
    }
}
