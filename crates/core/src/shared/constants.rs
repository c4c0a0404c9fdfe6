pub const WHISPER_MODEL_NAME: &str = "ggml-base.bin";
pub const WHISPER_MODEL_URL: &str =
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin";

/// PCM format produced by audio extraction and consumed by recognition.
pub const PCM_SAMPLE_RATE: u32 = 16000;
pub const PCM_CHANNELS: u16 = 1;
pub const PCM_BITS_PER_SAMPLE: u16 = 16;

/// 2.5 seconds of mono audio at 16 kHz.
pub const DEFAULT_CHUNK_SIZE: usize = 40_000;
pub const DEFAULT_PROGRESS_EVERY: usize = 10;
pub const DEFAULT_MAX_QUEUED_CHUNKS: usize = 64;

pub const DEFAULT_EVENT_DURATION_SECS: f64 = 2.0;

pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 2;
pub const DEFAULT_TASK_QUEUE_CAPACITY: usize = 16;
pub const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 600;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];
pub const SUBTITLE_EXTENSION: &str = "ass";
