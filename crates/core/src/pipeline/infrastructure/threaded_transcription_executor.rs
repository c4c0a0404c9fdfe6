use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::audio::domain::audio_buffer::AudioBuffer;
use crate::audio::domain::audio_source::AudioSource;
use crate::audio::domain::speech_recognizer::SpeechRecognizer;
use crate::audio::domain::transcript::{RecognitionResult, Transcript};
use crate::pipeline::transcription_executor::{
    window_count, TranscriptionConfig, TranscriptionExecutor,
};
use crate::shared::error::{PipelineError, RecognitionError};

type ChunkResult = Result<RecognitionResult, RecognitionError>;

/// Flags shared between the dispatching thread and the recognition workers.
#[derive(Clone)]
struct Abort {
    failed: Arc<AtomicBool>,
    timed_out: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Abort {
    /// Returns true once no further windows should be recognized.
    fn check(&self) -> bool {
        if self.failed.load(Ordering::Relaxed) || self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.timed_out.store(true, Ordering::Relaxed);
            return true;
        }
        self.timed_out.load(Ordering::Relaxed)
    }
}

/// Recognizes audio windows on a fixed pool of worker threads.
///
/// Layout: `dispatch (caller thread) → bounded queue → N recognizers → results`
///
/// The bounded queue caps how many windows are held in memory; reading pauses
/// while every worker is busy and the queue is full. Results are collected in
/// completion order and sorted by sequence index before the transcript is built.
pub struct ThreadedTranscriptionExecutor {
    workers: usize,
}

impl ThreadedTranscriptionExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl Default for ThreadedTranscriptionExecutor {
    fn default() -> Self {
        Self::new(
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        )
    }
}

impl TranscriptionExecutor for ThreadedTranscriptionExecutor {
    fn execute(
        &self,
        mut source: Box<dyn AudioSource>,
        recognizer: Arc<dyn SpeechRecognizer>,
        config: TranscriptionConfig,
    ) -> Result<Transcript, PipelineError> {
        let start = Instant::now();
        let total_windows = source
            .total_samples()
            .map(|n| window_count(n, config.chunk_size))
            .unwrap_or(0);
        let workers = if total_windows > 0 {
            self.workers.min(total_windows)
        } else {
            self.workers
        };

        let abort = Abort {
            failed: Arc::new(AtomicBool::new(false)),
            timed_out: Arc::new(AtomicBool::new(false)),
            cancelled: config.cancelled.clone(),
            deadline: config.deadline,
        };

        let (job_tx, job_rx) = crossbeam_channel::bounded::<AudioBuffer>(config.max_queued_chunks.max(1));
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<ChunkResult>();

        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|_| {
                spawn_worker(
                    recognizer.clone(),
                    job_rx.clone(),
                    result_tx.clone(),
                    abort.clone(),
                )
            })
            .collect();
        drop(job_rx);
        drop(result_tx);

        let dispatched = dispatch_windows(&mut *source, &job_tx, &config, total_windows, &abort);
        drop(job_tx);

        let (results, first_error) = collect_results(result_rx);
        let panicked = join_workers(handles);

        let dispatched = dispatched?;
        if let Some(e) = first_error {
            log::warn!("Aborting transcription: {e}");
            return Err(e.into());
        }
        if panicked > 0 {
            return Err(PipelineError::WorkerPanicked {
                context: format!("{panicked} recognition worker(s)"),
            });
        }
        if abort.cancelled.load(Ordering::Relaxed) {
            return Err(PipelineError::Cancelled);
        }
        if abort.timed_out.load(Ordering::Relaxed) {
            return Err(PipelineError::TimedOut {
                stage: "transcription",
            });
        }

        let transcript = Transcript::assemble(results);
        log::info!(
            "Transcription completed in {:.2} seconds ({dispatched} chunks, {} with speech)",
            start.elapsed().as_secs_f64(),
            transcript.len()
        );
        Ok(transcript)
    }
}

/// Reads fixed windows from `source`, tags them with a sequence index and
/// queues them for recognition. Returns the number of windows dispatched.
fn dispatch_windows(
    source: &mut dyn AudioSource,
    job_tx: &Sender<AudioBuffer>,
    config: &TranscriptionConfig,
    total_windows: usize,
    abort: &Abort,
) -> Result<usize, PipelineError> {
    let sample_rate = source.sample_rate();
    let mut index = 0;

    loop {
        if abort.check() {
            break;
        }

        let samples = source.read_window(config.chunk_size)?;
        if samples.is_empty() {
            break;
        }

        if index % config.progress_every.max(1) == 0 {
            if let Some(ref callback) = config.on_progress {
                callback(index, total_windows);
            }
        }

        log::debug!("Dispatching chunk {index} ({} samples)", samples.len());
        if job_tx
            .send(AudioBuffer::new(index, samples, sample_rate))
            .is_err()
        {
            // Every worker has exited; the join reports why.
            break;
        }
        index += 1;
    }

    Ok(index)
}

fn spawn_worker(
    recognizer: Arc<dyn SpeechRecognizer>,
    job_rx: Receiver<AudioBuffer>,
    result_tx: Sender<ChunkResult>,
    abort: Abort,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for buffer in job_rx {
            // Keep draining so a blocked dispatcher wakes up and sees the abort.
            if abort.check() {
                continue;
            }

            let result = recognizer
                .recognize(&buffer)
                .map(|text| RecognitionResult::new(buffer.index(), text));
            if result.is_err() {
                abort.failed.store(true, Ordering::Relaxed);
            }
            log::debug!("Chunk {} recognized", buffer.index());

            if result_tx.send(result).is_err() {
                break;
            }
        }
    })
}

/// Drains every result; returns successes in completion order and the first failure.
fn collect_results(
    result_rx: Receiver<ChunkResult>,
) -> (Vec<RecognitionResult>, Option<RecognitionError>) {
    let mut results = Vec::new();
    let mut first_error = None;

    for result in result_rx {
        match result {
            Ok(r) => results.push(r),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    (results, first_error)
}

/// Joins all workers and returns how many panicked.
fn join_workers(handles: Vec<JoinHandle<()>>) -> usize {
    handles
        .into_iter()
        .map(|h| h.join())
        .filter(|r| r.is_err())
        .count()
}
