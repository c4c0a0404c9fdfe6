use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use thiserror::Error;

use crate::pipeline::generate_subtitles_use_case::{
    GenerateSubtitlesUseCase, PipelineJob, StateReporter,
};
use crate::shared::constants::{DEFAULT_MAX_CONCURRENT_TASKS, DEFAULT_TASK_QUEUE_CAPACITY};
use crate::shared::error::PipelineError;
use crate::shared::settings::Settings;
use crate::tasks::domain::task::{TaskId, TaskState, TaskStatus};
use crate::tasks::task_registry::{RetentionPolicy, TaskRegistry};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubmitError {
    #[error("task queue is full ({capacity} tasks waiting)")]
    QueueFull { capacity: usize },
    #[error("task manager is shutting down")]
    ShuttingDown,
}

#[derive(Clone, Copy, Debug)]
pub struct TaskManagerConfig {
    /// Pipelines allowed to run at the same time.
    pub max_concurrent_tasks: usize,
    /// Submitted tasks allowed to wait for a free pipeline slot.
    pub queue_capacity: usize,
    pub retention: RetentionPolicy,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            queue_capacity: DEFAULT_TASK_QUEUE_CAPACITY,
            retention: RetentionPolicy::UntilAcknowledged,
        }
    }
}

impl TaskManagerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_concurrent_tasks: settings.max_concurrent_tasks,
            queue_capacity: settings.task_queue_capacity,
            retention: settings
                .retention()
                .map(RetentionPolicy::ExpireAfter)
                .unwrap_or(RetentionPolicy::UntilAcknowledged),
        }
    }
}

/// Accepts videos, runs their pipelines in the background and tracks each
/// one as a task that callers poll by id.
///
/// A fixed pool of task workers pulls jobs from a bounded queue. Once the
/// queue is full, `submit` is rejected and `submit_blocking` waits for room.
pub struct TaskManager {
    registry: Arc<TaskRegistry>,
    sender: Option<Sender<PipelineJob>>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl TaskManager {
    pub fn new(use_case: GenerateSubtitlesUseCase, config: TaskManagerConfig) -> Self {
        let registry = Arc::new(TaskRegistry::new(config.retention));
        let use_case = Arc::new(use_case);
        let (sender, receiver) = crossbeam_channel::bounded(config.queue_capacity);

        let workers = (0..config.max_concurrent_tasks.max(1))
            .map(|_| spawn_task_worker(use_case.clone(), registry.clone(), receiver.clone()))
            .collect();

        log::info!(
            "Task manager started with {} worker(s), queue capacity {}",
            config.max_concurrent_tasks.max(1),
            config.queue_capacity
        );

        Self {
            registry,
            sender: Some(sender),
            workers,
            queue_capacity: config.queue_capacity,
        }
    }

    /// Queues `video_path` for processing and returns immediately.
    pub fn submit(&self, video_path: &Path) -> Result<TaskId, SubmitError> {
        self.enqueue(video_path, |sender, job| match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SubmitError::QueueFull {
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(SubmitError::ShuttingDown),
        })
    }

    /// Queues `video_path`, waiting for a free queue slot if necessary.
    ///
    /// The task is registered as `Queued` before the wait, so it can be
    /// polled or cancelled while the caller is blocked.
    pub fn submit_blocking(&self, video_path: &Path) -> Result<TaskId, SubmitError> {
        self.enqueue(video_path, |sender, job| {
            sender.send(job).map_err(|_| SubmitError::ShuttingDown)
        })
    }

    fn enqueue(
        &self,
        video_path: &Path,
        send: impl FnOnce(&Sender<PipelineJob>, PipelineJob) -> Result<(), SubmitError>,
    ) -> Result<TaskId, SubmitError> {
        self.registry.evict_expired(Instant::now());
        let sender = self.sender.as_ref().ok_or(SubmitError::ShuttingDown)?;

        let (task_id, cancelled) = self.registry.register();
        let job = PipelineJob {
            task_id,
            video_path: video_path.to_path_buf(),
            cancelled,
        };
        match send(sender, job) {
            Ok(()) => {
                log::info!("Task {task_id} queued for {}", video_path.display());
                Ok(task_id)
            }
            Err(e) => {
                self.registry.remove(&task_id);
                Err(e)
            }
        }
    }

    /// Current state of a task. Unknown or evicted ids report "Not found".
    pub fn get_status(&self, task_id: &TaskId) -> TaskStatus {
        self.registry.status(task_id)
    }

    pub fn cancel(&self, task_id: &TaskId) -> bool {
        let accepted = self.registry.cancel(task_id);
        if accepted {
            log::warn!("Cancellation requested for task {task_id}");
        }
        accepted
    }

    /// Forgets a finished task. Running tasks are left alone.
    pub fn acknowledge(&self, task_id: &TaskId) -> bool {
        self.registry.acknowledge(task_id)
    }

    pub fn evict_expired(&self) -> usize {
        self.registry.evict_expired(Instant::now())
    }

    /// Stops accepting work, lets queued tasks finish, and joins the workers.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("A task worker exited abnormally");
            }
        }
        log::info!("Task manager stopped");
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_task_worker(
    use_case: Arc<GenerateSubtitlesUseCase>,
    registry: Arc<TaskRegistry>,
    jobs: Receiver<PipelineJob>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for job in jobs.iter() {
            run_task(&use_case, &registry, job);
        }
    })
}

fn run_task(use_case: &GenerateSubtitlesUseCase, registry: &Arc<TaskRegistry>, job: PipelineJob) {
    let task_id = job.task_id;
    if job.cancelled.load(Ordering::Relaxed) {
        registry.set_state(&task_id, TaskState::Cancelled);
        log::warn!("Task {task_id} cancelled before it started");
        return;
    }

    let reporter: StateReporter = {
        let registry = registry.clone();
        Arc::new(move |state| {
            registry.set_state(&task_id, state);
        })
    };

    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| use_case.run(&job, reporter)));
    match outcome {
        Ok(Ok(path)) => {
            log::info!(
                "Task {task_id} completed in {:.1}s: {}",
                start.elapsed().as_secs_f64(),
                path.display()
            );
            registry.complete(&task_id, path);
        }
        Ok(Err(PipelineError::Cancelled)) => {
            log::warn!("Task {task_id} cancelled");
            registry.set_state(&task_id, TaskState::Cancelled);
        }
        Ok(Err(e)) => {
            log::error!("Task {task_id} failed: {e}");
            registry.set_state(&task_id, TaskState::Error(e.to_string()));
        }
        Err(payload) => {
            let message = format!("pipeline panicked: {}", panic_message(payload.as_ref()));
            log::error!("Task {task_id} failed: {message}");
            registry.set_state(&task_id, TaskState::Error(message));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::generate_subtitles_use_case::test_support::*;
    use crate::pipeline::generate_subtitles_use_case::PipelineOptions;
    use crate::pipeline::infrastructure::threaded_transcription_executor::ThreadedTranscriptionExecutor;
    use crate::shared::video_metadata::VideoMetadata;
    use crate::subtitle::domain::subtitle_synthesizer::SubtitleSynthesizer;
    use crate::subtitle::infrastructure::ass_file_writer::AssFileWriter;
    use crate::video::domain::audio_extractor::{AudioExtractor, ExtractionLimits};
    use crate::video::domain::video_prober::VideoProber;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(workers: usize, capacity: usize) -> TaskManagerConfig {
        TaskManagerConfig {
            max_concurrent_tasks: workers,
            queue_capacity: capacity,
            retention: RetentionPolicy::UntilAcknowledged,
        }
    }

    fn wait_for_terminal(manager: &TaskManager, id: &TaskId) -> TaskStatus {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let status = manager.get_status(id);
            let done = status.state.as_ref().is_some_and(TaskState::is_terminal);
            if done || Instant::now() > deadline {
                return status;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|e| e == ext))
            .collect()
    }

    /// Blocks extraction until the test opens the gate.
    struct GatedExtractor {
        started: Sender<()>,
        gate: Receiver<()>,
        inner: StubExtractor,
    }

    impl AudioExtractor for GatedExtractor {
        fn extract(
            &self,
            video_path: &Path,
            output_path: &Path,
            limits: &ExtractionLimits<'_>,
        ) -> Result<(), PipelineError> {
            let _ = self.started.send(());
            let _ = self.gate.recv();
            self.inner.extract(video_path, output_path, limits)
        }
    }

    fn gated_manager(workers: usize, capacity: usize) -> (TaskManager, Receiver<()>, Sender<()>) {
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let use_case = GenerateSubtitlesUseCase::new(
            Box::new(GatedExtractor {
                started: started_tx,
                gate: gate_rx,
                inner: StubExtractor {
                    windows: 2,
                    fail: false,
                },
            }),
            Box::new(ok_prober()),
            Arc::new(ok_recognizer(2)),
            Box::new(ThreadedTranscriptionExecutor::new(2)),
            SubtitleSynthesizer::default(),
            Box::new(AssFileWriter),
            PipelineOptions {
                chunk_size: CHUNK,
                ..PipelineOptions::default()
            },
        );
        (
            TaskManager::new(use_case, config(workers, capacity)),
            started_rx,
            gate_tx,
        )
    }

    #[test]
    fn test_submitted_task_completes_with_result() {
        let tmp = TempDir::new().unwrap();
        let video = tmp.path().join("movie.mp4");
        let manager = TaskManager::new(
            use_case(
                StubExtractor {
                    windows: 3,
                    fail: false,
                },
                ok_prober(),
                ok_recognizer(3),
            ),
            config(1, 4),
        );

        let id = manager.submit(&video).unwrap();
        let status = wait_for_terminal(&manager, &id);

        assert_eq!(status.state, Some(TaskState::Completed));
        let result = status.result.unwrap();
        assert_eq!(result, tmp.path().join("movie.ass"));
        assert!(result.exists());
        assert!(files_with_extension(tmp.path(), "wav").is_empty());
    }

    #[test]
    fn test_recognition_error_sets_error_state() {
        let tmp = TempDir::new().unwrap();
        let manager = TaskManager::new(
            use_case(
                StubExtractor {
                    windows: 4,
                    fail: false,
                },
                ok_prober(),
                StubRecognizer {
                    fail_on: Some(2),
                    ..ok_recognizer(4)
                },
            ),
            config(1, 4),
        );

        let id = manager.submit(&tmp.path().join("movie.mp4")).unwrap();
        let status = wait_for_terminal(&manager, &id);

        assert!(matches!(status.state, Some(TaskState::Error(_))));
        assert!(status
            .status()
            .starts_with("Error: recognition failed on chunk 2"));
        assert_eq!(status.result, None);
        assert!(files_with_extension(tmp.path(), "ass").is_empty());
        assert!(files_with_extension(tmp.path(), "wav").is_empty());
    }

    #[test]
    fn test_unknown_task_is_not_found() {
        let manager = TaskManager::new(
            use_case(
                StubExtractor {
                    windows: 1,
                    fail: false,
                },
                ok_prober(),
                ok_recognizer(1),
            ),
            config(1, 1),
        );
        let status = manager.get_status(&TaskId::new());
        assert!(status.is_not_found());
        assert_eq!(status.status(), "Not found");
    }

    #[test]
    fn test_concurrent_tasks_are_independent() {
        let tmp = TempDir::new().unwrap();
        let manager = TaskManager::new(
            use_case(
                StubExtractor {
                    windows: 2,
                    fail: false,
                },
                ok_prober(),
                ok_recognizer(2),
            ),
            config(2, 4),
        );

        // The stub extractor cannot create audio next to a video in a missing directory.
        let broken = manager
            .submit(&tmp.path().join("missing").join("clip.mp4"))
            .unwrap();
        let good = manager.submit(&tmp.path().join("talk.mp4")).unwrap();

        let broken_status = wait_for_terminal(&manager, &broken);
        let good_status = wait_for_terminal(&manager, &good);

        assert!(broken_status.status().starts_with("Error: audio extraction failed"));
        assert_eq!(good_status.state, Some(TaskState::Completed));
        assert_eq!(good_status.result, Some(tmp.path().join("talk.ass")));
    }

    #[test]
    fn test_submit_rejects_when_queue_is_full() {
        let tmp = TempDir::new().unwrap();
        let (manager, started, gate) = gated_manager(1, 1);

        let first = manager.submit(&tmp.path().join("a.mp4")).unwrap();
        started.recv_timeout(Duration::from_secs(10)).unwrap();
        let second = manager.submit(&tmp.path().join("b.mp4")).unwrap();
        let rejected = manager.submit(&tmp.path().join("c.mp4"));

        assert_eq!(rejected, Err(SubmitError::QueueFull { capacity: 1 }));
        assert_eq!(manager.get_status(&second).state, Some(TaskState::Queued));

        drop(gate);
        assert_eq!(
            wait_for_terminal(&manager, &first).state,
            Some(TaskState::Completed)
        );
        assert_eq!(
            wait_for_terminal(&manager, &second).state,
            Some(TaskState::Completed)
        );
        assert!(!tmp.path().join("c.ass").exists());
    }

    #[test]
    fn test_submit_blocking_waits_for_queue_room() {
        let tmp = TempDir::new().unwrap();
        let (manager, started, gate) = gated_manager(1, 1);

        let first = manager.submit(&tmp.path().join("a.mp4")).unwrap();
        started.recv_timeout(Duration::from_secs(10)).unwrap();
        let second = manager.submit(&tmp.path().join("b.mp4")).unwrap();
        assert!(matches!(
            manager.submit(&tmp.path().join("c.mp4")),
            Err(SubmitError::QueueFull { .. })
        ));

        let third = std::thread::scope(|s| {
            let waiting = s.spawn(|| manager.submit_blocking(&tmp.path().join("c.mp4")));
            std::thread::sleep(Duration::from_millis(50));
            assert!(!waiting.is_finished());
            drop(gate);
            waiting.join().unwrap()
        })
        .unwrap();

        for id in [first, second, third] {
            assert_eq!(
                wait_for_terminal(&manager, &id).state,
                Some(TaskState::Completed)
            );
        }
        assert!(tmp.path().join("c.ass").exists());
    }

    #[test]
    fn test_cancel_running_and_queued_tasks() {
        let tmp = TempDir::new().unwrap();
        let (manager, started, gate) = gated_manager(1, 2);

        let running = manager.submit(&tmp.path().join("a.mp4")).unwrap();
        started.recv_timeout(Duration::from_secs(10)).unwrap();
        let queued = manager.submit(&tmp.path().join("b.mp4")).unwrap();

        assert!(manager.cancel(&queued));
        assert_eq!(manager.get_status(&queued).state, Some(TaskState::Cancelled));
        assert!(manager.cancel(&running));

        drop(gate);
        assert_eq!(
            wait_for_terminal(&manager, &running).state,
            Some(TaskState::Cancelled)
        );
        manager.shutdown();

        assert!(files_with_extension(tmp.path(), "ass").is_empty());
        assert!(files_with_extension(tmp.path(), "wav").is_empty());
    }

    #[test]
    fn test_acknowledge_and_retention() {
        let tmp = TempDir::new().unwrap();
        let manager = TaskManager::new(
            use_case(
                StubExtractor {
                    windows: 1,
                    fail: false,
                },
                ok_prober(),
                ok_recognizer(1),
            ),
            TaskManagerConfig {
                retention: RetentionPolicy::ExpireAfter(Duration::ZERO),
                ..config(1, 4)
            },
        );

        let acked = manager.submit(&tmp.path().join("a.mp4")).unwrap();
        wait_for_terminal(&manager, &acked);
        assert!(manager.acknowledge(&acked));
        assert!(manager.get_status(&acked).is_not_found());
        assert!(!manager.acknowledge(&acked));

        let expired = manager.submit(&tmp.path().join("b.mp4")).unwrap();
        assert_eq!(
            wait_for_terminal(&manager, &expired).state,
            Some(TaskState::Completed)
        );
        assert_eq!(manager.evict_expired(), 1);
        assert!(manager.get_status(&expired).is_not_found());
    }

    /// Videos under a directory named `small` are 640x480, others 1920x1080.
    struct SizeByDirProber;

    impl VideoProber for SizeByDirProber {
        fn probe(&self, video_path: &Path) -> Result<VideoMetadata, PipelineError> {
            let small = video_path
                .parent()
                .and_then(Path::file_name)
                .is_some_and(|name| name == "small");
            Ok(if small {
                VideoMetadata::new(640, 480)
            } else {
                VideoMetadata::new(1920, 1080)
            })
        }
    }

    #[test]
    fn test_same_stem_videos_keep_separate_subtitles() {
        let tmp = TempDir::new().unwrap();
        let out_dir = tmp.path().join("out");
        for dir in ["small", "large", "out"] {
            std::fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        let use_case = GenerateSubtitlesUseCase::new(
            Box::new(StubExtractor {
                windows: 3,
                fail: false,
            }),
            Box::new(SizeByDirProber),
            Arc::new(ok_recognizer(3)),
            Box::new(ThreadedTranscriptionExecutor::new(2)),
            SubtitleSynthesizer::default(),
            Box::new(AssFileWriter),
            PipelineOptions {
                chunk_size: CHUNK,
                output_dir: Some(out_dir.clone()),
                ..PipelineOptions::default()
            },
        );
        let manager = TaskManager::new(use_case, config(2, 4));

        let small = manager
            .submit(&tmp.path().join("small").join("talk.mp4"))
            .unwrap();
        let large = manager
            .submit(&tmp.path().join("large").join("talk.mp4"))
            .unwrap();
        let small_status = wait_for_terminal(&manager, &small);
        let large_status = wait_for_terminal(&manager, &large);

        assert_eq!(small_status.state, Some(TaskState::Completed));
        assert_eq!(large_status.state, Some(TaskState::Completed));
        let small_result = small_status.result.unwrap();
        let large_result = large_status.result.unwrap();
        assert_ne!(small_result, large_result);
        assert!(small_result.starts_with(&out_dir));
        assert!(large_result.starts_with(&out_dir));

        let small_doc = std::fs::read_to_string(&small_result).unwrap();
        let large_doc = std::fs::read_to_string(&large_result).unwrap();
        assert!(small_doc.contains("PlayResX: 640\nPlayResY: 480\n"));
        assert!(large_doc.contains("PlayResX: 1920\nPlayResY: 1080\n"));
        assert_eq!(files_with_extension(&out_dir, "ass").len(), 2);
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 2);
    }

    struct PanickingProber;

    impl VideoProber for PanickingProber {
        fn probe(&self, _: &Path) -> Result<VideoMetadata, PipelineError> {
            panic!("probe exploded");
        }
    }

    #[test]
    fn test_pipeline_panic_becomes_error_state() {
        let tmp = TempDir::new().unwrap();
        let use_case = GenerateSubtitlesUseCase::new(
            Box::new(StubExtractor {
                windows: 1,
                fail: false,
            }),
            Box::new(PanickingProber),
            Arc::new(ok_recognizer(1)),
            Box::new(ThreadedTranscriptionExecutor::new(1)),
            SubtitleSynthesizer::default(),
            Box::new(AssFileWriter),
            PipelineOptions {
                chunk_size: CHUNK,
                ..PipelineOptions::default()
            },
        );
        let manager = TaskManager::new(use_case, config(1, 2));

        let id = manager.submit(&tmp.path().join("movie.mp4")).unwrap();
        let status = wait_for_terminal(&manager, &id);

        assert_eq!(
            status.state,
            Some(TaskState::Error("pipeline panicked: probe exploded".into()))
        );
        assert!(files_with_extension(tmp.path(), "wav").is_empty());

        // The worker survives and keeps serving tasks.
        let next = manager.submit(&tmp.path().join("other.mp4")).unwrap();
        assert!(matches!(
            wait_for_terminal(&manager, &next).state,
            Some(TaskState::Error(_))
        ));
    }

    #[test]
    fn test_submit_after_workers_stop() {
        let (sender, receiver) = crossbeam_channel::bounded::<PipelineJob>(1);
        drop(receiver);
        let manager = TaskManager {
            registry: Arc::new(TaskRegistry::default()),
            sender: Some(sender),
            workers: Vec::new(),
            queue_capacity: 1,
        };
        assert_eq!(
            manager.submit(Path::new("a.mp4")),
            Err(SubmitError::ShuttingDown)
        );
        assert_eq!(
            manager.submit_blocking(Path::new("a.mp4")),
            Err(SubmitError::ShuttingDown)
        );
        assert!(manager.registry.is_empty());
    }
}
