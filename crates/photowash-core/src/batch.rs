//! Parallel batch execution.
//!
//! One job per source file on a dedicated rayon pool. Events are delivered
//! on the calling thread in completion order, followed by exactly one
//! [`BatchEvent::AllDone`]. A failing or panicking job is reported and the
//! rest of the batch keeps going.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::job::{run_job, JobError, JobOptions, JobOutput, OutputSettings};

/// Shared flag that stops jobs that have not started yet.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Result of one job.
#[derive(Debug)]
pub struct JobReport {
    pub source: PathBuf,
    /// The output, or the error rendered as a string.
    pub result: Result<JobOutput, String>,
    /// Jobs reported so far, including this one.
    pub completed: usize,
    pub total: usize,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Totals for a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs that never started because the batch was cancelled.
    pub skipped: usize,
    pub cancelled: bool,
}

/// Progress notifications.
#[derive(Debug)]
pub enum BatchEvent {
    Finished(JobReport),
    AllDone(BatchSummary),
}

enum Message {
    Done(PathBuf, Result<JobOutput, String>),
    Skipped(PathBuf),
}

/// Fixed-size worker pool for batches.
pub struct BatchRunner {
    pool: ThreadPool,
    workers: usize,
    cancel: CancelHandle,
}

impl BatchRunner {
    /// Available cores minus one, at least one.
    pub fn default_workers() -> usize {
        thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }

    /// Build a runner with `workers` threads, or [`Self::default_workers`].
    pub fn new(workers: Option<usize>) -> Result<Self, ThreadPoolBuildError> {
        let workers = workers.filter(|&n| n > 0).unwrap_or_else(Self::default_workers);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("photowash-worker-{i}"))
            .build()?;
        Ok(Self {
            pool,
            workers,
            cancel: CancelHandle::default(),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Handle for cancelling the batch currently running on this runner.
    ///
    /// The flag is cleared when a new batch starts.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run `process` once per source.
    ///
    /// `on_event` is called on the current thread as jobs finish. Once
    /// cancelled, jobs that have not started are skipped; jobs in flight
    /// complete and are still reported. A cancel issued before this call
    /// does not carry over.
    pub fn run<F, E>(&self, sources: Vec<PathBuf>, process: F, mut on_event: E) -> BatchSummary
    where
        F: Fn(&Path) -> Result<JobOutput, JobError> + Sync,
        E: FnMut(BatchEvent),
    {
        self.cancel.reset();
        let total = sources.len();
        let mut summary = BatchSummary {
            total,
            ..Default::default()
        };
        let (tx, rx) = mpsc::channel();
        let process = &process;
        let cancel = &self.cancel;

        self.pool.in_place_scope(|scope| {
            for source in sources {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let message = if cancel.is_cancelled() {
                        Message::Skipped(source)
                    } else {
                        let result = match catch_unwind(AssertUnwindSafe(|| process(&source))) {
                            Ok(result) => result.map_err(|e| e.to_string()),
                            Err(panic) => Err(panic_message(panic.as_ref())),
                        };
                        Message::Done(source, result)
                    };
                    // The receiver outlives the scope
                    let _ = tx.send(message);
                });
            }
            drop(tx);

            for message in rx {
                match message {
                    Message::Skipped(source) => {
                        debug!(source = %source.display(), "job skipped");
                        summary.skipped += 1;
                    }
                    Message::Done(source, result) => {
                        match &result {
                            Ok(_) => summary.succeeded += 1,
                            Err(e) => {
                                warn!(source = %source.display(), error = %e, "job failed");
                                summary.failed += 1;
                            }
                        }
                        on_event(BatchEvent::Finished(JobReport {
                            source,
                            result,
                            completed: summary.succeeded + summary.failed,
                            total,
                        }));
                    }
                }
            }
        });

        summary.cancelled = self.cancel.is_cancelled();
        on_event(BatchEvent::AllDone(summary));
        summary
    }

    /// Run [`run_job`] for every source with shared options.
    pub fn run_jobs<E>(
        &self,
        sources: Vec<PathBuf>,
        options: &JobOptions,
        settings: &OutputSettings,
        on_event: E,
    ) -> BatchSummary
    where
        E: FnMut(BatchEvent),
    {
        self.run(sources, |source| run_job(source, options, settings), on_event)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::PixelBuffer;
    use crate::encode::encode_png;
    use crate::TransformOptions;
    use std::fs;
    use tempfile::TempDir;

    fn ok_output(source: &Path) -> Result<JobOutput, JobError> {
        Ok(JobOutput {
            source: source.to_path_buf(),
            path: source.with_extension("out"),
            options: TransformOptions::new(),
        })
    }

    fn sources(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("img{i}.jpg"))).collect()
    }

    fn collect(runner: &BatchRunner, inputs: Vec<PathBuf>, f: impl Fn(&Path) -> Result<JobOutput, JobError> + Sync) -> Vec<BatchEvent> {
        let mut events = Vec::new();
        runner.run(inputs, f, |e| events.push(e));
        events
    }

    #[test]
    fn test_default_workers_at_least_one() {
        assert!(BatchRunner::default_workers() >= 1);
        let runner = BatchRunner::new(Some(0)).unwrap();
        assert!(runner.workers() >= 1);
    }

    #[test]
    fn test_all_jobs_reported_then_done() {
        let runner = BatchRunner::new(Some(3)).unwrap();
        let events = collect(&runner, sources(10), ok_output);

        assert_eq!(events.len(), 11);
        let mut completed = Vec::new();
        for event in &events[..10] {
            match event {
                BatchEvent::Finished(report) => {
                    assert!(report.is_success());
                    assert_eq!(report.total, 10);
                    completed.push(report.completed);
                }
                BatchEvent::AllDone(_) => panic!("AllDone before the last job"),
            }
        }
        assert_eq!(completed, (1..=10).collect::<Vec<_>>());

        match &events[10] {
            BatchEvent::AllDone(summary) => {
                assert_eq!(summary.succeeded, 10);
                assert_eq!(summary.failed, 0);
                assert!(!summary.cancelled);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_failures_are_isolated() {
        let runner = BatchRunner::new(Some(2)).unwrap();
        let mut events = Vec::new();
        let summary = runner.run(
            sources(6),
            |source| match source.to_str() {
                Some("img1.jpg") => Err(JobError::InvalidSource(source.to_path_buf())),
                Some("img4.jpg") => panic!("boom"),
                _ => ok_output(source),
            },
            |e| events.push(e),
        );

        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.failed, 2);

        let panicked = events.iter().find_map(|e| match e {
            BatchEvent::Finished(r) if r.source == Path::new("img4.jpg") => r.result.as_ref().err().cloned(),
            _ => None,
        });
        assert!(panicked.unwrap().contains("boom"));
    }

    #[test]
    fn test_cancel_skips_pending_jobs() {
        let runner = BatchRunner::new(Some(1)).unwrap();
        let handle = runner.cancel_handle();
        let first = AtomicBool::new(true);

        let mut done_events = 0;
        let mut finished = 0;
        let summary = runner.run(
            sources(8),
            |source| {
                if first.swap(false, Ordering::SeqCst) {
                    handle.cancel();
                }
                ok_output(source)
            },
            |e| match e {
                BatchEvent::Finished(_) => finished += 1,
                BatchEvent::AllDone(_) => done_events += 1,
            },
        );

        assert_eq!(done_events, 1);
        assert_eq!(finished, 1);
        assert_eq!(summary.skipped, 7);
        assert!(summary.cancelled);
    }

    #[test]
    fn test_cancel_applies_to_one_batch() {
        let runner = BatchRunner::new(Some(2)).unwrap();
        let handle = runner.cancel_handle();

        let first = runner.run(sources(3), |source| {
            handle.cancel();
            ok_output(source)
        }, |_| {});
        assert!(first.cancelled);

        handle.cancel();
        let second = runner.run(sources(2), ok_output, |_| {});
        assert_eq!(second.skipped, 0);
        assert_eq!(second.succeeded, 2);
        assert!(!second.cancelled);
    }

    #[test]
    fn test_empty_batch_still_completes() {
        let runner = BatchRunner::new(Some(2)).unwrap();
        let events = collect(&runner, Vec::new(), ok_output);
        assert!(matches!(events.as_slice(), [BatchEvent::AllDone(s)] if s.total == 0));
    }

    #[test]
    fn test_run_jobs_on_files() {
        let tmp = TempDir::new().unwrap();
        let mut inputs = Vec::new();
        for i in 0..3 {
            let img = PixelBuffer::filled(40 + i * 4, 30, crate::ChannelMode::Rgb, [120, 90, 60, 255]);
            let path = tmp.path().join(format!("in{i}.png"));
            fs::write(&path, encode_png(&img).unwrap()).unwrap();
            inputs.push(path);
        }
        let bogus = tmp.path().join("broken.png");
        fs::write(&bogus, b"not a png").unwrap();
        inputs.push(bogus);

        let out = tmp.path().join("out");
        fs::create_dir(&out).unwrap();

        let runner = BatchRunner::new(Some(2)).unwrap();
        let summary = runner.run_jobs(
            inputs,
            &JobOptions::Fixed(TransformOptions::new()),
            &OutputSettings::new(&out),
            |_| {},
        );

        assert_eq!((summary.succeeded, summary.failed), (3, 1));
        for i in 0..3 {
            assert!(out.join(format!("in{i}.jpg")).exists());
        }
    }
}
