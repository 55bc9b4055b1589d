use crate::pipeline::report::{FailureInfo, FailureLog};
use log::{debug, info, warn};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;

pub const DEFAULT_CONCURRENCY: usize = 8;

/// What a worker reports for one successfully processed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessInfo {
    pub path: PathBuf,
    /// Output files written for this input.
    pub outputs: usize,
}

#[derive(Debug)]
pub struct RunOutcome<S> {
    /// In completion order.
    pub successes: Vec<S>,
    pub failures: FailureLog,
    /// Items never started because the run was cancelled.
    pub not_run: Vec<PathBuf>,
}

impl<S> RunOutcome<S> {
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len() + self.not_run.len()
    }
}

impl RunOutcome<SuccessInfo> {
    pub fn total_outputs(&self) -> usize {
        self.successes.iter().map(|s| s.outputs).sum()
    }
}

/// Bounded pool of worker threads draining a shared queue of input paths.
///
/// Every item is isolated: an error or a panic in the worker becomes a
/// [`FailureInfo`] and the rest of the queue keeps going.
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    concurrency: usize,
    cancel: Arc<AtomicBool>,
    completed: Arc<AtomicUsize>,
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl PipelineRunner {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Share a shutdown flag. Once set, workers finish their current item and stop.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Items finished by the current or most recent run.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn run<S, F>(&self, items: Vec<PathBuf>, worker: F) -> RunOutcome<S>
    where
        S: Send,
        F: Fn(&Path) -> anyhow::Result<S> + Sync,
    {
        let total = items.len();
        let workers = self.concurrency.min(total).max(1);
        let report_every = (total / 10).max(1);

        self.completed.store(0, Ordering::SeqCst);

        let queue = Mutex::new(items.into_iter().collect::<VecDeque<_>>());
        let (tx, rx) = mpsc::channel::<Result<S, FailureInfo>>();

        let mut successes = Vec::new();
        let mut failures = FailureLog::new();

        debug!("Dispatching {} items to {} workers..!", total, workers);

        thread::scope(|scope| {
            for worker_id in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                let worker = &worker;
                let cancel = &self.cancel;

                scope.spawn(move || {
                    loop {
                        if cancel.load(Ordering::SeqCst) {
                            debug!("Worker {} stopping on shutdown request..!", worker_id);
                            break;
                        }

                        let next = queue
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .pop_front();
                        let Some(path) = next else {
                            break;
                        };

                        if tx.send(run_item(&path, worker)).is_err() {
                            break;
                        }
                    }
                });
            }

            drop(tx);

            for outcome in rx {
                let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

                match outcome {
                    Ok(success) => successes.push(success),
                    Err(failure) => {
                        warn!("{}: {}", failure.path.display(), failure.message);
                        failures.push(failure);
                    }
                }

                if done % report_every == 0 || done == total {
                    info!("Progress: {}/{}", done, total);
                }
            }
        });

        let not_run: Vec<PathBuf> = queue
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into();

        if !not_run.is_empty() {
            warn!("Shutdown left {} items not run..!", not_run.len());
        }

        RunOutcome {
            successes,
            failures,
            not_run,
        }
    }
}

fn run_item<S, F>(path: &Path, worker: &F) -> Result<S, FailureInfo>
where
    F: Fn(&Path) -> anyhow::Result<S>,
{
    debug!("Processing {}", path.display());

    match panic::catch_unwind(AssertUnwindSafe(|| worker(path))) {
        Ok(Ok(success)) => Ok(success),
        Ok(Err(e)) => Err(FailureInfo::new(path, format!("{:#}", e))),
        Err(payload) => Err(FailureInfo::new(
            path,
            format!("worker panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
