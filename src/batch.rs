//! Sequential batch execution.
//!
//! A batch runs its jobs strictly one after another. Each job gets a fresh
//! client id, its own progress subscription and its own cancellation token;
//! cancelling only ever affects the job that is currently active.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::api::FetchService;
use crate::config::INTER_JOB_PAUSE_MS;
use crate::error::Error;
use crate::fs::{FileSystem, TokioFileSystem};
use crate::history::{HistoryRecord, HistoryStore};
use crate::job::{JobController, SavedFile};
use crate::model::{ClientId, JobDescriptor, OutputFormat};
use crate::progress::ProgressUpdate;
use crate::selection::SelectionStore;
use crate::state::{BatchRun, JobSlot, JobState};
use crate::stats::{BatchStatsBuilder, BatchSummary};

/// Upper bound on waiting for cancel notifications when a batch ends.
const CANCEL_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Observer for batch progress.
///
/// All methods have default no-op implementations.
pub trait BatchProgress: Send + Sync {
    /// Called once with every job `Queued`, before the first one starts.
    fn on_batch_start(&self, _jobs: &[JobSlot]) {}

    /// Called after job `index` moved to `state`.
    fn on_job_state(&self, _index: usize, _job: &JobDescriptor, _state: &JobState) {}

    /// Called with a free-form status line from the server for job `index`.
    fn on_job_status(&self, _index: usize, _job: &JobDescriptor, _status: &str) {}

    /// Called when job `index` has been written to disk.
    fn on_job_saved(&self, _index: usize, _job: &JobDescriptor, _saved: &SavedFile) {}

    /// Called once after the last job reached a terminal state.
    fn on_batch_complete(&self, _summary: &BatchSummary) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl BatchProgress for NoProgress {}

/// Cancels whichever job is active at the time of the call.
///
/// Clones share the same slot, so a handle can be moved into a signal
/// handler while the batch runs elsewhere.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the active job. Returns false if no job is active.
    pub fn cancel(&self) -> bool {
        let slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().is_some_and(|token| {
            token.cancel();
            true
        })
    }

    /// Returns true while the active job's request is still in flight.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        token
    }

    fn disarm(&self) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Runs batches of jobs one at a time.
pub struct BatchRunner<S: FetchService + ?Sized, F: FileSystem = TokioFileSystem> {
    controller: JobController<S, F>,
    pause: Duration,
    cancel: CancelHandle,
}

impl<S: FetchService + ?Sized + 'static, F: FileSystem> BatchRunner<S, F> {
    /// Creates a runner with the default pause between jobs.
    #[must_use]
    pub fn new(controller: JobController<S, F>) -> Self {
        Self {
            controller,
            pause: Duration::from_millis(INTER_JOB_PAUSE_MS),
            cancel: CancelHandle::new(),
        }
    }

    /// Sets the pause inserted between consecutive jobs.
    #[must_use]
    pub const fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Returns a handle that cancels the job active at the time of the call.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Freezes `selection` into a batch, runs it, and leaves the selection
    /// empty.
    pub async fn run_selection(
        &self,
        selection: &mut SelectionStore,
        format: OutputFormat,
        history: &mut HistoryStore,
        progress: &dyn BatchProgress,
    ) -> BatchSummary {
        let descriptors = selection.freeze(format);
        let summary = self.run(descriptors, history, progress).await;
        selection.clear();
        summary
    }

    /// Runs every job in order and returns the batch summary.
    ///
    /// Job failures never abort the batch; the next job starts after the
    /// configured pause. Successful jobs are appended to `history`. Before
    /// returning, waits briefly for cancel notifications to reach the server.
    pub async fn run(
        &self,
        descriptors: Vec<JobDescriptor>,
        history: &mut HistoryStore,
        progress: &dyn BatchProgress,
    ) -> BatchSummary {
        let mut run = BatchRun::new(descriptors);
        let mut stats = BatchStatsBuilder::new(run.len());
        progress.on_batch_start(run.jobs());
        log::info!("Starting batch of {} jobs", run.len());

        for index in 0..run.len() {
            if index > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }

            let descriptor = run.jobs()[index].descriptor.clone();
            let client_id = ClientId::generate();
            log::info!("Starting job {index}: {}", descriptor.title());
            log::debug!("Job {index} ({}) uses client id {client_id}", descriptor.url());

            advance(&mut run, index, JobState::Connecting, progress);
            let token = self.cancel.arm();

            let fetched = self
                .controller
                .fetch(&descriptor, &client_id, &token, |update| match update {
                    ProgressUpdate::Downloading(pct) => {
                        advance(&mut run, index, JobState::Downloading(pct), progress);
                    }
                    ProgressUpdate::Processing => {
                        advance(&mut run, index, JobState::Processing, progress);
                    }
                    ProgressUpdate::Status(text) => {
                        progress.on_job_status(index, &descriptor, &text);
                    }
                })
                .await;

            // Once the request has settled there is nothing left to cancel.
            self.cancel.disarm();

            let result = match fetched {
                Ok(file) => self.controller.save(&descriptor, &file).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(saved) => {
                    stats.add_success(saved.size);
                    advance(&mut run, index, JobState::Done, progress);
                    progress.on_job_saved(index, &descriptor, &saved);
                    if let Err(e) = history.append(HistoryRecord::new(&descriptor, Utc::now())) {
                        log::warn!("Failed to save history: {e}");
                    }
                }
                Err(Error::Cancelled) => {
                    log::info!("Job {index} cancelled");
                    stats.add_cancelled();
                    advance(&mut run, index, JobState::Cancelled, progress);
                }
                Err(e) => {
                    log::error!("Job {index} ({}) failed: {e}", descriptor.url());
                    stats.add_failure();
                    advance(&mut run, index, JobState::Failed(e.to_string()), progress);
                }
            }
        }

        self.controller
            .flush_notifications(CANCEL_FLUSH_TIMEOUT)
            .await;

        let summary = stats.build();
        log::info!("Batch finished: {summary}");
        progress.on_batch_complete(&summary);
        summary
    }
}

fn advance(run: &mut BatchRun, index: usize, next: JobState, progress: &dyn BatchProgress) {
    if run.transition(index, next) {
        let slot = &run.jobs()[index];
        progress.on_job_state(index, &slot.descriptor, &slot.state);
    }
}
