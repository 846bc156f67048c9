//! # Sync Coordinator
//!
//! Runs one sync job end to end.
//!
//! ## Overview
//!
//! The `SyncCoordinator` composes the engine pieces:
//! - [`TreeEnumerator`] walks the source tree on a blocking thread and
//!   feeds an unbounded task queue, counting every file as it goes
//! - a [`WorkerPool`] of one worker per CPU drains the queue
//! - the [`ProgressTracker`] holds counters and the active-run slot
//! - the [`EventBus`] carries the log feed and lifecycle events
//!
//! ## Workflow
//!
//! ```text
//! Idle → Enumerating → Dispatching → Draining → Idle
//! ```
//!
//! 1. Claim the active-run slot (fails with `SyncInProgress` if taken)
//! 2. Emit `Started` and the scanning message
//! 3. Start the workers, then walk the source tree into the queue
//! 4. Close the queue and wait for every worker to exit
//! 5. Emit the summary, then release the slot
//!
//! An enumeration error cancels the run: workers stop at their next task
//! boundary, an `Aborted` event is emitted, and `run_sync` returns the
//! error. Per-file failures never stop the run.
//!
//! Dropping the `run_sync` future (aborting the task from `start_sync`)
//! aborts the workers and still releases the slot, so the coordinator can
//! run again. A file that was mid-write may leave its temp file behind.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncConfig, SyncCoordinator};
//! use std::sync::Arc;
//!
//! let coordinator = Arc::new(SyncCoordinator::new(
//!     SyncConfig::default(),
//!     prober,
//!     encoder,
//!     event_bus,
//! ));
//!
//! let handle = Arc::clone(&coordinator).start_sync(job);
//!
//! // From a UI timer
//! let progress = coordinator.progress().await;
//! println!("{}/{}", progress.processed(), progress.total);
//!
//! // From a cancel button
//! coordinator.cancel_sync().await?;
//!
//! let summary = handle.await??;
//! ```

use crate::config::SyncConfig;
use crate::decision::TranscodeDecisionEngine;
use crate::enumerator::TreeEnumerator;
use crate::progress::{ProgressSnapshot, ProgressTracker, RunGuard, SyncRunId};
use crate::worker::{TaskQueue, WorkerContext, WorkerPool};
use crate::{Result, SyncError};
use bridge_traits::{AudioEncoder, AudioProber};
use chrono::{DateTime, Utc};
use core_async::sync::{mpsc, Mutex};
use core_async::task::{self, JoinHandle};
use core_async::time::Instant;
use core_runtime::config::SyncJob;
use core_runtime::events::{CoreEvent, EventBus, LogEvent, MessageKey, SyncEvent};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Final counters of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub run_id: SyncRunId,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    /// The run was cancelled before the queue drained
    pub cancelled: bool,
    pub duration: Duration,
}

impl SyncSummary {
    /// Files neither completed nor failed (only non-zero for cancelled runs)
    pub fn unprocessed(&self) -> u64 {
        self.total.saturating_sub(self.completed + self.failed)
    }
}

/// Sync coordinator for running mirror jobs
pub struct SyncCoordinator {
    config: SyncConfig,
    prober: Arc<dyn AudioProber>,
    encoder: Arc<dyn AudioEncoder>,
    event_bus: Arc<EventBus>,
    tracker: Arc<ProgressTracker>,
}

impl SyncCoordinator {
    /// Create a new sync coordinator
    ///
    /// # Arguments
    ///
    /// * `config` - Worker count and recognized audio extensions
    /// * `prober` - Lists a file's streams
    /// * `encoder` - Re-encodes a file's audio stream
    /// * `event_bus` - Receives the log feed and lifecycle events
    pub fn new(
        config: SyncConfig,
        prober: Arc<dyn AudioProber>,
        encoder: Arc<dyn AudioEncoder>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            prober,
            encoder,
            event_bus,
            tracker: Arc::new(ProgressTracker::new()),
        }
    }

    /// Shared progress state, for pollers that outlive a borrow of `self`
    pub fn tracker(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.tracker)
    }

    pub async fn progress(&self) -> ProgressSnapshot {
        self.tracker.snapshot().await
    }

    /// Whether a run holds the engine, including one that is draining
    /// after cancellation
    pub fn is_sync_active(&self) -> bool {
        self.tracker.is_active()
    }

    /// Ask the run in flight to stop.
    ///
    /// Workers finish the file they are on and take no new ones; the
    /// enumerator stops walking. `run_sync` then returns a summary with
    /// `cancelled: true`.
    ///
    /// # Errors
    ///
    /// [`SyncError::NotRunning`] if nothing is running or it is already
    /// being cancelled.
    pub async fn cancel_sync(&self) -> Result<SyncRunId> {
        let run_id = self.tracker.cancel().await?;
        info!(%run_id, "Sync cancellation requested");
        Ok(run_id)
    }

    /// Run `job` on a spawned task
    pub fn start_sync(self: Arc<Self>, job: SyncJob) -> JoinHandle<Result<SyncSummary>> {
        task::spawn(async move { self.run_sync(job).await })
    }

    /// Run `job` to completion or cancellation.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidJob`] if the destination lies inside the source
    /// - [`SyncError::SyncInProgress`] if another run holds the engine
    /// - [`SyncError::Enumeration`] if the source tree cannot be walked
    #[instrument(skip(self, job), fields(job = %job.name))]
    pub async fn run_sync(&self, job: SyncJob) -> Result<SyncSummary> {
        check_job(&job)?;

        let run_id = SyncRunId::new();
        let job = Arc::new(job);
        let token = self.tracker.begin(run_id, Arc::clone(&job))?;
        let slot = RunGuard::new(Arc::clone(&self.tracker), token);
        let started = Instant::now();
        let started_at = Utc::now();

        info!(
            %run_id,
            source = %job.source_dir.display(),
            dest = %job.dest_dir.display(),
            profile = %job.profile.name,
            "Sync started"
        );

        self.emit(SyncEvent::Started {
            run_id: run_id.to_string(),
            job_name: job.name.clone(),
            source_dir: job.source_dir.display().to_string(),
            dest_dir: job.dest_dir.display().to_string(),
        });
        self.emit_log(run_id, LogEvent::info(MessageKey::ScanningSource, Vec::<String>::new()));

        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: TaskQueue = Arc::new(Mutex::new(receiver));

        let context = Arc::new(WorkerContext {
            run_id,
            token,
            job: Arc::clone(&job),
            tracker: Arc::clone(&self.tracker),
            decisions: Arc::new(TranscodeDecisionEngine::new(
                Arc::clone(&self.prober),
                &self.config.audio_extensions,
            )),
            encoder: Arc::clone(&self.encoder),
            event_bus: Arc::clone(&self.event_bus),
        });

        let pool = WorkerPool::new(self.config.workers());
        let mut workers = pool.spawn(context, queue);

        let enumerator = TreeEnumerator::new(job.source_dir.clone());
        let tracker = Arc::clone(&self.tracker);
        // The sender moves into the blocking task; the queue closes when it returns
        let enumerated = task::spawn_blocking(move || enumerator.feed(&sender, &tracker, token))
            .await
            .map_err(SyncError::from)
            .and_then(|result| result);

        if let Err(err) = &enumerated {
            error!(%run_id, error = %err, "Enumeration failed, aborting sync");
            self.tracker.abandon(token);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                error!(%run_id, error = %err, "Worker task failed");
            }
        }

        let cancelled = !self.tracker.is_current(token);
        let (total, completed, failed) = self.tracker.counters();
        let summary = SyncSummary {
            run_id,
            job_name: job.name.clone(),
            started_at,
            total,
            completed,
            failed,
            cancelled,
            duration: started.elapsed(),
        };

        let result = match enumerated {
            Ok(queued) => {
                info!(
                    %run_id,
                    queued,
                    total,
                    completed,
                    failed,
                    cancelled,
                    "Sync finished"
                );
                self.emit_log(
                    run_id,
                    LogEvent::info(
                        MessageKey::Done,
                        [total.to_string(), completed.to_string(), failed.to_string()],
                    ),
                );
                self.emit(SyncEvent::Finished {
                    run_id: run_id.to_string(),
                    total,
                    completed,
                    failed,
                    cancelled,
                    duration_ms: summary.duration.as_millis() as u64,
                });
                Ok(summary)
            }
            Err(err) => {
                self.emit_log(run_id, LogEvent::error(None, err.to_string()));
                self.emit(SyncEvent::Aborted {
                    run_id: run_id.to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        };

        // Releasing the slot is the last step of a run
        drop(slot);
        result
    }

    fn emit(&self, event: SyncEvent) {
        self.event_bus.emit(CoreEvent::Sync(event)).ok();
    }

    fn emit_log(&self, run_id: SyncRunId, event: LogEvent) {
        self.emit(SyncEvent::Log {
            run_id: run_id.to_string(),
            event,
        });
    }
}

/// Reject jobs that would mirror a tree into itself
fn check_job(job: &SyncJob) -> Result<()> {
    if job.source_dir.as_os_str().is_empty() || job.dest_dir.as_os_str().is_empty() {
        return Err(SyncError::InvalidJob(format!(
            "\"{}\" is missing a source or destination directory",
            job.name
        )));
    }

    let source = job
        .source_dir
        .canonicalize()
        .unwrap_or_else(|_| job.source_dir.clone());
    let dest = job
        .dest_dir
        .canonicalize()
        .unwrap_or_else(|_| job.dest_dir.clone());

    if dest.starts_with(&source) {
        warn!(source = %source.display(), dest = %dest.display(), "Destination inside source");
        return Err(SyncError::InvalidJob(format!(
            "destination {} is inside source {}",
            dest.display(),
            source.display()
        )));
    }

    Ok(())
}
