//! # Worker Pool
//!
//! Fixed-size set of workers draining the shared task queue.
//!
//! ## Per-task steps
//!
//! 1. Stop if the run is no longer current (cancelled)
//! 2. Derive the relative path, sanitized if the job asks for it
//! 3. Create the destination directory
//! 4. Recognized audio whose transcoded output already exists → skip
//! 5. Decide copy or transcode (may probe)
//! 6. Destination already exists → skip
//! 7. Announce the copy/transcode, write to a temp path, rename into place
//!
//! Skips count as completed. Any error counts as failed, is reported on the
//! event bus with the file's relative path, and the worker moves on. A temp
//! file is removed whenever its write fails, so the destination never holds
//! a partial file under its final name.

use crate::decision::{Decision, TranscodeDecisionEngine};
use crate::progress::{ProgressTracker, RunToken, SyncRunId};
use crate::task::{copy_temp_path, transcode_temp_path, FileTask};
use crate::{Result, SyncError};
use bridge_traits::{AudioEncoder, EncodeRequest};
use core_async::fs;
use core_async::sync::{mpsc::UnboundedReceiver, Mutex};
use core_async::task::JoinSet;
use core_runtime::config::{OutputProfile, SyncJob};
use core_runtime::events::{CoreEvent, EventBus, LogEvent, MessageKey, SyncEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Receiving end of the task queue, shared by every worker
pub(crate) type TaskQueue = Arc<Mutex<UnboundedReceiver<PathBuf>>>;

/// What happened to a file that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Copied,
    Transcoded,
    /// Destination already existed
    Skipped,
}

/// Everything a worker needs for one run
pub(crate) struct WorkerContext {
    pub run_id: SyncRunId,
    pub token: RunToken,
    pub job: Arc<SyncJob>,
    pub tracker: Arc<ProgressTracker>,
    pub decisions: Arc<TranscodeDecisionEngine>,
    pub encoder: Arc<dyn AudioEncoder>,
    pub event_bus: Arc<EventBus>,
}

impl WorkerContext {
    fn log(&self, event: LogEvent) {
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Log {
                run_id: self.run_id.to_string(),
                event,
            }))
            .ok();
    }

    fn info(&self, key: MessageKey, task: &FileTask) {
        self.log(LogEvent::info(key, [task.display_path()]));
    }
}

pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Start the workers. The returned set drains once the queue is closed
    /// and empty, or the run stops being current.
    pub(crate) fn spawn(&self, context: Arc<WorkerContext>, queue: TaskQueue) -> JoinSet<()> {
        let mut workers = JoinSet::new();
        for worker_id in 0..self.size {
            workers.spawn(run_worker(worker_id, Arc::clone(&context), Arc::clone(&queue)));
        }
        workers
    }
}

async fn run_worker(worker_id: usize, context: Arc<WorkerContext>, queue: TaskQueue) {
    let mut handled = 0u64;

    loop {
        if !context.tracker.is_current(context.token) {
            debug!(worker_id, handled, "Run cancelled, worker exiting");
            return;
        }

        let next = queue.lock().await.recv().await;
        let Some(source) = next else {
            break;
        };

        // The run may have been cancelled while waiting for the queue
        if !context.tracker.is_current(context.token) {
            debug!(worker_id, handled, "Run cancelled, worker exiting");
            return;
        }

        process_file(&context, source).await;
        handled += 1;
    }

    debug!(worker_id, handled, "Queue drained, worker exiting");
}

/// Handle one file and record its outcome
pub(crate) async fn process_file(context: &WorkerContext, source: PathBuf) {
    match handle_file(context, &source).await {
        Ok(outcome) => {
            debug!(path = %source.display(), ?outcome, "File done");
            context.tracker.record_completed();
        }
        Err(err) => {
            warn!(path = %source.display(), error = %err, "File failed");
            let relative = source
                .strip_prefix(&context.job.source_dir)
                .unwrap_or(&source)
                .to_string_lossy()
                .into_owned();
            context.log(LogEvent::error(Some(relative), err.to_string()));
            context.tracker.record_failed();
        }
    }
}

#[instrument(skip(context), fields(run_id = %context.run_id))]
async fn handle_file(context: &WorkerContext, source: &Path) -> Result<FileOutcome> {
    let job = &context.job;
    let task = FileTask::new(&job.source_dir, source.to_path_buf(), job.escape_filenames)?;

    let dest_dir = task.destination_dir(&job.dest_dir);
    fs::create_dir_all(&dest_dir)
        .await
        .map_err(SyncError::io(&dest_dir))?;

    if context.decisions.is_recognized_audio(&task) {
        let dest = task.transcode_destination(&job.dest_dir, job.profile.format.extension);
        if exists(&dest).await? {
            context.info(MessageKey::PathAlreadyExists, &task);
            return Ok(FileOutcome::Skipped);
        }
    }

    match context.decisions.decide(&task, job).await? {
        Decision::RawCopy(reason) => {
            let dest = task.copy_destination(&job.dest_dir);
            if exists(&dest).await? {
                context.info(MessageKey::PathAlreadyExists, &task);
                return Ok(FileOutcome::Skipped);
            }

            debug!(?reason, "Copying");
            context.info(MessageKey::Copying, &task);
            copy_file(task.source(), &dest).await?;
            Ok(FileOutcome::Copied)
        }
        Decision::Transcode(profile) => {
            let dest = task.transcode_destination(&job.dest_dir, profile.format.extension);
            context.info(MessageKey::Transcoding, &task);
            transcode_file(context.encoder.as_ref(), task.source(), &dest, &profile).await?;
            Ok(FileOutcome::Transcoded)
        }
    }
}

async fn exists(path: &Path) -> Result<bool> {
    fs::try_exists(path).await.map_err(SyncError::io(path))
}

/// Copy through `<dest>.tmp`, then rename into place
async fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    let temp = copy_temp_path(dest);

    let written = async {
        fs::copy(source, &temp).await.map_err(SyncError::io(source))?;
        fs::rename(&temp, dest).await.map_err(SyncError::io(dest))
    }
    .await;

    if written.is_err() {
        discard(&temp).await;
    }
    written
}

/// Encode into `<dest>.tmp.<ext>`, then rename into place
async fn transcode_file(
    encoder: &dyn AudioEncoder,
    source: &Path,
    dest: &Path,
    profile: &OutputProfile,
) -> Result<()> {
    let temp = transcode_temp_path(dest, profile.format.extension);
    let request = EncodeRequest {
        input: source.to_path_buf(),
        output: temp.clone(),
        encoder: profile.format.encoder.to_string(),
        bitrate: profile.effective_bitrate(),
    };

    let written = async {
        encoder
            .encode(&request)
            .await
            .map_err(|source_err| SyncError::Encode {
                path: source.to_path_buf(),
                source: source_err,
            })?;
        fs::rename(&temp, dest).await.map_err(SyncError::io(dest))
    }
    .await;

    if written.is_err() {
        discard(&temp).await;
    }
    written
}

async fn discard(temp: &Path) {
    match fs::remove_file(temp).await {
        Ok(()) => debug!(path = %temp.display(), "Removed partial output"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %temp.display(), error = %err, "Failed to remove partial output"),
    }
}
