//! # Progress Tracker
//!
//! Shared counters and the active-run slot for a sync.
//!
//! ## Overview
//!
//! Workers bump `completed`/`failed`, the enumerator bumps `total`, and any
//! number of readers poll a [`ProgressSnapshot`] at whatever cadence suits
//! them. Every counter is an independent atomic; no lock is taken on the
//! per-file path.
//!
//! The active-run slot is a single atomic token:
//!
//! ```text
//!            begin (CAS 0 -> t)          cancel (CAS t -> t|CANCELLED)
//!   Idle ───────────────────────> Running ─────────────────────────> Cancelling
//!    ^                               │                                   │
//!    └──── finish (store 0, after every worker exited or the run dropped) ──┘
//! ```
//!
//! Workers compare the slot against their own token before each task, so a
//! cancelled (or finished) run stops them at the next task boundary. The
//! slot stays non-zero until the run has fully drained, so a second run
//! cannot start while the first one still has workers in flight.

use crate::{Result, SyncError};
use chrono::{DateTime, Utc};
use core_runtime::config::SyncJob;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

const IDLE: u64 = 0;
const CANCELLED: u64 = 1 << 63;

// ============================================================================
// Run identity
// ============================================================================

/// Unique identifier for one `run_sync` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a run ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| SyncError::InvalidRunId(e.to_string()))
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SyncRunId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Slot value owned by one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunToken(u64);

/// Releases a run's slot when dropped.
///
/// Held by `run_sync` for the whole run, so the slot is freed even when the
/// run's future is dropped before it completes (an aborted task, a losing
/// `select!` branch).
#[derive(Debug)]
pub(crate) struct RunGuard {
    tracker: Arc<ProgressTracker>,
    token: RunToken,
}

impl RunGuard {
    pub(crate) fn new(tracker: Arc<ProgressTracker>, token: RunToken) -> Self {
        Self { tracker, token }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.tracker.finish(self.token);
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time view of a sync's progress
///
/// `completed + failed <= total` always holds. While the enumerator is
/// still walking, `total` keeps growing.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    /// Job of the run in flight; `None` when idle
    pub active_job: Option<Arc<SyncJob>>,
    pub run_id: Option<SyncRunId>,
    pub started_at: Option<DateTime<Utc>>,
    /// Cancellation was requested and workers are draining
    pub cancelling: bool,
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
}

impl ProgressSnapshot {
    pub fn is_idle(&self) -> bool {
        self.active_job.is_none()
    }

    /// Files finished either way
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Share of discovered files finished, in `0.0..=1.0`; 0.0 before any
    /// file has been discovered
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.processed() as f64 / self.total as f64
    }
}

// ============================================================================
// Tracker
// ============================================================================

#[derive(Debug)]
struct ActiveRun {
    run_id: SyncRunId,
    job: Arc<SyncJob>,
    started_at: DateTime<Utc>,
}

/// Shared progress state for one coordinator
#[derive(Debug, Default)]
pub struct ProgressTracker {
    slot: AtomicU64,
    next_token: AtomicU64,
    active: RwLock<Option<ActiveRun>>,
    total: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a new run and reset the counters.
    ///
    /// # Errors
    ///
    /// [`SyncError::SyncInProgress`] if another run holds the slot, including
    /// one that was cancelled but is still draining.
    pub(crate) fn begin(&self, run_id: SyncRunId, job: Arc<SyncJob>) -> Result<RunToken> {
        let token = (self.next_token.fetch_add(1, Ordering::SeqCst) + 1) & !CANCELLED;

        // Slot and active run change together under the write lock
        let mut active = self.write_active();
        if self
            .slot
            .compare_exchange(IDLE, token, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::SyncInProgress {
                run_id: active
                    .as_ref()
                    .map(|run| run.run_id.to_string())
                    .unwrap_or_default(),
            });
        }

        self.total.store(0, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);

        *active = Some(ActiveRun {
            run_id,
            job,
            started_at: Utc::now(),
        });

        Ok(RunToken(token))
    }

    /// Whether `token` still owns the slot and has not been cancelled
    pub(crate) fn is_current(&self, token: RunToken) -> bool {
        self.slot.load(Ordering::SeqCst) == token.0
    }

    /// Mark the run owning `token` as cancelled; no-op if it no longer does
    pub(crate) fn abandon(&self, token: RunToken) {
        let _ = self.slot.compare_exchange(
            token.0,
            token.0 | CANCELLED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Request cancellation of whatever run is in flight.
    ///
    /// # Errors
    ///
    /// [`SyncError::NotRunning`] if idle or already cancelling.
    pub async fn cancel(&self) -> Result<SyncRunId> {
        // Holding the read lock keeps begin/finish from moving the slot
        // between the CAS and the lookup below
        let active = self.read_active();
        let run_id = active
            .as_ref()
            .map(|run| run.run_id)
            .ok_or(SyncError::NotRunning)?;

        let mut current = self.slot.load(Ordering::SeqCst);
        loop {
            if current == IDLE || current & CANCELLED != 0 {
                return Err(SyncError::NotRunning);
            }

            match self.slot.compare_exchange(
                current,
                current | CANCELLED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(run_id),
                Err(actual) => current = actual,
            }
        }
    }

    /// Release the slot held by `token`. No-op if `token` no longer owns it.
    pub(crate) fn finish(&self, token: RunToken) {
        let mut active = self.write_active();
        let owned = self.slot.load(Ordering::SeqCst) & !CANCELLED == token.0;
        if owned {
            *active = None;
            self.slot.store(IDLE, Ordering::SeqCst);
        }
    }

    fn read_active(&self) -> RwLockReadGuard<'_, Option<ActiveRun>> {
        self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_active(&self) -> RwLockWriteGuard<'_, Option<ActiveRun>> {
        self.active.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a run holds the slot (running or draining)
    pub fn is_active(&self) -> bool {
        self.slot.load(Ordering::SeqCst) != IDLE
    }

    /// Whether the run in flight was cancelled
    pub fn is_cancelling(&self) -> bool {
        self.slot.load(Ordering::SeqCst) & CANCELLED != 0
    }

    pub(crate) fn record_discovered(&self) {
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// `(total, completed, failed)` without touching the active-run lock.
    ///
    /// `total` is read last so the triple never shows more processed files
    /// than discovered ones.
    pub fn counters(&self) -> (u64, u64, u64) {
        let completed = self.completed.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        let total = self.total.load(Ordering::SeqCst);
        (total, completed, failed)
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        let active = self.read_active();
        let (total, completed, failed) = self.counters();

        ProgressSnapshot {
            active_job: active.as_ref().map(|run| Arc::clone(&run.job)),
            run_id: active.as_ref().map(|run| run.run_id),
            started_at: active.as_ref().map(|run| run.started_at),
            cancelling: self.is_cancelling(),
            total,
            completed,
            failed,
        }
    }
}
