//! # Sync Engine
//!
//! Mirrors a source directory tree into a destination tree, transcoding
//! recognized audio files to an output profile and copying everything else
//! byte for byte.
//!
//! ## Overview
//!
//! A sync is a one-shot, cancellable bulk job:
//! - Walking the source tree and counting every file as it is found
//! - Deciding per file between raw copy and transcode (probing audio files)
//! - Writing each output through a temp file and renaming it into place
//! - Skipping outputs that already exist, so re-running is cheap
//! - Reporting a language-neutral log feed and pollable progress counters
//!
//! ## Components
//!
//! - **Filename Sanitizer** (`sanitize`): Filesystem-safe names for every path component
//! - **Tree Enumerator** (`enumerator`): Deterministic walk of the source tree
//! - **Transcode Decision Engine** (`decision`): Copy or transcode, probing only when needed
//! - **File Task** (`task`): One source file and its destination paths
//! - **Worker Pool** (`worker`): Per-CPU workers draining the task queue
//! - **Progress Tracker** (`progress`): Atomic counters and the active-run slot
//! - **Sync Coordinator** (`coordinator`): Runs a job from start to summary

pub mod config;
pub mod coordinator;
pub mod decision;
pub mod enumerator;
pub mod error;
pub mod progress;
pub mod sanitize;
pub mod task;
pub mod worker;

pub use config::{SyncConfig, DEFAULT_AUDIO_EXTENSIONS};
pub use coordinator::{SyncCoordinator, SyncSummary};
pub use decision::{codec_matches, CopyReason, Decision, TranscodeDecisionEngine};
pub use enumerator::TreeEnumerator;
pub use error::{Result, SyncError};
pub use progress::{ProgressSnapshot, ProgressTracker, SyncRunId};
pub use sanitize::{sanitize_filename, sanitize_relative_path, MAX_NAME_CHARS};
pub use task::FileTask;
pub use worker::{FileOutcome, WorkerPool};
