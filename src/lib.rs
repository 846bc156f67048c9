//! Workspace facade crate.
//!
//! Host applications (a desktop window, a headless runner) can depend on
//! `loss-sync` and enable the documented features instead of wiring each
//! workspace crate individually.
//!
//! - `engine`: the sync engine (`core-sync`) and its runtime (`core-runtime`)
//! - `desktop` (default): `engine` plus the ffmpeg/ffprobe-backed capabilities

#[cfg(feature = "engine")]
pub use core_runtime as runtime;

#[cfg(feature = "engine")]
pub use core_sync as sync;

#[cfg(feature = "desktop")]
pub use bridge_desktop as desktop;

#[cfg(feature = "engine")]
pub use core_runtime::config::{AppConfig, OutputFormat, OutputProfile, SyncJob};

#[cfg(feature = "engine")]
pub use core_sync::{ProgressSnapshot, SyncConfig, SyncCoordinator, SyncSummary};
