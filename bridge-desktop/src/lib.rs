//! # Desktop Bridge Implementations
//!
//! Default implementations of the media bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `AudioProber` using `ffprobe -show_streams`
//! - `AudioEncoder` using `ffmpeg`, re-encoding the audio stream and copying
//!   video (cover art) streams through
//!
//! Both tools are spawned as child processes on the async runtime, so a pool
//! of sync workers can wait on many of them at once.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::FfmpegTools;
//! use std::sync::Arc;
//!
//! let tools = Arc::new(FfmpegTools::default());
//! tools.verify().await?;
//!
//! // Hand the same instance to the coordinator as prober and encoder
//! let coordinator = SyncCoordinator::new(config, tools.clone(), tools, event_bus);
//! ```

mod ffmpeg;

pub use ffmpeg::{FfmpegTools, DEFAULT_FFMPEG, DEFAULT_FFPROBE};
