//! # Host Bridge Traits
//!
//! Capability contracts that the sync engine requires but does not implement
//! itself.
//!
//! ## Overview
//!
//! The engine never shells out or talks to a logging backend directly. Each
//! trait here represents one external collaborator; the desktop build wires
//! them to `ffprobe`/`ffmpeg` child processes (`bridge-desktop`), tests wire
//! them to in-process fakes.
//!
//! ## Traits
//!
//! ### Media tools
//! - [`AudioProber`](media::AudioProber) - Inspect a file's streams and report its audio codec
//! - [`AudioEncoder`](media::AudioEncoder) - Re-encode a file's audio stream into a target format
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to a host logging pipeline
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should:
//!
//! - Convert tool-specific failures to `BridgeError`
//! - Keep the tool's stderr in the error so it can be shown next to the failed file
//! - Include error context (tool name, file path)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`: one instance is shared by every
//! worker of a sync run.
//!
//! ## Examples
//!
//! ### Implementing AudioProber
//!
//! ```ignore
//! use bridge_traits::error::Result;
//! use bridge_traits::media::{AudioProber, ProbeReport, StreamInfo};
//! use async_trait::async_trait;
//! use std::path::Path;
//!
//! pub struct AlwaysFlac;
//!
//! #[async_trait]
//! impl AudioProber for AlwaysFlac {
//!     async fn probe(&self, _path: &Path) -> Result<ProbeReport> {
//!         Ok(ProbeReport::new(vec![StreamInfo::new("audio", "flac")]))
//!     }
//! }
//! ```

pub mod error;
pub mod media;
pub mod logging;

pub use error::BridgeError;

pub use media::{AudioEncoder, AudioProber, EncodeRequest, ProbeReport, StreamInfo};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
