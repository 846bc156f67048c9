//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the sync engine and its
//! front-ends:
//! - Logging and tracing infrastructure
//! - Persisted configuration (output formats, profiles, sync definitions)
//! - Event bus carrying language-neutral sync events
//!
//! ## Overview
//!
//! Nothing in this crate touches the files being synced. It establishes the
//! logging conventions, the configuration records the engine consumes, and
//! the broadcast channel the engine reports through.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
