//! Child process spawning.
//!
//! Re-exports Tokio's process API. Commands built here are awaited without
//! blocking a runtime worker thread, which matters when every worker in a
//! pool is waiting on an external encoder at the same time.
//!
//! # Examples
//!
//! ```rust,no_run
//! use core_async::process::Command;
//!
//! # async fn example() -> std::io::Result<()> {
//! let output = Command::new("ffprobe").arg("-version").output().await?;
//! assert!(output.status.success());
//! # Ok(())
//! # }
//! ```

pub use std::process::{ExitStatus, Output, Stdio};
pub use tokio::process::{Child, Command};
