//! Async runtime facade for the loss-sync workspace.
//!
//! Engine crates depend on this crate instead of naming Tokio directly, so the
//! runtime surface they rely on is listed in one place.
//!
//! # Modules
//!
//! - `fs`: Async filesystem operations
//! - `io`: Async read/write traits and `copy`
//! - `process`: Child process spawning (external encoder/prober tools)
//! - `runtime`: Runtime construction and `block_on`
//! - `sync`: Channels, locks and `Notify`
//! - `task`: Task spawning and join sets
//! - `time`: Sleep, timeouts and intervals
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod fs;
pub mod io;
pub mod process;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
