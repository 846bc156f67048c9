//! Task spawning and execution.
//!
//! - `spawn`: Returns a `JoinHandle<T>` that can be awaited
//! - `spawn_blocking`: For blocking work such as directory walks, runs on the
//!   runtime's blocking thread pool
//! - `JoinSet`: Owns a group of tasks and joins them in completion order
//!
//! # Examples
//!
//! ```rust
//! use core_async::task::{self, JoinSet};
//!
//! async fn example() {
//!     let mut set = JoinSet::new();
//!     for i in 0..4 {
//!         set.spawn(async move { i * 2 });
//!     }
//!
//!     let mut sum = 0;
//!     while let Some(result) = set.join_next().await {
//!         sum += result.unwrap();
//!     }
//!     assert_eq!(sum, 12);
//!
//!     let blocking = task::spawn_blocking(|| 1 + 1).await.unwrap();
//!     assert_eq!(blocking, 2);
//! }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle, JoinSet};

/// Spawns a new asynchronous task on the Tokio runtime.
///
/// The spawned task may run on a different thread.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
