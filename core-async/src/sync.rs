//! Synchronization primitives.
//!
//! Async-aware locks and channels from `tokio::sync`. They are `Send + Sync`
//! and never block the executor while waiting.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{mpsc, Mutex};
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let (tx, rx) = mpsc::unbounded_channel::<u32>();
//!     let shared_rx = Arc::new(Mutex::new(rx));
//!
//!     tx.send(7).unwrap();
//!     drop(tx);
//!
//!     let value = shared_rx.lock().await.recv().await;
//!     assert_eq!(value, Some(7));
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore, SemaphorePermit,
};
