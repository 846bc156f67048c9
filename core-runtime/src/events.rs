//! # Event Bus System
//!
//! Event-driven reporting for the sync engine using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The engine never formats text for people. It publishes language-neutral
//! events (a message key plus positional arguments, or an error with the
//! offending path) and front-ends render them however they like:
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ Sync workers ├──────────────>│ EventBus  ├─────────────────>│  Log pane  │
//! └──────────────┘               │ (broadcast│                  └────────────┘
//! ┌──────────────┐     emit      │  channel) │     subscribe    ┌────────────┐
//! │ Orchestrator ├──────────────>│           ├─────────────────>│  Log file  │
//! └──────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, LogEvent, MessageKey, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(256);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::Log {
//!         run_id: "run-1".to_string(),
//!         event: LogEvent::info(MessageKey::Copying, ["cover.jpg"]),
//!     }))
//!     .ok();
//!
//! if let Ok(CoreEvent::Sync(SyncEvent::Log { event, .. })) = stream.recv().await {
//!     assert_eq!(event.render(), "Copying cover.jpg");
//! }
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Size the buffer for bursts: every file produces at least one log event.
//! - **`RecvError::Closed`**: All senders have been dropped.
//!
//! Emitting with no subscribers returns an error; the engine ignores it.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// A sync emits one event per file, so this is larger than a typical UI
/// refresh interval's worth of copies of small files.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1024;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sync engine events
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Returns a short fixed description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Aborted { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Log {
                event: LogEvent::Error { .. },
                ..
            }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Started { .. })
            | CoreEvent::Sync(SyncEvent::Finished { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Log { .. }) => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Log Events
// ============================================================================

/// Stable identifiers for the informational messages a sync produces.
///
/// Front-ends look these up in their own translation tables; [`template`]
/// is the English fallback.
///
/// [`template`]: MessageKey::template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKey {
    /// Enumeration of the source tree has begun. No arguments.
    ScanningSource,
    /// A raw copy is about to start. `$1` = relative path.
    Copying,
    /// A transcode is about to start. `$1` = relative path.
    Transcoding,
    /// The destination already exists and the file was skipped. `$1` = relative path.
    PathAlreadyExists,
    /// The run finished. `$1` = total, `$2` = completed, `$3` = failed.
    Done,
}

impl MessageKey {
    /// Translation key
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKey::ScanningSource => "sync.scanning-source",
            MessageKey::Copying => "sync.copying",
            MessageKey::Transcoding => "sync.transcoding",
            MessageKey::PathAlreadyExists => "sync.path-already-exists",
            MessageKey::Done => "sync.done",
        }
    }

    /// English message with `$N` placeholders
    pub fn template(&self) -> &'static str {
        match self {
            MessageKey::ScanningSource => "Scanning source directory...",
            MessageKey::Copying => "Copying $1",
            MessageKey::Transcoding => "Transcoding $1",
            MessageKey::PathAlreadyExists => "Path $1 already exists, skipping",
            MessageKey::Done => "Done (total: $1, completed: $2, failed: $3)",
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the sync log feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "level", rename_all = "lowercase")]
pub enum LogEvent {
    /// Informational message identified by key
    Info { key: MessageKey, args: Vec<String> },
    /// A file (or the whole run) failed
    Error {
        /// Source-relative path of the failed file, if the failure is per-file
        path: Option<String>,
        message: String,
    },
}

impl LogEvent {
    pub fn info<I, S>(key: MessageKey, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LogEvent::Info {
            key,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn error(path: Option<String>, message: impl Into<String>) -> Self {
        LogEvent::Error {
            path,
            message: message.into(),
        }
    }

    /// Render with the English fallback templates
    pub fn render(&self) -> String {
        match self {
            LogEvent::Info { key, args } => render_template(key.template(), args),
            LogEvent::Error {
                path: Some(path),
                message,
            } => format!("Error: {}: {}", path, message),
            LogEvent::Error { path: None, message } => format!("Error: {}", message),
        }
    }
}

/// Substitute `$1`, `$2`, ... with the matching argument.
///
/// Placeholders without a matching argument are kept verbatim.
pub fn render_template(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let mut digits = String::new();
        while let Some(&(_, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            digits.push(d);
            chars.next();
        }

        let arg = digits
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| args.get(i));

        match arg {
            Some(value) => out.push_str(value),
            None => {
                out.push('$');
                out.push_str(&digits);
            }
        }
    }

    out
}

// ============================================================================
// Sync Events
// ============================================================================

/// Lifecycle and log events of a single sync run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum SyncEvent {
    /// A run claimed the engine.
    Started {
        run_id: String,
        job_name: String,
        source_dir: String,
        dest_dir: String,
    },
    /// A line for the log feed.
    Log { run_id: String, event: LogEvent },
    /// All workers exited; counters are final.
    Finished {
        run_id: String,
        total: u64,
        completed: u64,
        failed: u64,
        /// The run was cancelled before the queue drained
        cancelled: bool,
        duration_ms: u64,
    },
    /// The source tree could not be enumerated; nothing further ran.
    Aborted { run_id: String, message: String },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::Log { .. } => "Sync log",
            SyncEvent::Finished { .. } => "Sync finished",
            SyncEvent::Aborted { .. } => "Sync aborted",
        }
    }

    /// Run this event belongs to
    pub fn run_id(&self) -> &str {
        match self {
            SyncEvent::Started { run_id, .. }
            | SyncEvent::Log { run_id, .. }
            | SyncEvent::Finished { run_id, .. }
            | SyncEvent::Aborted { run_id, .. } => run_id,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream, SyncEvent};
///
/// let event_bus = EventBus::default();
/// let stream = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Sync(SyncEvent::Finished { .. })));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only events belonging to `run_id`.
    pub fn for_run(self, run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        self.filter(move |event| match event {
            CoreEvent::Sync(sync) => sync.run_id() == run_id,
        })
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders are dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
