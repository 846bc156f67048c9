use bridge_traits::BridgeError;
use core_async::task::JoinError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The source tree could not be walked. Fatal to the whole run.
    #[error("Cannot enumerate {path}: {source}")]
    Enumeration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sync already in progress (run {run_id})")]
    SyncInProgress { run_id: String },

    #[error("No sync is running")]
    NotRunning,

    #[error("Invalid sync job: {0}")]
    InvalidJob(String),

    #[error("Invalid run ID: {0}")]
    InvalidRunId(String),

    #[error("{path} is not inside {root}")]
    OutsideSource { path: PathBuf, root: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Probe failed for {path}: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    #[error("Encode failed for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    #[error("Sync task failed: {0}")]
    Task(#[from] JoinError),
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> SyncError {
        let path = path.into();
        move |source| SyncError::Io { path, source }
    }

    /// Whether the error only affects a single file
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            SyncError::Io { .. }
                | SyncError::Probe { .. }
                | SyncError::Encode { .. }
                | SyncError::OutsideSource { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
