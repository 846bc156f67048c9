use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported config version {0}")]
    UnsupportedVersion(u32),

    #[error("Unknown output format id {0}")]
    UnknownFormat(u32),

    #[error("Unknown output profile \"{0}\"")]
    UnknownProfile(String),

    #[error("Invalid sync \"{name}\": {reason}")]
    Validation { name: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
