use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Tool not found: {tool} ({message})")]
    ToolNotFound { tool: String, message: String },

    #[error("{tool} exited with code {exit_code}: {stderr}")]
    ProcessFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("{tool} produced unreadable output for {path}: {message}")]
    InvalidOutput {
        tool: String,
        path: PathBuf,
        message: String,
    },

    #[error("{tool} timed out after {seconds} seconds")]
    Timeout { tool: String, seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
