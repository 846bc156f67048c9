//! Async filesystem helpers re-exported from the underlying runtime.
//!
//! The APIs are kept identical to Tokio's so downstream crates can rely on the
//! familiar surface without depending on Tokio directly.

pub use tokio::fs::{
    copy, create_dir, create_dir_all, metadata, read, read_dir, read_to_string, remove_file,
    rename, symlink_metadata, try_exists, write, DirEntry, File, OpenOptions,
};
