//! # File Task
//!
//! One enumerated source file and the destination paths derived from it.

use crate::sanitize::sanitize_relative_path;
use crate::{Result, SyncError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix of the temporary file a raw copy is written to
pub const TEMP_SUFFIX: &str = ".tmp";

/// A single file awaiting classification and processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    source: PathBuf,
    relative: PathBuf,
}

impl FileTask {
    /// Build a task for `source`, which must live under `source_root`.
    ///
    /// With `escape_filenames` every component of the relative path is
    /// sanitized.
    pub fn new(source_root: &Path, source: PathBuf, escape_filenames: bool) -> Result<Self> {
        let relative = source
            .strip_prefix(source_root)
            .map_err(|_| SyncError::OutsideSource {
                path: source.clone(),
                root: source_root.to_path_buf(),
            })?;

        let relative = if escape_filenames {
            sanitize_relative_path(relative)
        } else {
            relative.to_path_buf()
        };

        Ok(Self { source, relative })
    }

    /// Absolute path of the source file
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Path relative to the source root, sanitized when requested
    pub fn relative_path(&self) -> &Path {
        &self.relative
    }

    /// Relative path as shown in log events
    pub fn display_path(&self) -> String {
        self.relative.to_string_lossy().into_owned()
    }

    /// Lower-cased text after the last `.` of the file name, if any
    pub fn extension(&self) -> Option<String> {
        let name = self.relative.file_name()?.to_string_lossy();
        let (_, extension) = name.rsplit_once('.')?;
        if extension.is_empty() {
            return None;
        }
        Some(extension.to_lowercase())
    }

    /// Directory the output lands in
    pub fn destination_dir(&self, dest_root: &Path) -> PathBuf {
        match self.relative.parent() {
            Some(parent) => dest_root.join(parent),
            None => dest_root.to_path_buf(),
        }
    }

    /// Output path for a byte-for-byte copy
    pub fn copy_destination(&self, dest_root: &Path) -> PathBuf {
        dest_root.join(&self.relative)
    }

    /// Output path for a transcode: the file name with its extension
    /// replaced by `extension`
    pub fn transcode_destination(&self, dest_root: &Path, extension: &str) -> PathBuf {
        let name = self
            .relative
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let stem = match name.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => name.as_str(),
        };

        self.destination_dir(dest_root)
            .join(format!("{}.{}", stem, extension))
    }
}

/// `<dest>.tmp`
pub fn copy_temp_path(dest: &Path) -> PathBuf {
    with_suffix(dest, TEMP_SUFFIX)
}

/// `<dest>.tmp.<extension>`
///
/// The extension is kept last so the encoder can infer the container.
pub fn transcode_temp_path(dest: &Path, extension: &str) -> PathBuf {
    with_suffix(dest, &format!("{}.{}", TEMP_SUFFIX, extension))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
