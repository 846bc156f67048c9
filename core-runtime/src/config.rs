//! # Configuration Module
//!
//! Output formats, output profiles and sync definitions, plus their
//! persistence as a versioned JSON document.
//!
//! ## Overview
//!
//! The sync engine only ever sees a validated, immutable [`SyncJob`]. This
//! module owns everything upstream of that:
//!
//! - [`OutputFormat`] - the fixed catalog of encodable formats, keyed by a
//!   stable numeric id that is written to disk
//! - [`OutputProfile`] - a named format + bitrate pair
//! - [`SyncJob`] - source, destination, profile and per-sync flags
//! - [`AppConfig`] - the persisted collection of all of the above
//!
//! ## Persistence
//!
//! ```ignore
//! use core_runtime::config::AppConfig;
//!
//! let path = AppConfig::default_path()?;
//! let mut config = AppConfig::load(&path).await?;
//! config.lang_code = "es-419".to_string();
//! config.save(&path).await?;
//! ```
//!
//! Saving moves the previous file to `config.json.bak` before writing. If
//! a later load finds an empty or truncated file, the backup is restored
//! and loaded instead.

use crate::error::{Error, Result};
use core_async::fs;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Current on-disk document version
pub const CONFIG_VERSION: u32 = 1;

/// Directory under the user config dir holding the config file
pub const CONFIG_DIR_NAME: &str = "your-loss";

/// Config file name
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Language used when none is configured
pub const DEFAULT_LANG_CODE: &str = "en-us";

// ============================================================================
// Output formats
// ============================================================================

/// Whether a format discards audio information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Lossy,
    Lossless,
}

/// An encodable output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    /// Stable id written to the config file
    pub id: u32,
    pub name: &'static str,
    pub kind: FormatKind,
    /// File extension without the dot
    pub extension: &'static str,
    /// Encoder identifier passed to the encoding tool
    pub encoder: &'static str,
    /// Bitrate in bits per second; 0 for lossless formats
    pub suggested_bitrate: u32,
    pub supports_metadata: bool,
    pub supports_artwork: bool,
}

impl OutputFormat {
    pub fn is_lossless(&self) -> bool {
        self.kind == FormatKind::Lossless
    }

    /// Look up a catalog entry by its stable id
    pub fn by_id(id: u32) -> Option<OutputFormat> {
        OUTPUT_FORMATS.iter().copied().find(|format| format.id == id)
    }

    /// Look up a catalog entry by display name, ignoring case
    pub fn by_name(name: &str) -> Option<OutputFormat> {
        OUTPUT_FORMATS
            .iter()
            .copied()
            .find(|format| format.name.eq_ignore_ascii_case(name))
    }

    /// All supported formats, ordered by id
    pub fn all() -> &'static [OutputFormat] {
        &OUTPUT_FORMATS
    }
}

/// Supported output formats. Ids are persisted and must never be reused.
pub const OUTPUT_FORMATS: [OutputFormat; 7] = [
    OutputFormat {
        id: 0,
        name: "MP3",
        kind: FormatKind::Lossy,
        extension: "mp3",
        encoder: "libmp3lame",
        suggested_bitrate: 320_000,
        supports_metadata: true,
        supports_artwork: true,
    },
    OutputFormat {
        id: 1,
        name: "FLAC",
        kind: FormatKind::Lossless,
        extension: "flac",
        encoder: "flac",
        suggested_bitrate: 0,
        supports_metadata: true,
        supports_artwork: true,
    },
    OutputFormat {
        id: 2,
        name: "WAV",
        kind: FormatKind::Lossless,
        extension: "wav",
        encoder: "pcm_s16le",
        suggested_bitrate: 0,
        supports_metadata: true,
        supports_artwork: false,
    },
    OutputFormat {
        id: 3,
        name: "Opus",
        kind: FormatKind::Lossy,
        extension: "opus",
        encoder: "libopus",
        suggested_bitrate: 120_000,
        supports_metadata: true,
        supports_artwork: false,
    },
    OutputFormat {
        id: 4,
        name: "AAC",
        kind: FormatKind::Lossy,
        extension: "m4a",
        encoder: "aac",
        suggested_bitrate: 224_000,
        supports_metadata: true,
        supports_artwork: true,
    },
    OutputFormat {
        id: 5,
        name: "ALAC",
        kind: FormatKind::Lossless,
        extension: "m4a",
        encoder: "alac",
        suggested_bitrate: 0,
        supports_metadata: true,
        supports_artwork: true,
    },
    OutputFormat {
        id: 6,
        name: "AIFF",
        kind: FormatKind::Lossless,
        extension: "aif",
        encoder: "pcm_s16be",
        suggested_bitrate: 0,
        supports_metadata: true,
        supports_artwork: false,
    },
];

// ============================================================================
// Output profiles
// ============================================================================

/// A named target format and bitrate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputProfile {
    pub name: String,
    pub format: OutputFormat,
    /// Bits per second; ignored for lossless formats
    pub bitrate: u32,
}

impl OutputProfile {
    pub fn new(name: impl Into<String>, format: OutputFormat, bitrate: u32) -> Self {
        Self {
            name: name.into(),
            format,
            bitrate,
        }
    }

    /// Bitrate to request from the encoder.
    ///
    /// `None` for lossless formats. A lossy profile saved with bitrate 0
    /// falls back to the format's suggested bitrate.
    pub fn effective_bitrate(&self) -> Option<u32> {
        if self.format.is_lossless() {
            return None;
        }

        match self.bitrate {
            0 => Some(self.format.suggested_bitrate),
            bitrate => Some(bitrate),
        }
    }

    /// Profiles written to a fresh config
    pub fn defaults() -> Vec<OutputProfile> {
        let format = |id| OUTPUT_FORMATS[id];
        vec![
            OutputProfile::new("High-Quality MP3", format(0), 320_000),
            OutputProfile::new("Lossless FLAC", format(1), 0),
            OutputProfile::new("Lossless WAV", format(2), 0),
            OutputProfile::new("High-Quality AAC", format(4), 224_000),
            OutputProfile::new("Lossless ALAC", format(5), 0),
        ]
    }
}

// ============================================================================
// Sync jobs
// ============================================================================

/// One configured source to destination mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub name: String,
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub profile: OutputProfile,
    /// Replace characters most filesystems reject in each path component
    pub escape_filenames: bool,
    /// Transcode even when the source codec already matches the profile
    pub reencode_same_format: bool,
}

impl SyncJob {
    /// New job with `escape_filenames` on and `reencode_same_format` off
    pub fn new(
        name: impl Into<String>,
        source_dir: impl Into<PathBuf>,
        dest_dir: impl Into<PathBuf>,
        profile: OutputProfile,
    ) -> Self {
        Self {
            name: name.into(),
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            profile,
            escape_filenames: true,
            reencode_same_format: false,
        }
    }

    pub fn with_escape_filenames(mut self, escape: bool) -> Self {
        self.escape_filenames = escape;
        self
    }

    pub fn with_reencode_same_format(mut self, reencode: bool) -> Self {
        self.reencode_same_format = reencode;
        self
    }

    /// Check the job can be run.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(Error::Validation {
                name: self.name.clone(),
                reason: reason.to_string(),
            })
        };

        if self.name.trim().is_empty() {
            return invalid("missing name");
        }
        if self.source_dir.as_os_str().is_empty() {
            return invalid("missing source directory");
        }
        if self.dest_dir.as_os_str().is_empty() {
            return invalid("missing destination directory");
        }
        if !self.source_dir.is_dir() {
            return invalid("source directory does not exist");
        }
        if !self.dest_dir.is_dir() {
            return invalid("destination directory does not exist");
        }
        if same_dir(&self.source_dir, &self.dest_dir) {
            return invalid("source and destination are the same directory");
        }

        Ok(())
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

// ============================================================================
// External tools
// ============================================================================

/// Locations of the probe/encode binaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Kill a probe that runs longer than this; unset means wait forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_timeout_secs: Option<u64>,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            probe_timeout_secs: None,
        }
    }
}

impl ToolPaths {
    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout_secs.map(Duration::from_secs)
    }
}

// ============================================================================
// Application config
// ============================================================================

/// Everything persisted between runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub lang_code: String,
    pub profiles: Vec<OutputProfile>,
    pub syncs: Vec<SyncJob>,
    pub tools: ToolPaths,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            lang_code: DEFAULT_LANG_CODE.to_string(),
            profiles: OutputProfile::defaults(),
            syncs: Vec::new(),
            tools: ToolPaths::default(),
        }
    }
}

impl AppConfig {
    /// `<user config dir>/your-loss/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Config("Cannot determine user config directory".to_string()))?;
        Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn profile(&self, name: &str) -> Option<&OutputProfile> {
        self.profiles.iter().find(|profile| profile.name == name)
    }

    pub fn sync(&self, name: &str) -> Option<&SyncJob> {
        self.syncs.iter().find(|sync| sync.name == name)
    }

    /// Validate and append a sync.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] if the job is invalid or its name is taken.
    pub fn add_sync(&mut self, job: SyncJob) -> Result<()> {
        job.validate()?;

        if self.sync(&job.name).is_some() {
            return Err(Error::Validation {
                name: job.name,
                reason: "a sync with this name already exists".to_string(),
            });
        }

        self.syncs.push(job);
        Ok(())
    }

    /// Remove a sync by name, returning it if it existed
    pub fn remove_sync(&mut self, name: &str) -> Option<SyncJob> {
        let index = self.syncs.iter().position(|sync| sync.name == name)?;
        Some(self.syncs.remove(index))
    }

    /// Load from `path`.
    ///
    /// A missing file yields the default config. An empty or unparsable file
    /// is replaced by its `.bak` sibling, if one exists, and loaded again.
    pub async fn load(path: &Path) -> Result<Self> {
        match Self::read(path).await {
            Err(Error::Json(err)) if err.is_eof() || err.is_syntax() => {
                let backup = backup_path(path);
                if !fs::try_exists(&backup).await.unwrap_or(false) {
                    return Err(Error::Json(err));
                }

                warn!(
                    path = %path.display(),
                    error = %err,
                    "Config file is corrupt, restoring backup"
                );
                fs::rename(&backup, path).await.map_err(io_error(path))?;
                Self::read(path).await
            }
            other => other,
        }
    }

    async fn read(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => return Err(io_error(path)(err)),
        };

        Self::from_json(&bytes)
    }

    /// Write to `path`, keeping the previous file as `<path>.bak`.
    ///
    /// The new document is written to `<path>.tmp` and renamed into place,
    /// so `path` never holds a partial write. If the temp write fails the
    /// existing file and its backup are left untouched.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_error(parent))?;
        }

        let bytes = self.to_json()?;
        let temp = sibling_path(path, ".tmp");
        if let Err(err) = fs::write(&temp, bytes).await {
            fs::remove_file(&temp).await.ok();
            return Err(io_error(&temp)(err));
        }

        if fs::try_exists(path).await.unwrap_or(false) {
            let backup = backup_path(path);
            fs::rename(path, &backup).await.map_err(io_error(path))?;
        }

        fs::rename(&temp, path).await.map_err(io_error(path))?;
        debug!(path = %path.display(), syncs = self.syncs.len(), "Saved config");
        Ok(())
    }

    /// Decode a config document.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] for malformed JSON
    /// - [`Error::UnsupportedVersion`] for any version other than 1
    /// - [`Error::UnknownFormat`] for a profile referencing an unknown format id
    /// - [`Error::UnknownProfile`] for a sync referencing an unknown profile name
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let header: VersionHeader = serde_json::from_slice(bytes)?;
        if header.version != CONFIG_VERSION {
            return Err(Error::UnsupportedVersion(header.version));
        }

        let document: ConfigDocumentV1 = serde_json::from_slice(bytes)?;

        let profiles = document
            .profiles
            .into_iter()
            .map(|profile| {
                let format = OutputFormat::by_id(profile.output_format_id)
                    .ok_or(Error::UnknownFormat(profile.output_format_id))?;
                Ok(OutputProfile::new(profile.name, format, profile.bitrate))
            })
            .collect::<Result<Vec<_>>>()?;

        let syncs = document
            .syncs
            .into_iter()
            .map(|sync| {
                let profile = profiles
                    .iter()
                    .find(|profile| profile.name == sync.profile_name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownProfile(sync.profile_name.clone()))?;
                Ok(SyncJob {
                    name: sync.name,
                    source_dir: sync.source_dir,
                    dest_dir: sync.dest_dir,
                    profile,
                    escape_filenames: sync.escape_filenames,
                    reencode_same_format: sync.reencode_same_format,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            lang_code: document.lang_code,
            profiles,
            syncs,
            tools: document.tools.unwrap_or_default(),
        })
    }

    /// Encode as a version 1 document
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let document = ConfigDocumentV1 {
            version: CONFIG_VERSION,
            lang_code: self.lang_code.clone(),
            syncs: self
                .syncs
                .iter()
                .map(|sync| SyncDocument {
                    name: sync.name.clone(),
                    source_dir: sync.source_dir.clone(),
                    dest_dir: sync.dest_dir.clone(),
                    profile_name: sync.profile.name.clone(),
                    escape_filenames: sync.escape_filenames,
                    reencode_same_format: sync.reencode_same_format,
                })
                .collect(),
            profiles: self
                .profiles
                .iter()
                .map(|profile| ProfileDocument {
                    name: profile.name.clone(),
                    output_format_id: profile.format.id,
                    bitrate: profile.bitrate,
                })
                .collect(),
            tools: Some(self.tools.clone()),
        };

        Ok(serde_json::to_vec_pretty(&document)?)
    }
}

fn backup_path(path: &Path) -> PathBuf {
    sibling_path(path, ".bak")
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigDocumentV1 {
    version: u32,
    #[serde(default)]
    lang_code: String,
    #[serde(default)]
    syncs: Vec<SyncDocument>,
    #[serde(default)]
    profiles: Vec<ProfileDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tools: Option<ToolPaths>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncDocument {
    name: String,
    source_dir: PathBuf,
    dest_dir: PathBuf,
    profile_name: String,
    escape_filenames: bool,
    reencode_same_format: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileDocument {
    name: String,
    output_format_id: u32,
    bitrate: u32,
}
