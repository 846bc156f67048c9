//! Media Tool Abstractions
//!
//! Contracts for the two external audio tools the sync engine depends on:
//! a prober that lists a file's streams and an encoder that re-encodes the
//! audio stream while copying every other stream through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Codec type reported for audio streams.
pub const AUDIO_CODEC_TYPE: &str = "audio";

/// One stream inside a media container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Stream kind ("audio", "video", "data", ...)
    #[serde(default)]
    pub codec_type: String,
    /// Codec short name ("flac", "mp3", "aac", ...)
    #[serde(default)]
    pub codec_name: String,
}

impl StreamInfo {
    pub fn new(codec_type: impl Into<String>, codec_name: impl Into<String>) -> Self {
        Self {
            codec_type: codec_type.into(),
            codec_name: codec_name.into(),
        }
    }
}

/// Result of probing a file
///
/// Field names match the `-show_streams` JSON emitted by ffprobe so the
/// desktop bridge can deserialize the tool output directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<StreamInfo>,
}

impl ProbeReport {
    pub fn new(streams: Vec<StreamInfo>) -> Self {
        Self { streams }
    }

    /// Codec name of the first audio stream.
    ///
    /// Returns `None` when the file has no audio stream, or when the first
    /// audio stream carries no codec name.
    pub fn audio_codec(&self) -> Option<&str> {
        self.streams
            .iter()
            .find(|stream| stream.codec_type == AUDIO_CODEC_TYPE)
            .map(|stream| stream.codec_name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Whether the file has a usable audio stream
    pub fn has_audio(&self) -> bool {
        self.audio_codec().is_some()
    }
}

/// A single transcode invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    /// Source file
    pub input: PathBuf,
    /// File to create; parent directory must already exist
    pub output: PathBuf,
    /// Target encoder identifier (e.g. "libmp3lame", "flac")
    pub encoder: String,
    /// Target audio bitrate in bits per second; `None` for lossless targets
    pub bitrate: Option<u32>,
}

/// Audio prober trait
///
/// Implementations inspect a file and list its streams. The call is
/// expected to block the calling task until the external tool exits; any
/// timeout policy belongs to the implementation.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::media::AudioProber;
///
/// async fn is_audio(prober: &dyn AudioProber, path: &Path) -> bool {
///     prober.probe(path).await.map(|r| r.has_audio()).unwrap_or(false)
/// }
/// ```
#[async_trait]
pub trait AudioProber: Send + Sync {
    /// List the streams contained in `path`
    async fn probe(&self, path: &Path) -> Result<ProbeReport>;
}

/// Audio encoder trait
///
/// Re-encodes the audio stream of `request.input` into `request.output`
/// using `request.encoder`, copying video/data streams (cover art) through
/// unmodified. On error the output file may be partially written; callers
/// are responsible for removing it.
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    /// Run one transcode to completion
    async fn encode(&self, request: &EncodeRequest) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_codec_picks_first_audio_stream() {
        let report = ProbeReport::new(vec![
            StreamInfo::new("video", "mjpeg"),
            StreamInfo::new("audio", "flac"),
            StreamInfo::new("audio", "aac"),
        ]);

        assert_eq!(report.audio_codec(), Some("flac"));
        assert!(report.has_audio());
    }

    #[test]
    fn test_no_audio_stream() {
        let report = ProbeReport::new(vec![StreamInfo::new("video", "h264")]);
        assert_eq!(report.audio_codec(), None);
        assert!(!report.has_audio());

        assert!(!ProbeReport::default().has_audio());
    }

    #[test]
    fn test_empty_codec_name_counts_as_no_audio() {
        let report = ProbeReport::new(vec![
            StreamInfo::new("audio", ""),
            StreamInfo::new("audio", "mp3"),
        ]);
        assert_eq!(report.audio_codec(), None);
    }

    #[test]
    fn test_deserialize_ffprobe_output() {
        let json = r#"{
            "streams": [
                {"index": 0, "codec_name": "mp3", "codec_type": "audio", "sample_rate": "44100"},
                {"index": 1, "codec_name": "png", "codec_type": "video"},
                {"index": 2, "codec_type": "data"}
            ]
        }"#;

        let report: ProbeReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.streams.len(), 3);
        assert_eq!(report.streams[2].codec_name, "");
        assert_eq!(report.audio_codec(), Some("mp3"));
    }

    #[test]
    fn test_deserialize_missing_streams() {
        let report: ProbeReport = serde_json::from_str("{}").unwrap();
        assert!(report.streams.is_empty());
    }
}
