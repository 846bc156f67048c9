//! # Transcode Decision Engine
//!
//! Decides whether a file is copied byte-for-byte or transcoded.
//!
//! ## Algorithm
//!
//! 1. Extension not in the recognized audio set → copy. No probe is run.
//! 2. Probe the file. No audio stream → copy.
//! 3. Re-encoding of matching formats disabled and the probed codec is
//!    compatible with the profile's encoder → copy.
//! 4. Otherwise → transcode with the job's profile.
//!
//! The extension check is a cheap filter in front of the expensive probe.

use crate::task::FileTask;
use crate::{Result, SyncError};
use bridge_traits::AudioProber;
use core_runtime::config::{OutputProfile, SyncJob};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Why a file is copied instead of transcoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyReason {
    /// Extension is not a recognized audio extension
    NotAudio,
    /// Recognized extension, but the probe found no audio stream
    NoAudioStream,
    /// Audio already in the target codec
    SameFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    RawCopy(CopyReason),
    Transcode(OutputProfile),
}

/// Whether a probed codec name already satisfies an encoder identifier.
///
/// Encoder identifiers embed the codec they produce (`libmp3lame` makes
/// `mp3`, `libopus` makes `opus`), so a substring match is used.
pub fn codec_matches(encoder: &str, codec: &str) -> bool {
    !codec.is_empty() && encoder.contains(codec)
}

pub struct TranscodeDecisionEngine {
    prober: Arc<dyn AudioProber>,
    audio_extensions: HashSet<String>,
}

impl TranscodeDecisionEngine {
    pub fn new<I, S>(prober: Arc<dyn AudioProber>, audio_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prober,
            audio_extensions: audio_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Whether the task's extension is in the recognized audio set
    pub fn is_recognized_audio(&self, task: &FileTask) -> bool {
        task.extension()
            .map(|ext| self.audio_extensions.contains(&ext))
            .unwrap_or(false)
    }

    /// # Errors
    ///
    /// [`SyncError::Probe`] if the prober fails on a recognized audio file.
    #[instrument(skip(self, task, job), fields(path = %task.display_path()))]
    pub async fn decide(&self, task: &FileTask, job: &SyncJob) -> Result<Decision> {
        if !self.is_recognized_audio(task) {
            return Ok(Decision::RawCopy(CopyReason::NotAudio));
        }

        let report = self
            .prober
            .probe(task.source())
            .await
            .map_err(|source| SyncError::Probe {
                path: task.source().to_path_buf(),
                source,
            })?;

        let Some(codec) = report.audio_codec() else {
            debug!("No audio stream, copying");
            return Ok(Decision::RawCopy(CopyReason::NoAudioStream));
        };

        if !job.reencode_same_format && codec_matches(job.profile.format.encoder, codec) {
            debug!(codec, "Already in target format, copying");
            return Ok(Decision::RawCopy(CopyReason::SameFormat));
        }

        debug!(codec, encoder = job.profile.format.encoder, "Transcoding");
        Ok(Decision::Transcode(job.profile.clone()))
    }
}
