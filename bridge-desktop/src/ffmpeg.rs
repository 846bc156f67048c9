//! ffprobe/ffmpeg child-process implementation of the media bridges

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::{AudioEncoder, AudioProber, EncodeRequest, ProbeReport},
};
use core_async::process::{Command, Output, Stdio};
use core_async::time::{timeout, Duration};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Binary looked up on `PATH` when no explicit ffmpeg path is configured
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Binary looked up on `PATH` when no explicit ffprobe path is configured
pub const DEFAULT_FFPROBE: &str = "ffprobe";

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";

/// Media tools backed by the ffmpeg suite
///
/// No timeout is applied unless one is configured; a hung tool then blocks
/// its worker until it exits.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    probe_timeout: Option<Duration>,
    encode_timeout: Option<Duration>,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG, DEFAULT_FFPROBE)
    }
}

impl FfmpegTools {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            probe_timeout: None,
            encode_timeout: None,
        }
    }

    /// Kill ffprobe if it runs longer than `limit`
    pub fn with_probe_timeout(mut self, limit: Duration) -> Self {
        self.probe_timeout = Some(limit);
        self
    }

    /// Kill ffmpeg if a single transcode runs longer than `limit`
    pub fn with_encode_timeout(mut self, limit: Duration) -> Self {
        self.encode_timeout = Some(limit);
        self
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe_path
    }

    /// Check that both binaries can be executed
    ///
    /// Front-ends call this before starting a sync so a missing install is
    /// reported once instead of as one failure per audio file.
    pub async fn verify(&self) -> Result<()> {
        let version = [OsString::from("-version")];
        self.run(FFPROBE, &self.ffprobe_path, &version, None).await?;
        self.run(FFMPEG, &self.ffmpeg_path, &version, None).await?;
        debug!(
            ffmpeg = %self.ffmpeg_path.display(),
            ffprobe = %self.ffprobe_path.display(),
            "Media tools available"
        );
        Ok(())
    }

    async fn run(
        &self,
        tool: &str,
        program: &Path,
        args: &[OsString],
        limit: Option<Duration>,
    ) -> Result<Output> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let pending = command.output();
        let outcome = match limit {
            Some(limit) => timeout(limit, pending).await.map_err(|_| BridgeError::Timeout {
                tool: tool.to_string(),
                seconds: limit.as_secs(),
            })?,
            None => pending.await,
        };

        let output = outcome.map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => BridgeError::ToolNotFound {
                tool: tool.to_string(),
                message: format!("{}: {}", program.display(), e),
            },
            _ => BridgeError::Io(e),
        })?;

        if !output.status.success() {
            return Err(BridgeError::ProcessFailed {
                tool: tool.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

fn probe_args(path: &Path) -> Vec<OsString> {
    vec![
        "-v".into(),
        "error".into(),
        "-print_format".into(),
        "json".into(),
        "-show_streams".into(),
        path.as_os_str().to_os_string(),
    ]
}

fn encode_args(request: &EncodeRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-nostdin".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        request.input.as_os_str().to_os_string(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        OsString::from(&request.encoder),
    ];

    if let Some(bitrate) = request.bitrate {
        args.push("-b:a".into());
        args.push(bitrate.to_string().into());
    }

    args.push(request.output.as_os_str().to_os_string());
    args
}

fn parse_probe_output(path: &Path, stdout: &[u8]) -> Result<ProbeReport> {
    serde_json::from_slice(stdout).map_err(|e| BridgeError::InvalidOutput {
        tool: FFPROBE.to_string(),
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[async_trait]
impl AudioProber for FfmpegTools {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn probe(&self, path: &Path) -> Result<ProbeReport> {
        let output = self
            .run(FFPROBE, &self.ffprobe_path, &probe_args(path), self.probe_timeout)
            .await?;
        let report = parse_probe_output(path, &output.stdout)?;
        debug!(streams = report.streams.len(), codec = ?report.audio_codec(), "Probed file");
        Ok(report)
    }
}

#[async_trait]
impl AudioEncoder for FfmpegTools {
    #[instrument(skip(self, request), fields(input = %request.input.display(), encoder = %request.encoder))]
    async fn encode(&self, request: &EncodeRequest) -> Result<()> {
        self.run(
            FFMPEG,
            &self.ffmpeg_path,
            &encode_args(request),
            self.encode_timeout,
        )
        .await?;
        debug!(output = %request.output.display(), "Encoded file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(bitrate: Option<u32>) -> EncodeRequest {
        EncodeRequest {
            input: PathBuf::from("/music/in.flac"),
            output: PathBuf::from("/out/in.mp3.tmp.mp3"),
            encoder: "libmp3lame".to_string(),
            bitrate,
        }
    }

    #[test]
    fn test_encode_args_lossy() {
        let args = encode_args(&request(Some(320_000)));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let bitrate_flag = args.iter().position(|a| a == "-b:a").unwrap();
        assert_eq!(args[bitrate_flag + 1], "320000");

        let codec_flag = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[codec_flag + 1], "libmp3lame");

        let video_flag = args.iter().position(|a| a == "-c:v").unwrap();
        assert_eq!(args[video_flag + 1], "copy");

        assert_eq!(args.last().unwrap(), "/out/in.mp3.tmp.mp3");
        assert!(args.contains(&"-y".to_string()));
    }

    #[test]
    fn test_encode_args_lossless_omits_bitrate() {
        let args = encode_args(&request(None));
        assert!(!args.iter().any(|a| a == "-b:a"));
    }

    #[test]
    fn test_probe_args_end_with_path() {
        let args = probe_args(Path::new("/music/a.flac"));
        assert_eq!(args.last().unwrap(), "/music/a.flac");
        assert!(args.iter().any(|a| a == "-show_streams"));
    }

    #[test]
    fn test_parse_probe_output() {
        let stdout = br#"{"streams":[{"codec_type":"audio","codec_name":"opus"}]}"#;
        let report = parse_probe_output(Path::new("a.opus"), stdout).unwrap();
        assert_eq!(report.audio_codec(), Some("opus"));
    }

    #[test]
    fn test_parse_probe_output_invalid() {
        let err = parse_probe_output(Path::new("a.opus"), b"not json").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidOutput { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_reports_tool_not_found() {
        let tools = FfmpegTools::new(
            "/nonexistent/loss-sync/ffmpeg",
            "/nonexistent/loss-sync/ffprobe",
        );

        let err = tools.probe(Path::new("a.flac")).await.unwrap_err();
        assert!(matches!(err, BridgeError::ToolNotFound { ref tool, .. } if tool == "ffprobe"));

        let err = tools.encode(&request(None)).await.unwrap_err();
        assert!(matches!(err, BridgeError::ToolNotFound { ref tool, .. } if tool == "ffmpeg"));

        assert!(tools.verify().await.is_err());
    }

    #[test]
    fn test_builder() {
        let tools = FfmpegTools::default()
            .with_probe_timeout(Duration::from_secs(30))
            .with_encode_timeout(Duration::from_secs(600));

        assert_eq!(tools.ffmpeg_path(), Path::new(DEFAULT_FFMPEG));
        assert_eq!(tools.ffprobe_path(), Path::new(DEFAULT_FFPROBE));
        assert_eq!(tools.probe_timeout, Some(Duration::from_secs(30)));
        assert_eq!(tools.encode_timeout, Some(Duration::from_secs(600)));
    }
}
