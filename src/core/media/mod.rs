//! ffmpeg / ffprobe process wrappers used by the media tools.

pub mod commands;
mod probe;
mod transcode;

use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

pub use commands::{Placement, Resolution};
pub use probe::{MediaInfo, parse_probe_output};
pub use transcode::transcode_with_progress;

const VERSION_TIMEOUT: Duration = Duration::from_secs(1);
const STDERR_TAIL_CHARS: usize = 400;

static VERSION_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"ffmpeg\s+(?:version\s+)?([0-9n][0-9a-zA-Z.-]*)").ok());

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to launch {binary}: {reason}")]
    Spawn { binary: String, reason: String },
    #[error("{binary} exited with status {status}: {stderr}")]
    Failed {
        binary: String,
        status: i32,
        stderr: String,
    },
    #[error("{binary} timed out after {seconds}s")]
    Timeout { binary: String, seconds: u64 },
    #[error("failed to parse ffprobe output: {0}")]
    Probe(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Locations of the ffmpeg and ffprobe binaries plus the command runners.
#[derive(Debug, Clone)]
pub struct MediaToolkit {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for MediaToolkit {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl MediaToolkit {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn ffmpeg(&self) -> &str {
        &self.ffmpeg
    }

    /// Version string reported by `ffmpeg -version`.
    pub async fn version(&self) -> MediaResult<String> {
        let stdout = self
            .capture(&self.ffmpeg, &["-version".to_string()], Some(VERSION_TIMEOUT))
            .await?;
        let text = String::from_utf8_lossy(&stdout);
        VERSION_RE
            .as_ref()
            .and_then(|re| re.captures(&text))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| MediaError::Probe("ffmpeg version not found in output".to_string()))
    }

    /// Whether the ffmpeg build was configured with every given flag.
    pub async fn has_build_flags(&self, flags: &[&str]) -> MediaResult<bool> {
        let stdout = self
            .capture(&self.ffmpeg, &["-version".to_string()], Some(VERSION_TIMEOUT))
            .await?;
        let text = String::from_utf8_lossy(&stdout);
        let configuration = text
            .lines()
            .find(|l| l.trim_start().starts_with("configuration:"))
            .unwrap_or_default();
        Ok(flags.iter().all(|f| configuration.contains(f)))
    }

    /// Stream summary of a media file.
    pub async fn probe(&self, path: &str) -> MediaResult<MediaInfo> {
        let args: Vec<String> = [
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            path,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let stdout = self.capture(&self.ffprobe, &args, None).await?;
        parse_probe_output(&stdout).map_err(|e| MediaError::Probe(e.to_string()))
    }

    /// Run ffmpeg to completion.
    pub async fn run(&self, args: &[String], timeout: Option<Duration>) -> MediaResult<()> {
        self.capture(&self.ffmpeg, args, timeout).await.map(|_| ())
    }

    async fn capture(
        &self,
        binary: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> MediaResult<Vec<u8>> {
        info!("Executing command: {} {}", binary, args.join(" "));

        let child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::Spawn {
                binary: binary.to_string(),
                reason: e.to_string(),
            })?;

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| MediaError::Timeout {
                    binary: binary.to_string(),
                    seconds: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Failed {
                binary: binary.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: tail(&stderr, STDERR_TAIL_CHARS),
            });
        }

        debug!(binary = %binary, bytes = output.stdout.len(), "Command finished");
        Ok(output.stdout)
    }
}

/// Last `max` characters of `text`, trimmed.
fn tail(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_regex() {
        let re = VERSION_RE.as_ref().unwrap();
        let caps = re
            .captures("ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023")
            .unwrap();
        assert_eq!(&caps[1], "6.1.1-3ubuntu5");
        let caps = re.captures("ffmpeg version n7.0 Copyright").unwrap();
        assert_eq!(&caps[1], "n7.0");
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("  short  ", 10), "short");
        assert_eq!(tail("abcdef", 3), "def");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let toolkit = MediaToolkit::new("/nonexistent/ffmpeg-binary", "/nonexistent/ffprobe");
        assert!(matches!(
            toolkit.version().await,
            Err(MediaError::Spawn { .. })
        ));
        assert!(matches!(
            toolkit.probe("clip.mp4").await,
            Err(MediaError::Spawn { .. })
        ));
    }
}
