use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

use super::{ExtractedAudio, MediaExtractor};
use crate::utils::filename_stem;
use crate::Result;

/// Smallest audio-only stream, no ffmpeg post-processing required
const AUDIO_FORMAT_SELECTOR: &str = "worstaudio[ext=m4a]/worstaudio[ext=webm]/worstaudio/bestaudio";

/// YouTube audio downloader using yt-dlp
pub struct YoutubeDownloader {
    yt_dlp_path: String,
    timeout: Duration,
    max_media_bytes: u64,
}

/// Metadata read before downloading
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub title: String,
    pub duration_seconds: u64,
}

impl VideoInfo {
    /// Pull title and duration out of `--dump-json` output
    pub fn from_json(info: &Value) -> Self {
        let title = info["title"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Untitled Video".to_string());
        let duration_seconds = info["duration"]
            .as_f64()
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d as u64)
            .unwrap_or(0);

        Self { title, duration_seconds }
    }
}

impl YoutubeDownloader {
    pub fn new(yt_dlp_path: String, timeout: Duration, max_media_bytes: u64) -> Self {
        Self {
            yt_dlp_path,
            timeout,
            max_media_bytes,
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        crate::utils::check_command_available(&self.yt_dlp_path).await
    }

    /// Get video information using yt-dlp
    async fn get_video_info(&self, url: &str) -> Result<VideoInfo> {
        tracing::debug!("Extracting video info for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--no-playlist", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        let info: Value = serde_json::from_slice(&output.stdout)
            .context("yt-dlp returned malformed JSON")?;

        Ok(VideoInfo::from_json(&info))
    }

    /// Download the audio stream into `dir`, returning the written file
    async fn download_stream(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        tracing::debug!("Downloading audio stream for: {}", url);

        let template = dir.join("audio.%(ext)s").to_string_lossy().into_owned();
        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output",
                template.as_str(),
                "--format",
                AUDIO_FORMAT_SELECTOR,
                "--no-playlist",
                "--concurrent-fragments",
                "4",
                "--quiet",
                "--no-warnings",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to download audio: {}", error.trim());
        }

        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_partial = path
                .extension()
                .map(|ext| ext == "part" || ext == "ytdl")
                .unwrap_or(false);
            if path.is_file() && !is_partial {
                return Ok(path);
            }
        }

        anyhow::bail!("Download failed, audio file not found")
    }

    async fn extract(&self, url: &str) -> Result<ExtractedAudio> {
        if !self.check_availability().await {
            anyhow::bail!("yt-dlp is not available. Please install it: https://github.com/yt-dlp/yt-dlp");
        }

        let info = self.get_video_info(url).await?;

        let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
        let audio_path = self.download_stream(url, temp_dir.path()).await?;

        let size = tokio::fs::metadata(&audio_path)
            .await
            .context("Failed to stat downloaded audio")?
            .len();
        if size > self.max_media_bytes {
            anyhow::bail!(
                "Downloaded audio is {} bytes, larger than the {} byte limit",
                size,
                self.max_media_bytes
            );
        }

        let bytes = tokio::fs::read(&audio_path)
            .await
            .context("Failed to read downloaded audio")?;
        if bytes.is_empty() {
            anyhow::bail!("yt-dlp produced an empty audio stream");
        }

        let extension = audio_path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("mp3");

        Ok(ExtractedAudio {
            bytes,
            filename: format!("{}.{}", filename_stem(&info.title), extension),
            title: Some(info.title),
            duration_seconds: Some(info.duration_seconds),
        })
    }
}

#[async_trait]
impl MediaExtractor for YoutubeDownloader {
    async fn download(&self, url: &str) -> Result<ExtractedAudio> {
        tokio::time::timeout(self.timeout, self.extract(url))
            .await
            .map_err(|_| anyhow::anyhow!("yt-dlp timed out after {}s", self.timeout.as_secs()))?
    }

    fn strategy_name(&self) -> &'static str {
        "yt-dlp"
    }
}
