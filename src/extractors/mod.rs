use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod cobalt;
pub mod youtube;

use crate::config::AcquisitionConfig;
use crate::{Result, TranscrifyError};

/// Source platform of a media URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Direct extraction via yt-dlp is attempted first
    Youtube,
    Instagram,
    Tiktok,
    Other,
}

/// Detection order matters: first match wins.
const PLATFORM_PATTERNS: &[(Platform, &[&str])] = &[
    (Platform::Youtube, &["youtube.com", "youtu.be"]),
    (Platform::Instagram, &["instagram.com"]),
    (Platform::Tiktok, &["tiktok.com"]),
];

impl Platform {
    /// Classify a URL. Total: malformed input yields `Other`.
    pub fn detect(url: &str) -> Self {
        let url_lower = url.to_lowercase();

        PLATFORM_PATTERNS
            .iter()
            .find(|(_, needles)| needles.iter().any(|needle| url_lower.contains(needle)))
            .map(|(platform, _)| *platform)
            .unwrap_or(Platform::Other)
    }

    pub fn all() -> [Platform; 4] {
        [Platform::Youtube, Platform::Instagram, Platform::Tiktok, Platform::Other]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Other => "other",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Youtube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::Tiktok => "TikTok",
            Platform::Other => "other",
        }
    }

    /// Whether the direct extraction path applies
    pub fn is_primary(&self) -> bool {
        matches!(self, Platform::Youtube)
    }

    /// Title used when the download path exposes no metadata
    pub fn placeholder_title(&self) -> String {
        format!("Download from {}", self.as_str())
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
    Webm,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" | "mp4" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" | "opus" => Some(AudioFormat::Ogg),
            "webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    /// Guess the format from a filename, defaulting to WebM
    pub fn from_filename(filename: &str) -> Self {
        filename
            .rsplit_once('.')
            .and_then(|(_, ext)| Self::from_extension(ext))
            .unwrap_or(AudioFormat::Webm)
    }

    /// Get MIME type for the format
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Webm => "audio/webm",
        }
    }
}

/// Audio produced by a single download strategy
#[derive(Debug, Clone)]
pub struct ExtractedAudio {
    pub bytes: Vec<u8>,
    pub filename: String,

    /// Exact title, when the strategy reads metadata
    pub title: Option<String>,

    /// Exact duration in seconds, when the strategy reads metadata
    pub duration_seconds: Option<u64>,
}

/// Audio plus best-effort metadata for one request. Never cached.
#[derive(Debug, Clone)]
pub struct AcquisitionResult {
    pub audio: Vec<u8>,
    pub filename: String,
    pub title: String,
    pub duration_seconds: u64,
    pub platform: Platform,
}

impl AcquisitionResult {
    pub fn format(&self) -> AudioFormat {
        AudioFormat::from_filename(&self.filename)
    }
}

/// A strategy that downloads the audio track of a URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Download audio for the given URL
    async fn download(&self, url: &str) -> Result<ExtractedAudio>;

    /// Get the name of this strategy
    fn strategy_name(&self) -> &'static str;
}

/// Anything that can turn a URL into audio ready for transcription
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaAcquirer: Send + Sync {
    async fn acquire(&self, url: &str) -> std::result::Result<AcquisitionResult, TranscrifyError>;
}

/// Primary-then-fallback acquisition
pub struct AcquisitionOrchestrator {
    primary: Arc<dyn MediaExtractor>,
    fallback: Arc<dyn MediaExtractor>,
}

impl AcquisitionOrchestrator {
    pub fn new(primary: Arc<dyn MediaExtractor>, fallback: Arc<dyn MediaExtractor>) -> Self {
        Self { primary, fallback }
    }

    /// Build the yt-dlp + Cobalt pair from configuration
    pub fn from_config(config: &AcquisitionConfig) -> Result<Self> {
        let primary = youtube::YoutubeDownloader::new(
            config.yt_dlp_path.clone(),
            Duration::from_secs(config.primary_timeout_secs),
            config.max_media_bytes,
        );
        let fallback = cobalt::CobaltDownloader::new(
            config.cobalt_instances.clone(),
            Duration::from_secs(config.attempt_timeout_secs),
            Duration::from_secs(config.media_timeout_secs),
            config.max_media_bytes,
        )?;

        Ok(Self::new(Arc::new(primary), Arc::new(fallback)))
    }
}

#[async_trait]
impl MediaAcquirer for AcquisitionOrchestrator {
    async fn acquire(&self, url: &str) -> std::result::Result<AcquisitionResult, TranscrifyError> {
        let platform = Platform::detect(url);
        tracing::info!(%platform, url, "Acquiring audio");

        if platform.is_primary() {
            match self.primary.download(url).await {
                Ok(media) if !media.bytes.is_empty() => {
                    tracing::info!(
                        strategy = self.primary.strategy_name(),
                        bytes = media.bytes.len(),
                        "Primary extraction succeeded"
                    );
                    return Ok(AcquisitionResult {
                        title: media.title.unwrap_or_else(|| platform.placeholder_title()),
                        duration_seconds: media.duration_seconds.unwrap_or(0),
                        audio: media.bytes,
                        filename: media.filename,
                        platform,
                    });
                }
                Ok(_) => {
                    tracing::warn!(
                        strategy = self.primary.strategy_name(),
                        "Primary extraction returned an empty stream, falling back"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        strategy = self.primary.strategy_name(),
                        error = %e,
                        "Primary extraction failed, falling back"
                    );
                }
            }
        }

        tracing::info!(strategy = self.fallback.strategy_name(), %platform, "Attempting fallback download");
        let media = self
            .fallback
            .download(url)
            .await
            .map_err(|e| TranscrifyError::Acquisition(e.to_string()))?;

        // The fallback path exposes no metadata before the download completes.
        Ok(AcquisitionResult {
            title: platform.placeholder_title(),
            duration_seconds: 0,
            audio: media.bytes,
            filename: media.filename,
            platform,
        })
    }
}
