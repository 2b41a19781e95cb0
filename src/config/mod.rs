use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::extractors::cobalt::DEFAULT_INSTANCES;
use crate::transcribe::paragraphs::{DEFAULT_PARAGRAPH_GAP_SECONDS, DEFAULT_SENTENCES_PER_PARAGRAPH};
use crate::utils::mask_secret;
use crate::TranscrifyError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// API-key authentication
    pub auth: AuthConfig,

    /// Fixed-window rate limiting
    pub rate_limit: RateLimitConfig,

    /// Media acquisition strategies
    pub acquisition: AcquisitionConfig,

    /// Speech-to-text service
    pub transcription: TranscriptionConfig,

    /// Paragraph grouping heuristics
    pub segmentation: SegmentationConfig,

    /// Batch endpoint limits
    pub batch: BatchConfig,

    /// Outbound webhook delivery
    pub webhook: WebhookConfig,

    /// Log output
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Accepted `x-api-key` values. Empty means open mode.
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests per identifier per window
    pub max_requests: u32,

    /// Window length in seconds
    pub window_seconds: u64,

    /// Chance that a gated request also sweeps expired entries
    pub cleanup_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// yt-dlp executable used for direct YouTube extraction
    pub yt_dlp_path: String,

    /// Upper bound for the whole primary extraction
    pub primary_timeout_secs: u64,

    /// Equivalent Cobalt instances, tried in rotation
    pub cobalt_instances: Vec<String>,

    /// Bound on a single Cobalt job submission
    pub attempt_timeout_secs: u64,

    /// Bound on fetching the media a Cobalt instance points to
    pub media_timeout_secs: u64,

    /// Largest media body accepted from a fallback instance
    pub max_media_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// OpenAI-compatible API base URL
    pub base_url: String,

    /// Bearer token for the transcription API
    pub api_key: String,

    /// Model name sent with each request
    pub model: String,

    /// Upper bound on one transcription call, upload included
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub paragraph_gap_seconds: f64,
    pub sentences_per_paragraph: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            acquisition: AcquisitionConfig::default(),
            transcription: TranscriptionConfig::default(),
            segmentation: SegmentationConfig::default(),
            batch: BatchConfig::default(),
            webhook: WebhookConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_seconds: 60,
            cleanup_probability: 0.1,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            primary_timeout_secs: 300,
            cobalt_instances: DEFAULT_INSTANCES.iter().map(|s| s.to_string()).collect(),
            attempt_timeout_secs: 15,
            media_timeout_secs: 120,
            max_media_bytes: 200 * 1024 * 1024,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "whisper-1".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            paragraph_gap_seconds: DEFAULT_PARAGRAPH_GAP_SECONDS,
            sentences_per_paragraph: DEFAULT_SENTENCES_PER_PARAGRAPH,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_batch_size: 10 }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl Config {
    /// Load configuration from file (if any), then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config file")
    }

    /// Locate the configuration file, if one exists
    pub fn config_path() -> Option<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir()
            .map(|dir| dir.join("transcrify").join("config.yaml"))
            .filter(|path| path.exists())
    }

    /// Apply environment-style overrides on top of file values
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(keys) = lookup("API_KEYS") {
            self.auth.api_keys = split_list(&keys);
        }
        if let Some(max) = lookup("RATE_LIMIT_MAX").and_then(|v| v.trim().parse().ok()) {
            self.rate_limit.max_requests = max;
        }
        if let Some(size) = lookup("MAX_BATCH_SIZE").and_then(|v| v.trim().parse().ok()) {
            self.batch.max_batch_size = size;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.transcription.api_key = key;
        }
        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            self.transcription.base_url = base_url;
        }
        if let Some(instances) = lookup("COBALT_INSTANCES") {
            self.acquisition.cobalt_instances = split_list(&instances);
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.trim().parse().ok()) {
            self.server.port = port;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), TranscrifyError> {
        let invalid = |message: &str| -> std::result::Result<(), TranscrifyError> {
            Err(TranscrifyError::Config(message.to_string()))
        };

        if self.rate_limit.max_requests == 0 {
            return invalid("rate_limit.max_requests must be at least 1");
        }
        if self.rate_limit.window_seconds == 0 {
            return invalid("rate_limit.window_seconds must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.rate_limit.cleanup_probability) {
            return invalid("rate_limit.cleanup_probability must be between 0 and 1");
        }
        if self.batch.max_batch_size == 0 {
            return invalid("batch.max_batch_size must be at least 1");
        }
        if self.acquisition.cobalt_instances.is_empty() {
            return invalid("At least one Cobalt instance must be configured");
        }
        if self.transcription.timeout_secs == 0 {
            return invalid("transcription.timeout_secs must be at least 1");
        }
        if self.segmentation.sentences_per_paragraph == 0 {
            return invalid("segmentation.sentences_per_paragraph must be at least 1");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        if self.auth.api_keys.is_empty() {
            println!("  API Keys: none (open mode)");
        } else {
            let masked: Vec<String> = self.auth.api_keys.iter().map(|k| mask_secret(k)).collect();
            println!("  API Keys: {}", masked.join(", "));
        }
        println!(
            "  Rate Limit: {} requests / {}s",
            self.rate_limit.max_requests, self.rate_limit.window_seconds
        );
        println!("  yt-dlp: {}", self.acquisition.yt_dlp_path);
        println!("  Cobalt Instances:");
        for instance in &self.acquisition.cobalt_instances {
            println!("    • {}", instance);
        }
        println!(
            "  Transcription: {} ({}), key {}",
            self.transcription.base_url,
            self.transcription.model,
            mask_secret(&self.transcription.api_key)
        );
        println!("  Max Batch Size: {}", self.batch.max_batch_size);
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
