use anyhow::Context;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{ExtractedAudio, MediaExtractor};
use crate::Result;

/// Public Cobalt instances, in preference order
pub const DEFAULT_INSTANCES: &[&str] = &[
    "https://api.cobalt.tools",
    "https://cobalt.api.red",
    "https://api.wuk.sh",
];

const DEFAULT_FILENAME: &str = "audio.mp3";
const DEFAULT_ERROR: &str = "Cobalt API failed to process URL";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Job description posted to `/api/json`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CobaltRequest<'a> {
    pub url: &'a str,
    pub filename_pattern: &'static str,
    pub a_format: &'static str,
    pub is_audio_only: bool,
}

impl<'a> CobaltRequest<'a> {
    pub fn audio_only(url: &'a str) -> Self {
        Self {
            url,
            filename_pattern: "classic",
            a_format: "mp3",
            is_audio_only: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CobaltStatus {
    Stream,
    Redirect,
    Picker,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct CobaltResponse {
    pub status: CobaltStatus,
    pub url: Option<String>,
    pub text: Option<String>,
}

impl CobaltResponse {
    /// The media URL, or the failure message reported by the instance
    fn into_media_url(self) -> std::result::Result<String, String> {
        let message = self.text.unwrap_or_else(|| DEFAULT_ERROR.to_string());
        match (self.status, self.url) {
            (CobaltStatus::Error, _) | (_, None) => Err(message),
            (_, Some(url)) => Ok(url),
        }
    }
}

/// Rotating client over equivalent Cobalt instances
pub struct CobaltDownloader {
    client: Client,
    instances: Vec<String>,
    rotation: AtomicUsize,
    attempt_timeout: Duration,
    media_timeout: Duration,
    max_media_bytes: u64,
}

impl CobaltDownloader {
    pub fn new(
        instances: Vec<String>,
        attempt_timeout: Duration,
        media_timeout: Duration,
        max_media_bytes: u64,
    ) -> Result<Self> {
        if instances.is_empty() {
            anyhow::bail!("At least one Cobalt instance must be configured");
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            instances,
            rotation: AtomicUsize::new(0),
            attempt_timeout,
            media_timeout,
            max_media_bytes,
        })
    }

    /// Try every instance once, starting at `call_number mod N`
    pub async fn download_with_rotation(&self, url: &str) -> Result<ExtractedAudio> {
        let count = self.instances.len();
        let start = self.rotation.fetch_add(1, Ordering::Relaxed) % count;
        let mut last_error = String::from(DEFAULT_ERROR);

        for attempt in 0..count {
            let instance = &self.instances[(start + attempt) % count];
            tracing::info!(instance = %instance, attempt = attempt + 1, of = count, "Trying Cobalt instance");

            match self.try_instance(instance, url).await {
                Ok(media) => {
                    tracing::info!(instance = %instance, bytes = media.bytes.len(), filename = %media.filename, "Cobalt download succeeded");
                    return Ok(media);
                }
                Err(e) => {
                    // `{:#}` keeps the whole context chain, not just the outer message
                    last_error = format!("{:#}", e);
                    tracing::warn!(instance = %instance, error = %last_error, "Cobalt download failed");
                }
            }
        }

        anyhow::bail!("All Cobalt instances failed. Last error: {}", last_error)
    }

    async fn try_instance(&self, instance: &str, url: &str) -> Result<ExtractedAudio> {
        let endpoint = format!("{}/api/json", instance.trim_end_matches('/'));

        let response = self
            .client
            .post(&endpoint)
            .timeout(self.attempt_timeout)
            .header(ACCEPT, "application/json")
            .json(&CobaltRequest::audio_only(url))
            .send()
            .await
            .with_context(|| format!("Request to {} failed", endpoint))?;

        let status = response.status();
        let body = response.text().await.context("Failed to read Cobalt response")?;
        let job: CobaltResponse = match serde_json::from_str(&body) {
            Ok(job) => job,
            Err(_) if !status.is_success() => anyhow::bail!("Cobalt instance returned HTTP {}", status),
            Err(e) => return Err(e).context("Malformed Cobalt response"),
        };

        let media_url = job.into_media_url().map_err(|message| anyhow::anyhow!(message))?;
        if !status.is_success() {
            anyhow::bail!("Cobalt instance returned HTTP {}", status);
        }

        tracing::debug!(media_url = %media_url, "Fetching media from Cobalt");
        let media = self
            .client
            .get(&media_url)
            .timeout(self.media_timeout)
            .send()
            .await
            .context("Failed to fetch media")?;

        if !media.status().is_success() {
            anyhow::bail!("Failed to download file from Cobalt: HTTP {}", media.status());
        }

        let filename = media
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

        let bytes = read_limited(media, self.max_media_bytes).await?;
        if bytes.is_empty() {
            anyhow::bail!("Cobalt returned an empty media stream");
        }

        Ok(ExtractedAudio {
            bytes,
            filename,
            title: None,
            duration_seconds: None,
        })
    }
}

#[async_trait]
impl MediaExtractor for CobaltDownloader {
    async fn download(&self, url: &str) -> Result<ExtractedAudio> {
        self.download_with_rotation(url).await
    }

    fn strategy_name(&self) -> &'static str {
        "cobalt"
    }
}

/// Read a response body, refusing anything larger than `limit` bytes
async fn read_limited(response: Response, limit: u64) -> Result<Vec<u8>> {
    if let Some(length) = response.content_length() {
        if length > limit {
            anyhow::bail!("Media is {} bytes, larger than the {} byte limit", length, limit);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Media stream interrupted")?;
        if bytes.len() as u64 + chunk.len() as u64 > limit {
            anyhow::bail!("Media exceeds the {} byte limit", limit);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

/// Extract a filename from a `Content-Disposition` header value.
///
/// Prefers the RFC 5987 `filename*` parameter over plain `filename`.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;

    for part in header.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');

        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = value.split_once("''").map(|(_, v)| v).unwrap_or(value);
                if let Ok(decoded) = urlencoding::decode(encoded) {
                    if !decoded.is_empty() {
                        return Some(decoded.into_owned());
                    }
                }
            }
            "filename" if !value.is_empty() => plain = Some(value.to_string()),
            _ => {}
        }
    }

    plain
}
