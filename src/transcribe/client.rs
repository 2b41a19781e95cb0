use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::config::TranscriptionConfig;
use crate::TranscrifyError;

/// Individual transcript segment with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    /// Segment text
    #[serde(default)]
    pub text: String,
}

/// Raw output of the speech-to-text service
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTranscript {
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

/// External speech-to-text collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        filename: &str,
        mime_type: &str,
    ) -> Result<RawTranscript, TranscrifyError>;
}

/// OpenAI-compatible `/audio/transcriptions` client
pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl WhisperClient {
    pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build transcription HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model,
            timeout,
        })
    }

    pub fn from_config(config: &TranscriptionConfig) -> crate::Result<Self> {
        if config.api_key.is_empty() {
            tracing::warn!("No transcription API key configured; requests will likely be rejected");
        }
        Self::new(
            config.api_key.clone(),
            config.base_url.trim_end_matches('/').to_string(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn request_error(&self, e: reqwest::Error) -> TranscrifyError {
        if e.is_timeout() {
            TranscrifyError::Transcription(format!(
                "request timed out after {}s",
                self.timeout.as_secs_f64()
            ))
        } else {
            TranscrifyError::Transcription(format!("request: {}", e))
        }
    }
}

#[async_trait]
impl TranscriptionClient for WhisperClient {
    async fn transcribe(
        &self,
        audio: &[u8],
        filename: &str,
        mime_type: &str,
    ) -> Result<RawTranscript, TranscrifyError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let file_part = multipart::Part::bytes(audio.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| TranscrifyError::Transcription(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part);

        tracing::debug!(model = %self.model, bytes = audio.len(), filename, "Sending audio to transcription API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscrifyError::Transcription(format!(
                "status {}: {}",
                status, body
            )));
        }

        let transcript: RawTranscript = response
            .json()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.request_error(e)
                } else {
                    TranscrifyError::Transcription(format!("body: {}", e))
                }
            })?;

        tracing::info!(
            chars = transcript.text.len(),
            segments = transcript.segments.len(),
            "Transcription completed"
        );

        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::Router;

    async fn spawn_slow_provider(delay: Duration) -> String {
        let router = Router::new().route(
            "/audio/transcriptions",
            post(move || async move {
                tokio::time::sleep(delay).await;
                r#"{"text": "late"}"#
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_hanging_provider_is_bounded_by_timeout() {
        let base_url = spawn_slow_provider(Duration::from_secs(5)).await;
        let client = WhisperClient::new(
            "key".to_string(),
            base_url,
            "whisper-1".to_string(),
            Duration::from_millis(200),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let err = client
            .transcribe(b"audio", "clip.mp3", "audio/mpeg")
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(err.to_string(), "request timed out after 0.2s");
    }

    #[test]
    fn test_from_config_uses_configured_timeout() {
        let config = TranscriptionConfig {
            timeout_secs: 42,
            ..TranscriptionConfig::default()
        };
        let client = WhisperClient::from_config(&config).unwrap();
        assert_eq!(client.timeout, Duration::from_secs(42));
        assert_eq!(client.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_verbose_json_decoding_ignores_extra_fields() {
        let raw: RawTranscript = serde_json::from_str(
            r#"{
                "task": "transcribe",
                "language": "english",
                "text": " Hello world. ",
                "segments": [
                    {"id": 0, "seek": 0, "start": 0.0, "end": 2.456, "text": " Hello", "tokens": [1, 2]},
                    {"id": 1, "start": 2.456, "end": 4.0, "text": " world."}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(raw.text, " Hello world. ");
        assert_eq!(raw.segments.len(), 2);
        assert_eq!(raw.segments[0].end, 2.456);
    }

    #[test]
    fn test_missing_segments_decode_as_empty() {
        let raw: RawTranscript = serde_json::from_str(r#"{"text": "Only text."}"#).unwrap();
        assert!(raw.segments.is_empty());
    }
}
