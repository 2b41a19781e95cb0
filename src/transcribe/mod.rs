use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::extractors::{AcquisitionOrchestrator, MediaAcquirer};
use crate::utils::validate_url;
use crate::{Result, TranscrifyError};

pub mod client;
pub mod paragraphs;

pub use client::{RawTranscript, TranscriptSegment, TranscriptionClient, WhisperClient};
pub use paragraphs::{ParagraphSegmenter, SegmentedTranscript};

/// Successful transcription of one URL
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResponse {
    pub success: bool,
    pub title: String,
    pub url: String,

    /// Seconds; 0 when the download path exposed no metadata
    pub duration: u64,

    #[serde(flatten)]
    pub transcript: SegmentedTranscript,
}

/// Terminal state of a URL that could not be transcribed
#[derive(Debug, Clone, Serialize)]
pub struct FailedItem {
    pub url: String,
    pub title: String,
    pub success: bool,
    pub error: String,
}

impl FailedItem {
    pub fn new(url: &str, error: &TranscrifyError) -> Self {
        Self {
            url: url.to_string(),
            title: "Error".to_string(),
            success: false,
            error: error.to_string(),
        }
    }
}

/// One entry of a batch response; exactly one terminal state per URL
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Completed(TranscriptionResponse),
    Failed(FailedItem),
}

impl BatchItem {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchItem::Completed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

impl BatchResponse {
    pub fn from_items(results: Vec<BatchItem>) -> Self {
        let completed = results.iter().filter(|item| item.is_success()).count();

        Self {
            success: true,
            total: results.len(),
            completed,
            failed: results.len() - completed,
            results,
        }
    }
}

/// Acquire, transcribe, segment
pub struct TranscriptionPipeline {
    acquirer: Arc<dyn MediaAcquirer>,
    transcriber: Arc<dyn TranscriptionClient>,
    segmenter: ParagraphSegmenter,
}

impl TranscriptionPipeline {
    pub fn new(
        acquirer: Arc<dyn MediaAcquirer>,
        transcriber: Arc<dyn TranscriptionClient>,
        segmenter: ParagraphSegmenter,
    ) -> Self {
        Self {
            acquirer,
            transcriber,
            segmenter,
        }
    }

    /// Wire the yt-dlp/Cobalt orchestrator and the Whisper client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let acquirer = AcquisitionOrchestrator::from_config(&config.acquisition)?;
        let transcriber = WhisperClient::from_config(&config.transcription)?;
        let segmenter = ParagraphSegmenter::new(
            config.segmentation.paragraph_gap_seconds,
            config.segmentation.sentences_per_paragraph,
        );

        Ok(Self::new(Arc::new(acquirer), Arc::new(transcriber), segmenter))
    }

    /// Transcribe a single URL
    pub async fn transcribe_url(&self, url: &str) -> std::result::Result<TranscriptionResponse, TranscrifyError> {
        let url = url.trim();
        validate_url(url).map_err(|e| TranscrifyError::InvalidRequest(e.to_string()))?;

        tracing::info!("Starting transcription for URL: {}", url);
        let audio = self.acquirer.acquire(url).await?;
        tracing::info!(
            bytes = audio.audio.len(),
            filename = %audio.filename,
            title = %audio.title,
            "Audio acquired"
        );

        let raw = self
            .transcriber
            .transcribe(&audio.audio, &audio.filename, audio.format().mime_type())
            .await?;

        let transcript = self.segmenter.segment(&raw);
        tracing::info!(
            paragraphs = transcript.paragraphs.len(),
            segments = transcript.segments.len(),
            "Transcription complete"
        );

        Ok(TranscriptionResponse {
            success: true,
            title: audio.title,
            url: url.to_string(),
            duration: audio.duration_seconds,
            transcript,
        })
    }

    /// Process URLs one after another; a failure never aborts the batch
    pub async fn transcribe_batch(&self, urls: &[String]) -> BatchResponse {
        let mut results = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            tracing::info!(item = index + 1, of = urls.len(), "Processing batch item");
            let item = match self.transcribe_url(url).await {
                Ok(response) => BatchItem::Completed(response),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Batch item failed");
                    BatchItem::Failed(FailedItem::new(url, &e))
                }
            };
            results.push(item);
        }

        BatchResponse::from_items(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{AcquisitionResult, MockMediaAcquirer, Platform};
    use client::MockTranscriptionClient;

    fn acquired(title: &str) -> AcquisitionResult {
        AcquisitionResult {
            audio: vec![1, 2, 3],
            filename: "talk.mp3".to_string(),
            title: title.to_string(),
            duration_seconds: 42,
            platform: Platform::Youtube,
        }
    }

    fn raw() -> RawTranscript {
        RawTranscript {
            text: "Hello world. New para".to_string(),
            segments: vec![
                TranscriptSegment { start: 0.0, end: 5.0, text: " Hello".to_string() },
                TranscriptSegment { start: 5.0, end: 10.0, text: "world.".to_string() },
                TranscriptSegment { start: 30.0, end: 35.0, text: "New para".to_string() },
            ],
        }
    }

    fn pipeline(acquirer: MockMediaAcquirer, transcriber: MockTranscriptionClient) -> TranscriptionPipeline {
        TranscriptionPipeline::new(Arc::new(acquirer), Arc::new(transcriber), ParagraphSegmenter::default())
    }

    #[tokio::test]
    async fn test_single_url_response() {
        let mut acquirer = MockMediaAcquirer::new();
        acquirer
            .expect_acquire()
            .withf(|url| url.to_string() == "https://youtu.be/abc")
            .times(1)
            .returning(|_| Ok(acquired("A Talk")));

        let mut transcriber = MockTranscriptionClient::new();
        transcriber
            .expect_transcribe()
            .withf(|audio, filename, mime| {
                audio.to_vec() == vec![1u8, 2, 3]
                    && filename.to_string() == "talk.mp3"
                    && mime.to_string() == "audio/mpeg"
            })
            .times(1)
            .returning(|_, _, _| Ok(raw()));

        let response = pipeline(acquirer, transcriber)
            .transcribe_url(" https://youtu.be/abc ")
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.title, "A Talk");
        assert_eq!(response.duration, 42);
        assert_eq!(response.transcript.paragraphs, vec!["Hello world.", "New para"]);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["full_text"], "Hello world. New para");
        assert_eq!(json["segments"][0]["text"], "Hello");
        assert_eq!(json["url"], "https://youtu.be/abc");
    }

    #[tokio::test]
    async fn test_invalid_url_never_reaches_acquirer() {
        let mut acquirer = MockMediaAcquirer::new();
        acquirer.expect_acquire().never();
        let transcriber = MockTranscriptionClient::new();

        let err = pipeline(acquirer, transcriber)
            .transcribe_url("not a url")
            .await
            .unwrap_err();
        assert!(matches!(err, TranscrifyError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_transcription_error_is_surfaced_verbatim() {
        let mut acquirer = MockMediaAcquirer::new();
        acquirer.expect_acquire().returning(|_| Ok(acquired("t")));
        let mut transcriber = MockTranscriptionClient::new();
        transcriber
            .expect_transcribe()
            .returning(|_, _, _| Err(TranscrifyError::Transcription("status 401: bad key".to_string())));

        let err = pipeline(acquirer, transcriber)
            .transcribe_url("https://youtu.be/abc")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "status 401: bad key");
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let mut acquirer = MockMediaAcquirer::new();
        acquirer.expect_acquire().returning(|url| {
            if url.contains("fail") {
                Err(TranscrifyError::Acquisition("All Cobalt instances failed. Last error: x".to_string()))
            } else {
                Ok(acquired("ok"))
            }
        });
        let mut transcriber = MockTranscriptionClient::new();
        transcriber.expect_transcribe().returning(|_, _, _| Ok(raw()));

        let urls: Vec<String> = [
            "https://youtu.be/1",
            "https://fail.example/2",
            "garbage",
            "https://www.tiktok.com/3",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let batch = pipeline(acquirer, transcriber).transcribe_batch(&urls).await;

        assert_eq!(batch.total, 4);
        assert_eq!(batch.completed, 2);
        assert_eq!(batch.failed, 2);
        assert_eq!(batch.completed + batch.failed, urls.len());

        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["results"][1]["success"], false);
        assert_eq!(json["results"][1]["title"], "Error");
        assert_eq!(json["results"][1]["url"], "https://fail.example/2");
        assert_eq!(json["results"][0]["success"], true);
        assert_eq!(json["results"][3]["url"], "https://www.tiktok.com/3");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let batch = pipeline(MockMediaAcquirer::new(), MockTranscriptionClient::new())
            .transcribe_batch(&[])
            .await;
        assert_eq!(batch.total, 0);
        assert_eq!(batch.completed + batch.failed, 0);
    }
}
