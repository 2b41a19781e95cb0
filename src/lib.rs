//! Transcrify - turn video URLs into structured transcripts
//!
//! This library acquires the audio track of a video URL (a direct yt-dlp extraction for
//! YouTube, with a rotating pool of Cobalt instances as fallback), sends it to a Whisper
//! compatible transcription service and groups the timed segments into paragraphs. The
//! `server` module exposes the pipeline over HTTP behind an API-key and rate-limit gate,
//! with optional signed webhook notification of results.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod gate;
pub mod output;
pub mod server;
pub mod transcribe;
pub mod utils;
pub mod webhook;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{AcquisitionOrchestrator, AcquisitionResult, MediaAcquirer, Platform};
pub use gate::{Decision, RequestGate, RequestIdentity};
pub use transcribe::{BatchResponse, TranscriptionPipeline, TranscriptionResponse};
pub use webhook::{WebhookEvent, WebhookNotifier};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types surfaced to callers of the pipeline and the HTTP API
#[derive(thiserror::Error, Debug)]
pub enum TranscrifyError {
    #[error("{0}")]
    Acquisition(String),

    #[error("{0}")]
    Transcription(String),

    #[error("Webhook delivery failed: {0}")]
    WebhookDelivery(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
