use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::{Result, TranscrifyError};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const TRANSCRIPTION_COMPLETED: &str = "transcription.completed";
pub const BATCH_TRANSCRIPTION_COMPLETED: &str = "batch_transcription.completed";

/// Completion notification sent to a caller-supplied URL
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent<T> {
    pub event: String,

    /// ISO-8601, UTC, millisecond precision
    pub timestamp: String,

    pub data: T,
}

impl<T: Serialize> WebhookEvent<T> {
    pub fn new(event: &str, data: T) -> Self {
        Self {
            event: event.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            data,
        }
    }
}

/// Compute the `sha256=<hex>` signature of a body
pub fn sign_payload(secret: &str, body: &[u8]) -> std::result::Result<String, TranscrifyError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| TranscrifyError::WebhookDelivery(format!("invalid signing key: {}", e)))?;
    mac.update(body);

    Ok(format!("sha256={:x}", mac.finalize().into_bytes()))
}

/// Single-attempt webhook delivery
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build webhook HTTP client")?;

        Ok(Self { client })
    }

    /// Deliver an event once. Signs the exact body when a secret is given.
    pub async fn notify<T: Serialize>(
        &self,
        url: &str,
        event: &WebhookEvent<T>,
        secret: Option<&str>,
    ) -> std::result::Result<(), TranscrifyError> {
        let body = serde_json::to_vec(event)
            .map_err(|e| TranscrifyError::WebhookDelivery(format!("serialize: {}", e)))?;

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(secret) = secret.filter(|s| !s.is_empty()) {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| TranscrifyError::WebhookDelivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TranscrifyError::WebhookDelivery(format!(
                "Webhook returned {}",
                response.status().as_u16()
            )));
        }

        Ok(())
    }

    /// Fire-and-forget delivery. The outcome is logged and returned through
    /// the handle, never through the primary response.
    pub fn dispatch<T>(
        &self,
        url: String,
        event: WebhookEvent<T>,
        secret: Option<String>,
    ) -> JoinHandle<std::result::Result<(), TranscrifyError>>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let notifier = self.clone();

        tokio::spawn(async move {
            let outcome = notifier.notify(&url, &event, secret.as_deref()).await;
            match &outcome {
                Ok(()) => tracing::info!(webhook_url = %url, event = %event.event, "Webhook delivered"),
                Err(e) => tracing::warn!(webhook_url = %url, event = %event.event, error = %e, "Webhook failed"),
            }
            outcome
        })
    }
}
