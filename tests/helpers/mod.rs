#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Serve a router on an ephemeral local port, returning its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");

    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    format!("http://{}", addr)
}

/// A delivery as seen by a webhook receiver
#[derive(Debug)]
pub struct Delivery {
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone)]
struct ReceiverState {
    status: StatusCode,
    deliveries: mpsc::UnboundedSender<Delivery>,
}

async fn receive(State(state): State<ReceiverState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    state.deliveries.send(Delivery { headers, body }).ok();
    state.status
}

/// Webhook receiver answering `status` to every POST on `/hook`
pub async fn spawn_webhook_receiver(status: StatusCode) -> (String, mpsc::UnboundedReceiver<Delivery>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let router = Router::new()
        .route("/hook", post(receive))
        .with_state(ReceiverState { status, deliveries: tx });

    let base = spawn_server(router).await;
    (format!("{}/hook", base), rx)
}

/// Shell stand-in for yt-dlp: fixed metadata, and an `.m4a` of `audio_bytes` zero bytes
#[cfg(unix)]
pub fn fake_yt_dlp(dir: &std::path::Path, audio_bytes: usize) -> String {
    use std::os::unix::fs::PermissionsExt;

    let script = r#"#!/bin/sh
case "$1" in
  --version) echo 2024.01.01 ;;
  --dump-json) echo '{"title": "Fake talk", "duration": 12}' ;;
  --output)
    out=$(printf '%s' "$2" | sed 's/%(ext)s$/m4a/')
    head -c AUDIO_BYTES /dev/zero > "$out" ;;
  *) exit 1 ;;
esac
"#
    .replace("AUDIO_BYTES", &audio_bytes.to_string());

    let path = dir.join("yt-dlp");
    std::fs::write(&path, script).expect("Failed to write fake yt-dlp");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to mark fake yt-dlp executable");
    path.to_string_lossy().into_owned()
}
