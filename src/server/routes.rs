//! Webhook route.
//!
//! Telegram POSTs each update as JSON and echoes the secret token registered
//! with `setWebhook` in a header. Accepted updates go straight into the
//! dispatcher's stream, so a 200 means the consumer will see the update.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bot::types::Update;

/// Header carrying the secret token on every pushed request.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
struct WebhookState {
    path: Arc<str>,
    updates: mpsc::Sender<Update>,
    secret: Arc<str>,
    stop: CancellationToken,
}

/// Build a router accepting updates on `path`.
///
/// The path is compared literally rather than registered as a route pattern,
/// so any path Telegram accepts works here too. Once `stop` fires, requests
/// still waiting for room in the stream are answered 503.
pub fn webhook_router(
    path: &str,
    updates: mpsc::Sender<Update>,
    secret: &str,
    stop: CancellationToken,
) -> Router {
    let path = if path.is_empty() { "/" } else { path };

    Router::new().fallback(receive_update).with_state(WebhookState {
        path: Arc::from(path),
        updates,
        secret: Arc::from(secret),
        stop,
    })
}

async fn receive_update(
    State(state): State<WebhookState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if uri.path() != &*state.path {
        return StatusCode::NOT_FOUND;
    }
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED;
    }

    let token = headers.get(SECRET_TOKEN_HEADER).map(|v| v.as_bytes());
    if token != Some(state.secret.as_bytes()) {
        warn!("Rejected webhook request with missing or wrong secret token");
        return StatusCode::UNAUTHORIZED;
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            debug!("Malformed webhook body: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    debug!(update_id = update.id, "Webhook update received");
    tokio::select! {
        sent = state.updates.send(update) => match sent {
            Ok(()) => StatusCode::OK,
            Err(_) => StatusCode::SERVICE_UNAVAILABLE,
        },
        // Not delivered; Telegram retries it later.
        _ = state.stop.cancelled() => StatusCode::SERVICE_UNAVAILABLE,
    }
}
