//! CloudEvent endpoint
//!
//! Receives Firestore change notifications over HTTP, either as a
//! structured JSON CloudEvent or in binary mode with `ce-*` headers, and
//! runs the event handler on each. Every request is acknowledged with
//! `204 No Content`, invalid ones included, so the platform never
//! redelivers an event.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tracing::{debug, error, info};

use docflow_core::models::RawNotification;
use docflow_core::{ChangeNotification, EventError, EventHandler};

pub type AppState = Arc<EventHandler>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Build the router
pub fn router(handler: AppState) -> Router {
    Router::new()
        .route("/", post(receive_event))
        .route("/healthz", get(health_check))
        .with_state(handler)
}

/// Serve until Ctrl-C / SIGTERM
pub async fn serve(addr: &str, handler: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening for events on {}", addr);

    axum::serve(listener, router(handler))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn receive_event(
    State(handler): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let notification = match notification_from_request(&headers, &body) {
        Ok(n) => n,
        Err(e) => {
            let outcome = handler.reject(e);
            debug!("Event handled: {:?}", outcome);
            return StatusCode::NO_CONTENT;
        }
    };

    // A panic inside the handler ends the task, not the server
    let task = tokio::spawn(async move { handler.handle(&notification).await });
    match task.await {
        Ok(outcome) => debug!("Event handled: {:?}", outcome),
        Err(e) => error!("Error processing message: {}", e),
    }

    StatusCode::NO_CONTENT
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Decode a notification from a binary-mode or structured CloudEvent
pub fn notification_from_request(
    headers: &HeaderMap,
    body: &[u8],
) -> Result<ChangeNotification, EventError> {
    if headers.contains_key("ce-id") || headers.contains_key("ce-document") {
        return ChangeNotification::from_raw(RawNotification {
            id: header(headers, "ce-id"),
            kind: header(headers, "ce-type"),
            database: header(headers, "ce-database"),
            document: header(headers, "ce-document"),
        });
    }

    ChangeNotification::from_json(body)
}
