//! Webhook HTTP server

use super::{verify_signature, PullRequestPayload, DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER};
use crate::handler::{EventOutcome, PullRequestHandler};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
struct AppState {
    handler: Arc<PullRequestHandler>,
    secret: Option<Arc<str>>,
}

#[derive(Debug, Serialize)]
struct WebhookResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl WebhookResponse {
    fn new(status: &'static str) -> Self {
        Self {
            status,
            message: None,
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: "rejected",
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Build the webhook router
///
/// Signatures are verified only when `secret` is set.
pub fn router(handler: Arc<PullRequestHandler>, secret: Option<String>) -> Router {
    if secret.is_none() {
        warn!("No webhook secret configured, deliveries are not authenticated");
    }

    let state = AppState {
        handler,
        secret: secret.filter(|s| !s.is_empty()).map(Arc::from),
    };

    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Webhook server bound to one address
pub struct WebhookServer {
    addr: SocketAddr,
    router: Router,
}

impl WebhookServer {
    pub fn new(addr: SocketAddr, handler: Arc<PullRequestHandler>, secret: Option<String>) -> Self {
        Self {
            addr,
            router: router(handler, secret),
        }
    }

    /// Serve until Ctrl-C
    pub async fn serve(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("Webhook server listening on http://{}", self.addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Webhook server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    debug!("Shutdown signal received");
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    let delivery = header(&headers, DELIVERY_HEADER).unwrap_or("-").to_string();

    if let Some(secret) = &state.secret {
        if let Err(e) = verify_signature(secret, &body, header(&headers, SIGNATURE_HEADER)) {
            warn!("Rejected delivery {}: {}", delivery, e);
            return (StatusCode::UNAUTHORIZED, Json(WebhookResponse::rejected(e.to_string())));
        }
    }

    let Some(event) = header(&headers, EVENT_HEADER) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(WebhookResponse::rejected(format!("Missing {} header", EVENT_HEADER))),
        );
    };

    match event {
        "ping" => {
            info!("Received ping delivery {}", delivery);
            (StatusCode::OK, Json(WebhookResponse::new("pong")))
        }
        "pull_request" => {
            let payload = match PullRequestPayload::from_slice(&body) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Rejected delivery {}: {}", delivery, e);
                    return (StatusCode::BAD_REQUEST, Json(WebhookResponse::rejected(e.to_string())));
                }
            };

            let snapshot = payload.into_snapshot();
            debug!(
                "Delivery {}: {:?} on {}#{}",
                delivery, snapshot.action, snapshot.repository, snapshot.number
            );

            let handler = state.handler.clone();
            tokio::spawn(async move {
                match handler.handle(snapshot).await {
                    Ok(EventOutcome::Ignored(reason)) => {
                        debug!("Delivery {} ignored: {}", delivery, reason)
                    }
                    Ok(EventOutcome::Emitted { .. }) => debug!("Delivery {} processed", delivery),
                    Err(e) => error!("Delivery {} failed: {}", delivery, e),
                }
            });

            (StatusCode::ACCEPTED, Json(WebhookResponse::new("accepted")))
        }
        other => {
            debug!("Ignoring {} delivery {}", other, delivery);
            (StatusCode::ACCEPTED, Json(WebhookResponse::new("ignored")))
        }
    }
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
