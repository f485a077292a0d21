//! HTTP routes and handlers
//!
//! The bot framework posts its events to `/events/{name}`; they are decoded
//! and queued for the [`EventRouter`](crate::router::EventRouter).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use censorbot_core::InboundEvent;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::ingress;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub events: mpsc::Sender<InboundEvent>,
    pub metrics: Option<PrometheusHandle>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/events/:name", post(receive_event))
        .fallback(fallback)
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

async fn receive_event(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<Value>,
) -> Response {
    let event = match ingress::decode_event(&name, payload) {
        Ok(event) => event,
        Err(e) => {
            metrics::counter!("censorbot_errors_total", "kind" => "decode").increment(1);
            warn!(event = %name, error = %e, "Rejecting malformed event");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": e.to_string()})),
            )
                .into_response();
        }
    };

    debug!(event = %name, kind = event.kind(), "Event received");
    match state.events.try_send(event) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(mpsc::error::TrySendError::Full(_)) => {
            metrics::counter!("censorbot_errors_total", "kind" => "queue_full").increment(1);
            warn!(event = %name, "Event queue full, dropping event");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            warn!(event = %name, "Event router stopped, dropping event");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn fallback() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
