//! HTTP API: submit a mandate, poll its status, stream its status as SSE.

use crate::auth::ResolvedAuth;
use crate::config::GatewayConfig;
use axum::{
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, Sse},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use orchestrator_core::{QueueConfig, TaskEnvelope, TaskRecord, TaskState};
use orchestrator_worker::{Broker, TaskStore};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub struct GatewayState {
    pub broker: Arc<dyn Broker>,
    pub store: Arc<dyn TaskStore>,
    pub auth: ResolvedAuth,
    pub queues: QueueConfig,
    pub default_max_ticks: u32,
    pub poll_interval: Duration,
}

#[derive(Deserialize)]
struct SubmitRequest {
    mandate: String,
    #[serde(default)]
    max_ticks: Option<u32>,
}

#[derive(Serialize)]
struct SubmitResponse {
    correlation_id: String,
}

fn authenticate(headers: &HeaderMap, auth: &ResolvedAuth) -> Option<Option<String>> {
    if let Some(value) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        if auth.verify_api_key(value) {
            return Some(None);
        }
        return None;
    }
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return auth.verify_jwt(token).ok().map(|u| Some(u.user_id));
        }
    }
    None
}

async fn submit_task(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<SubmitRequest>,
) -> impl IntoResponse {
    let Some(user_id) = authenticate(&headers, &state.auth) else {
        return (StatusCode::UNAUTHORIZED, "invalid or missing credentials").into_response();
    };

    let correlation_id = uuid::Uuid::new_v4().to_string();
    let max_ticks = body.max_ticks.unwrap_or(state.default_max_ticks);
    let record = TaskRecord::pending(correlation_id.clone(), user_id, body.mandate.clone(), max_ticks);

    if let Err(e) = state.store.put(record).await {
        tracing::error!(error = %e, "failed to persist pending task record");
        return (StatusCode::INTERNAL_SERVER_ERROR, "storage error").into_response();
    }

    let mut envelope = TaskEnvelope::new(body.mandate, correlation_id.clone());
    envelope.max_ticks = max_ticks;
    let payload = match serde_json::to_vec(&envelope) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize task envelope");
            return (StatusCode::INTERNAL_SERVER_ERROR, "serialization error").into_response();
        }
    };

    if let Err(e) = state.broker.publish_task(&state.queues.input_queue, &payload).await {
        tracing::error!(error = %e, "failed to publish task envelope");
        return (StatusCode::INTERNAL_SERVER_ERROR, "queue error").into_response();
    }

    (StatusCode::ACCEPTED, Json(SubmitResponse { correlation_id })).into_response()
}

async fn get_task(State(state): State<Arc<GatewayState>>, AxumPath(id): AxumPath<String>) -> impl IntoResponse {
    match state.store.get(&id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "task not found").into_response(),
        Err(e) => {
            tracing::error!(error = %e, correlation_id = %id, "failed to load task record");
            (StatusCode::INTERNAL_SERVER_ERROR, "storage error").into_response()
        }
    }
}

async fn stream_task(
    State(state): State<Arc<GatewayState>>,
    AxumPath(id): AxumPath<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let poll_interval = state.poll_interval;
    let stream = async_stream::stream! {
        let mut last_status: Option<TaskState> = None;
        loop {
            match state.store.get(&id).await {
                Ok(Some(record)) => {
                    if last_status != Some(record.status) {
                        last_status = Some(record.status);
                        if let Ok(json) = serde_json::to_string(&record) {
                            yield Ok(Event::default().data(json));
                        }
                    }
                    if matches!(record.status, TaskState::Completed | TaskState::Failed) {
                        break;
                    }
                }
                Ok(None) => {
                    yield Ok(Event::default().event("error").data("task not found"));
                    break;
                }
                Err(e) => {
                    yield Ok(Event::default().event("error").data(e.to_string()));
                    break;
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    };
    Sse::new(stream)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") }))
}

async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn serve(config: GatewayConfig, state: Arc<GatewayState>) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/tasks", post(submit_task))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/stream", get(stream_task))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state);

    let bind_addr: SocketAddr = format!("{}:{}", config.bind.to_addr(), config.port).parse()?;
    info!("orchestrator gateway v{} listening on {}", env!("CARGO_PKG_VERSION"), bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
