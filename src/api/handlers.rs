//! HTTP request handlers.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{info, instrument, warn};

use super::error::{ApiError, ApiResult};
use super::state::{ChatState, RobotState};
use crate::chat::{ChatOutcome, ChatRequest, HistoryView};
use crate::robot::{ProgressEvent, RunStatus, render_viewer};

/// Reconnect delay suggested to event stream clients.
const SSE_RETRY: Duration = Duration::from_millis(2000);
const SSE_KEEPALIVE: Duration = Duration::from_secs(15);

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Query parameters of the chat endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub q: Option<String>,
    pub id: Option<String>,
    #[serde(default)]
    pub view: HistoryView,
}

/// Relay one query to the completion API.
#[instrument(skip(state, query))]
pub async fn chat(
    State(state): State<ChatState>,
    query: Result<Query<ChatQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let request = ChatRequest {
        user_id: query.id,
        query: query.q,
        view: query.view,
    };

    match state.chat.handle(request).await? {
        ChatOutcome::Cleared { message } => {
            Ok(Json(json!({ "message": message })).into_response())
        }
        ChatOutcome::Reply(reply) => Ok(Json(reply).into_response()),
    }
}

/// Serve the robot viewer page.
pub async fn viewer(State(state): State<RobotState>) -> Html<String> {
    Html(render_viewer(&state.registry.config().direct_link))
}

/// Start a run in the background.
#[instrument(skip(state))]
pub async fn start_run(
    State(state): State<RobotState>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let run_id = state.registry.start().await?;
    info!(run_id = %run_id, "Run accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "started", "run_id": run_id })),
    ))
}

/// Request the active run to stop. Always accepted.
#[instrument(skip(state))]
pub async fn stop_run(State(state): State<RobotState>) -> Json<serde_json::Value> {
    let stopping = state.registry.stop().await;
    let status = if stopping { "stopping" } else { "idle" };
    Json(json!({ "status": status }))
}

/// Current run status.
pub async fn run_status(State(state): State<RobotState>) -> Json<RunStatus> {
    Json(state.registry.status().await)
}

/// Live progress stream. Events sent before the client connected are not
/// replayed.
pub async fn events(
    State(state): State<RobotState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.registry.events().subscribe();
    info!(
        subscribers = state.registry.events().subscriber_count(),
        "Viewer connected to event stream"
    );

    let hello = tokio_stream::iter([
        Ok::<_, Infallible>(Event::default().retry(SSE_RETRY).comment("connected")),
        Ok(event_frame(&ProgressEvent::info("connected"))),
    ]);
    let live = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(event) => Some(Ok::<_, Infallible>(event_frame(&event))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "Event stream viewer lagged behind");
            None
        }
    });

    let stream = futures::StreamExt::take_until(
        hello.chain(live),
        state.shutdown.clone().cancelled_owned(),
    );

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEPALIVE)
            .text("keepalive"),
    )
}

fn event_frame(event: &ProgressEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(data) => Event::default().data(data),
        Err(err) => {
            warn!("Failed to serialize progress event: {:?}", err);
            Event::default().data(r#"{"level":"error","msg":"event serialization failed"}"#)
        }
    }
}
