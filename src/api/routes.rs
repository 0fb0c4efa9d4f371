//! API route definitions.

use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, HttpMakeClassifier, TraceLayer,
};
use tracing::Level;

use super::handlers;
use super::state::{ChatState, RobotState};

/// Router of the chat relay server.
pub fn chat_router(state: ChatState) -> Router {
    let cors = build_cors_layer(&state.allowed_origins, &[Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/api/ai", get(handlers::chat))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(cors)
        .layer(trace_layer())
}

/// Router of the robot control server.
pub fn robot_router(state: RobotState) -> Router {
    let cors = build_cors_layer(
        &state.registry.config().allowed_origins,
        &[Method::GET, Method::POST, Method::OPTIONS],
    );

    Router::new()
        .route("/", get(handlers::viewer))
        .route("/start", post(handlers::start_run))
        .route("/stop", post(handlers::stop_run))
        .route("/status", get(handlers::run_status))
        .route("/events", get(handlers::events))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(cors)
        .layer(trace_layer())
}

fn trace_layer() -> TraceLayer<HttpMakeClassifier> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}

/// Build the CORS layer. With no configured origins any origin is allowed.
fn build_cors_layer(allowed_origins: &[String], methods: &[Method]) -> CorsLayer {
    let headers = [header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN];

    if allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods.to_vec())
            .allow_headers(headers);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("CORS: Invalid origin in config: {}", origin);
                None
            })
        })
        .collect();

    if origins.is_empty() {
        tracing::error!("CORS: All configured origins are invalid!");
        return CorsLayer::new().allow_origin(AllowOrigin::exact(HeaderValue::from_static("null")));
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods.to_vec())
        .allow_headers(headers)
}
