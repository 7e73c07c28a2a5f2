use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    device_status, health_check, ingest_sample, latest_reading, latest_sample, list_ports,
    reading_history, sample_fields, sample_history, update_serial_settings,
};
use crate::live::{handle_websocket, live_events};
use crate::state::ServerState;

/// Assemble the REST surface and the live channel endpoints
pub fn router(state: Arc<ServerState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/readings/latest", get(latest_reading))
        .route("/readings/history", get(reading_history))
        .route("/status", get(device_status))
        .route("/settings/serial", post(update_serial_settings))
        .route("/ports", get(list_ports))
        .route("/data", post(ingest_sample))
        .route("/sim-data", post(ingest_sample))
        .route("/sim/history", get(sample_history))
        .route("/sim/latest", get(latest_sample))
        .route("/sim/fields", get(sample_fields));

    let live_routes = Router::new()
        .route("/ws", get(handle_websocket))
        .route("/events", get(live_events));

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.config.cors_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .merge(api_routes)
        .merge(live_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `*` anywhere in the list allows every origin; otherwise only the listed ones
fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.iter().any(|origin| origin == "*") {
        return AllowOrigin::any();
    }
    let list: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    AllowOrigin::list(list)
}
