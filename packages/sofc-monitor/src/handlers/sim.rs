use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::handlers::readings::HistoryQuery;
use crate::handlers::response::{ApiResponse, IngestResponse};
use crate::state::ServerState;
use crate::streaming::ExternalSample;

/// Accept one `{time, data}` sample pushed by the simulation
///
/// Mounted at both `/data` and `/sim-data`. The body is parsed here rather
/// than through the `Json` extractor so every rejection uses the
/// `{status, message}` shape.
pub async fn ingest_sample(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> (StatusCode, Json<IngestResponse>) {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Rejected sample body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(IngestResponse::rejected(format!("Invalid JSON body: {}", e))),
            );
        }
    };

    match state.ingestor.ingest(&raw) {
        Ok(sample) => {
            debug!("Accepted sample at t={} ({} fields)", sample.time, sample.fields.len());
            (StatusCode::OK, Json(IngestResponse::accepted()))
        }
        Err(e) => {
            warn!("Rejected sample: {}", e);
            (StatusCode::BAD_REQUEST, Json(IngestResponse::rejected(e.to_string())))
        }
    }
}

pub async fn sample_history(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<ApiResponse<Vec<ExternalSample>>> {
    ApiResponse::ok(state.ingestor.history_slice(query.limit))
}

pub async fn latest_sample(
    State(state): State<Arc<ServerState>>,
) -> Json<ApiResponse<Option<ExternalSample>>> {
    ApiResponse::ok(state.ingestor.latest())
}

/// Every signal name seen since startup
pub async fn sample_fields(State(state): State<Arc<ServerState>>) -> Json<ApiResponse<Vec<String>>> {
    ApiResponse::ok(state.ingestor.known_fields())
}
