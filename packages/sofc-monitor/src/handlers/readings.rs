use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::handlers::response::ApiResponse;
use crate::state::ServerState;
use crate::streaming::Reading;

/// Optional `?limit=N` for history endpoints; absent means everything
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Most recent device (or demo) reading
pub async fn latest_reading(
    State(state): State<Arc<ServerState>>,
) -> Json<ApiResponse<Option<Reading>>> {
    ApiResponse::ok(state.broadcaster.readings().latest())
}

/// Retained readings, oldest to newest
pub async fn reading_history(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<ApiResponse<Vec<Reading>>> {
    ApiResponse::ok(state.broadcaster.readings().slice(query.limit))
}
