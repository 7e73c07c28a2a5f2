use axum::{http::StatusCode, Json};
use serde::Serialize;

/// `{success, data}` envelope used by the read endpoints
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn bad_request(error: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            success: false,
            error: error.into(),
        }),
    )
}

/// `{status, message}` body used by sample ingestion
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IngestResponse {
    pub fn accepted() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: Some(message.into()),
        }
    }
}
