use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::handlers::response::{bad_request, ApiError, ApiResponse};
use crate::state::ServerState;
use crate::streaming::{DeviceMode, SerialConfig, SimMode};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub serial_connected: bool,
    pub serial_config: SerialConfig,
    pub available_ports: Vec<String>,
    pub demo_mode: bool,
    pub device_mode: DeviceMode,
    pub simulink_mode: SimMode,
    pub connected_clients: usize,
    pub reading_count: usize,
    pub simulink_sample_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialSettingsRequest {
    pub port: String,
    pub baud_rate: u32,
}

#[derive(Debug, Serialize)]
pub struct SerialSettingsResponse {
    pub connected: bool,
    pub config: SerialConfig,
}

pub async fn device_status(State(state): State<Arc<ServerState>>) -> Json<ApiResponse<DeviceStatus>> {
    let modes = state.modes.current();
    ApiResponse::ok(DeviceStatus {
        serial_connected: state.device.is_connected(),
        serial_config: state.device.config(),
        available_ports: state.device.list_endpoints().await,
        demo_mode: modes.device == DeviceMode::Demo,
        device_mode: modes.device,
        simulink_mode: modes.simulink,
        connected_clients: state.broadcaster.client_count(),
        reading_count: state.broadcaster.readings().len(),
        simulink_sample_count: state.ingestor.count(),
    })
}

/// Reconnect the serial link with new parameters
pub async fn update_serial_settings(
    State(state): State<Arc<ServerState>>,
    request: Result<Json<SerialSettingsRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SerialSettingsResponse>>, ApiError> {
    // Keep the `{success, error}` shape for malformed bodies too
    let Json(request) = request.map_err(|rejection| bad_request(rejection.body_text()))?;

    let port = request.port.trim();
    if port.is_empty() {
        return Err(bad_request("port must not be empty"));
    }
    if request.baud_rate == 0 {
        return Err(bad_request("baudRate must be greater than 0"));
    }

    let config = SerialConfig {
        port: port.to_string(),
        baud_rate: request.baud_rate,
    };
    info!("Serial settings changed to {} at {} baud", config.port, config.baud_rate);

    let connected = state.device.update_config(config.clone()).await;
    Ok(ApiResponse::ok(SerialSettingsResponse { connected, config }))
}

pub async fn list_ports(State(state): State<Arc<ServerState>>) -> Json<ApiResponse<Vec<String>>> {
    ApiResponse::ok(state.device.list_endpoints().await)
}
