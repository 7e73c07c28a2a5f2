use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use sofc_monitor::config::ServerConfig;
use sofc_monitor::router;
use sofc_monitor::state::ServerState;
use sofc_monitor::streaming::{
    DeviceStream, DeviceTransport, Reading, SerialConfig, TransportError,
};

/// Lists one port but never opens it
struct AbsentDevice;

#[async_trait]
impl DeviceTransport for AbsentDevice {
    async fn open(&self, config: &SerialConfig) -> Result<DeviceStream, TransportError> {
        Err(TransportError::Open {
            port: config.port.clone(),
            reason: "No such file or directory".to_string(),
        })
    }

    fn list_endpoints(&self) -> Result<Vec<String>, TransportError> {
        Ok(vec!["/dev/ttyUSB0".to_string(), "/dev/ttyACM0".to_string()])
    }
}

fn create_test_app() -> (Router, Arc<ServerState>) {
    create_app_with(ServerConfig {
        reading_history_capacity: 5,
        ..Default::default()
    })
}

fn create_app_with(config: ServerConfig) -> (Router, Arc<ServerState>) {
    let state = Arc::new(ServerState::new(config, Arc::new(AbsentDevice)));
    (router(state.clone()), state)
}

async fn send_request(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Failed to send request");

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or(json!({}));

    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send_request(app, request).await
}

async fn post(app: &Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    post_as(app, uri, "application/json", body).await
}

async fn post_as(
    app: &Router,
    uri: &str,
    content_type: &str,
    body: impl Into<Body>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type)
        .body(body.into())
        .unwrap();
    send_request(app, request).await
}

/// Names of the SSE events fully received so far
fn event_names(text: &str) -> Vec<String> {
    let complete = &text[..text.rfind('\n').map_or(0, |i| i + 1)];
    complete
        .lines()
        .filter_map(|line| line.strip_prefix("event:"))
        .map(|name| name.trim().to_string())
        .collect()
}

fn reading(water_temp: f64) -> Reading {
    Reading {
        timestamp: Utc::now(),
        water_temp,
        air_temp: 25.0,
        air_pressure: 2.5,
        water_pressure: 3.0,
    }
}

#[tokio::test]
async fn test_health() {
    let (app, _state) = create_test_app();
    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["connectedClients"], 0);
    assert_eq!(body["serialConnected"], false);
}

#[tokio::test]
async fn test_latest_reading_empty() {
    let (app, _state) = create_test_app();
    let (status, body) = get(&app, "/readings/latest").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_reading_history_limit_and_capacity() {
    let (app, state) = create_test_app();
    for i in 0..7 {
        state.broadcaster.publish_reading(reading(i as f64));
    }

    let (_, body) = get(&app, "/readings/history").await;
    let temps: Vec<f64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["water_temp"].as_f64().unwrap())
        .collect();
    assert_eq!(temps, vec![2.0, 3.0, 4.0, 5.0, 6.0]);

    let (_, body) = get(&app, "/readings/history?limit=2").await;
    let temps: Vec<f64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["water_temp"].as_f64().unwrap())
        .collect();
    assert_eq!(temps, vec![5.0, 6.0]);

    let (_, body) = get(&app, "/readings/latest").await;
    assert_eq!(body["data"]["water_temp"], 6.0);
}

#[tokio::test]
async fn test_status() {
    let (app, _state) = create_test_app();
    let (status, body) = get(&app, "/status").await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["serialConnected"], false);
    assert_eq!(data["serialConfig"]["port"], "/dev/ttyUSB0");
    assert_eq!(data["serialConfig"]["baudRate"], 9600);
    assert_eq!(data["availablePorts"], json!(["/dev/ttyUSB0", "/dev/ttyACM0"]));
    assert_eq!(data["demoMode"], false);
    assert_eq!(data["deviceMode"], "connecting");
    assert_eq!(data["simulinkMode"], "no-data");
    assert_eq!(data["readingCount"], 0);
    assert_eq!(data["simulinkSampleCount"], 0);
}

#[tokio::test]
async fn test_ports() {
    let (app, _state) = create_test_app();
    let (status, body) = get(&app, "/ports").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["/dev/ttyUSB0", "/dev/ttyACM0"]));
}

#[tokio::test]
async fn test_serial_settings_validation() {
    let (app, state) = create_test_app();

    let (status, body) = post(
        &app,
        "/settings/serial",
        json!({"port": "  ", "baudRate": 9600}).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("port"));

    let (status, body) = post(
        &app,
        "/settings/serial",
        json!({"port": "/dev/ttyACM0", "baudRate": 0}).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    assert_eq!(state.device.config().port, "/dev/ttyUSB0");
}

#[tokio::test]
async fn test_serial_settings_update() {
    let (app, state) = create_test_app();

    let (status, body) = post(
        &app,
        "/settings/serial",
        json!({"port": "/dev/ttyACM0", "baudRate": 115200}).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["connected"], false);
    assert_eq!(body["data"]["config"]["port"], "/dev/ttyACM0");
    assert_eq!(body["data"]["config"]["baudRate"], 115200);

    assert_eq!(state.device.config().port, "/dev/ttyACM0");
    assert!(state.device.has_pending_reconnect());
}

#[tokio::test]
async fn test_sample_ingestion() {
    let (app, _state) = create_test_app();

    let (status, body) = post(
        &app,
        "/data",
        json!({"time": 0.5, "data": {"stackVoltage": 0.8, "current": 12}}).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, _) = post(
        &app,
        "/sim-data",
        json!({"time": 1.0, "data": {"stackVoltage": 0.79, "fuelUtilisation": null}}).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&app, "/sim/fields").await;
    assert_eq!(
        body["data"],
        json!(["current", "fuelUtilisation", "stackVoltage"])
    );

    let (_, body) = get(&app, "/sim/latest").await;
    assert_eq!(body["data"]["time"], 1.0);
    assert!(body["data"]["data"]["fuelUtilisation"].is_null());

    let (_, body) = get(&app, "/sim/history?limit=1").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = get(&app, "/sim/history").await;
    assert_eq!(body["data"][0]["time"], 0.5);
    assert_eq!(body["data"][1]["time"], 1.0);
}

#[tokio::test]
async fn test_sample_rejection() {
    let (app, state) = create_test_app();

    let (status, body) = post(&app, "/data", json!({"data": {"a": 1}}).to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["message"].is_string());

    let (status, body) = post(&app, "/data", json!({"time": 1, "data": "x"}).to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = post(&app, "/sim-data", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    assert_eq!(state.ingestor.count(), 0);
    let (_, body) = get(&app, "/sim/latest").await;
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_serial_settings_malformed_bodies() {
    let (app, state) = create_test_app();

    let (status, body) = post(&app, "/settings/serial", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let (status, body) = post(
        &app,
        "/settings/serial",
        json!({"port": "/dev/ttyACM0"}).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("baudRate"));

    let (status, body) = post_as(
        &app,
        "/settings/serial",
        "text/plain",
        json!({"port": "/dev/ttyACM0", "baudRate": 9600}).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    assert_eq!(state.device.config().port, "/dev/ttyUSB0");
    assert!(!state.device.has_pending_reconnect());
}

#[tokio::test]
async fn test_events_stream_sequence_and_cleanup() {
    let (app, state) = create_test_app();
    state.broadcaster.publish_reading(reading(1.0));
    state
        .ingestor
        .ingest(&json!({"time": 0.0, "data": {"stackVoltage": 0.8}}))
        .unwrap();
    state
        .ingestor
        .ingest(&json!({"time": 1.0, "data": {"stackVoltage": 0.79}}))
        .unwrap();

    let request = Request::builder().uri("/events").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    assert_eq!(state.broadcaster.client_count(), 1);

    state.broadcaster.publish_reading(reading(2.0));

    let mut body = response.into_body();
    let mut text = String::new();
    let mut events = Vec::new();
    while events.len() < 5 {
        let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
            .await
            .expect("timed out waiting for an event")
            .expect("event stream ended")
            .unwrap();
        if let Ok(data) = frame.into_data() {
            text.push_str(std::str::from_utf8(&data).unwrap());
        }
        events = event_names(&text);
    }

    assert_eq!(
        events[..5],
        ["history", "simulink-sample", "simulink-sample", "status", "reading"]
    );
    assert!(text.contains("Connected to SOFC monitor live feed"));

    // Dropping the response ends the stream and its registration
    drop(body);
    assert_eq!(state.broadcaster.client_count(), 0);
}

#[tokio::test]
async fn test_cors_listed_origins() {
    let (app, _state) = create_test_app();

    let request = Request::builder()
        .uri("/health")
        .header("origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );

    let request = Request::builder()
        .uri("/health")
        .header("origin", "http://elsewhere.example")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}

#[tokio::test]
async fn test_cors_wildcard_origin() {
    let (app, _state) = create_app_with(ServerConfig {
        cors_origins: vec!["*".to_string()],
        ..Default::default()
    });

    let request = Request::builder()
        .uri("/health")
        .header("origin", "http://elsewhere.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}
