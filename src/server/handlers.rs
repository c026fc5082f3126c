use crate::control::{ActionOutcome, StatusSnapshot};
use crate::error::{ConfigError, MirrorError};
use crate::service::ServiceAction;
use crate::settings::RelaySettings;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use super::routes::ServerState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
    /// Controls disabled because their action is in flight
    pub busy: Vec<ServiceAction>,
}

#[derive(Debug, Deserialize)]
pub struct SelectDeviceRequest {
    /// Device id, absent or empty for auto-detect
    pub device: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub since: Option<u64>,
}

/// Maps library errors to HTTP responses
pub struct ApiError(MirrorError);

impl From<MirrorError> for ApiError {
    fn from(error: MirrorError) -> Self {
        Self(error)
    }
}

impl From<ConfigError> for ApiError {
    fn from(error: ConfigError) -> Self {
        Self(error.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MirrorError::Config(ConfigError::InvalidValue { .. }) => StatusCode::BAD_REQUEST,
            MirrorError::Enumeration(_) | MirrorError::Service(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn status_response(state: &ServerState, snapshot: StatusSnapshot) -> Json<StatusResponse> {
    Json(StatusResponse {
        snapshot,
        busy: state.surface.busy_actions(),
    })
}

/// Strip an optional `:port` from a Host header value, keeping IPv6 brackets
pub fn host_without_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }

    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Handler for health check endpoint
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let status = state.surface.current_status();

    let health_info = json!({
        "status": "healthy",
        "service": status.label,
        "probe_failed": status.probe_failed,
        "devices": state.surface.device_options().devices.len(),
    });

    (StatusCode::OK, Json(health_info))
}

pub async fn status_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let snapshot = state.surface.current_status();
    status_response(&state, snapshot)
}

pub async fn refresh_status_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let snapshot = state.surface.refresh_status().await;
    status_response(&state, snapshot)
}

pub async fn devices_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.surface.device_options())
}

pub async fn refresh_devices_handler(State(state): State<ServerState>) -> Response {
    match state.surface.refresh_devices().await {
        Ok(options) => Json(options).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": e.to_string(),
                "options": state.surface.device_options(),
            })),
        )
            .into_response(),
    }
}

pub async fn select_device_handler(
    State(state): State<ServerState>,
    Json(request): Json<SelectDeviceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let device = request.device.filter(|d| !d.trim().is_empty());
    let options = state.surface.select_device(device.as_deref()).await?;
    Ok(Json(options))
}

pub async fn service_action_handler(
    State(state): State<ServerState>,
    Path(action): Path<String>,
) -> Response {
    let action = match action.parse::<ServiceAction>() {
        Ok(action) => action,
        Err(e) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": e }))).into_response();
        }
    };

    match state.surface.perform_action(action).await {
        ActionOutcome::Completed => {
            let snapshot = state.surface.current_status();
            (StatusCode::OK, status_response(&state, snapshot)).into_response()
        }
        ActionOutcome::Busy => (
            StatusCode::CONFLICT,
            Json(json!({ "error": format!("{} already in progress", action) })),
        )
            .into_response(),
        ActionOutcome::Failed(e) => ApiError(e.into()).into_response(),
    }
}

pub async fn open_handler(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(host_without_port)
        .unwrap_or("localhost");

    match state.surface.open_url(host).await {
        Some(url) => Json(json!({ "url": url })).into_response(),
        None => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "relay service is not running" })),
        )
            .into_response(),
    }
}

pub async fn settings_handler(
    State(state): State<ServerState>,
) -> Result<Json<RelaySettings>, ApiError> {
    Ok(Json(state.surface.settings().await?))
}

pub async fn update_settings_handler(
    State(state): State<ServerState>,
    Json(settings): Json<RelaySettings>,
) -> Result<Json<RelaySettings>, ApiError> {
    debug!("Settings update: {:?}", settings);
    Ok(Json(state.surface.update_settings(settings).await?))
}

pub async fn log_handler(State(state): State<ServerState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.log.read_reversed().await,
    )
}

pub async fn clear_log_handler(State(state): State<ServerState>) -> Response {
    match state.log.clear().await {
        Ok(()) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            state.log.read_reversed().await,
        )
            .into_response(),
        Err(e) => ApiError(e.into()).into_response(),
    }
}

pub async fn notifications_handler(
    State(state): State<ServerState>,
    Query(query): Query<NotificationQuery>,
) -> impl IntoResponse {
    Json(state.surface.notifier().since(query.since.unwrap_or(0)))
}
