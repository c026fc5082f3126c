use crate::config::ServerConfig;
use crate::control::ControlSurface;
use crate::error::{MirrorError, Result};
use crate::logview::LogView;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{
    clear_log_handler, devices_handler, health_handler, log_handler, notifications_handler,
    open_handler, refresh_devices_handler, refresh_status_handler, select_device_handler,
    service_action_handler, settings_handler, status_handler, update_settings_handler,
};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) surface: ControlSurface,
    pub(crate) log: LogView,
}

/// JSON API the browser polls and drives
pub struct ControlServer {
    pub(crate) config: ServerConfig,
    pub(crate) state: ServerState,
}

impl ControlServer {
    pub fn new(config: ServerConfig, surface: ControlSurface, log: LogView) -> Self {
        Self {
            config,
            state: ServerState { surface, log },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/api/status", get(status_handler))
            .route("/api/status/refresh", post(refresh_status_handler))
            .route("/api/devices", get(devices_handler))
            .route("/api/devices/refresh", post(refresh_devices_handler))
            .route("/api/devices/selected", put(select_device_handler))
            .route("/api/service/:action", post(service_action_handler))
            .route("/api/open", get(open_handler))
            .route(
                "/api/settings",
                get(settings_handler).put(update_settings_handler),
            )
            .route("/api/log", get(log_handler).delete(clear_log_handler))
            .route("/api/notifications", get(notifications_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.ip, self.config.port);
        info!("Starting control API on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            MirrorError::system(format!("Failed to bind {}: {}", addr, e))
        })?;

        info!("Control API listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| MirrorError::system(format!("Server error: {}", e)))?;

        Ok(())
    }
}
