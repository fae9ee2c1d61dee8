//! HTTP + WebSocket server for live driving telemetry.
//!
//! This module provides a server that:
//! - Accepts sensor samples from the simulator over `GET /ws`
//! - Runs them through the [`StreamPipeline`]
//! - Broadcasts `update` and `risk_alert` messages to every dashboard
//! - Answers session reset and report commands
//!
//! # Architecture
//!
//! ```text
//! Simulator ──→ ws: sensor_data ──→ pipeline ──→ driving log
//!                                      │
//!                                      ▼
//!                    ws: update / risk_alert ──→ Dashboards
//! ```
//!
//! Inbound frames are JSON `{"event": <name>, "data": {...}}` with events
//! `sensor_data`, `reset_session` and `generate_driving_report`.

use crate::config::Config;
use crate::core::{OutboundMessage, ReportGenerator, StreamPipeline, NOT_ENOUGH_DATA};
use crate::transparency::SharedTransparencyLog;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::process::{Child, Command};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Driver named in reports when the request names nobody
    pub default_driver_name: String,
    /// External sample producer started by `GET /run_simulator`
    pub simulator_command: Vec<String>,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            default_driver_name: crate::core::DEFAULT_DRIVER_NAME.to_string(),
            simulator_command: Vec::new(),
        }
    }

    /// Server settings from the service configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            default_driver_name: config.default_driver_name.clone(),
            simulator_command: config.simulator_command.clone(),
        }
    }
}

/// Channel sender half for pushing messages to a WebSocket connection.
type ClientSender = mpsc::UnboundedSender<Message>;

/// Shared server state
pub struct ServerState {
    /// Sample pipeline; the lock serializes processing and resets
    pipeline: Arc<Mutex<StreamPipeline>>,
    /// Report builder over the same driving log
    reports: ReportGenerator,
    /// Pipeline counters
    stats: SharedTransparencyLog,
    /// Connected WebSocket clients by connection id
    clients: RwLock<HashMap<String, ClientSender>>,
    /// Running simulator process, if started through the server
    simulator: Mutex<Option<Child>>,
    config: ServerConfig,
}

impl ServerState {
    /// Create new server state
    pub fn new(config: ServerConfig, pipeline: StreamPipeline, reports: ReportGenerator) -> Self {
        let stats = pipeline.stats().clone();
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            reports,
            stats,
            clients: RwLock::new(HashMap::new()),
            simulator: Mutex::new(None),
            config,
        }
    }

    /// Send a message to every connected client.
    async fn broadcast(&self, message: &OutboundMessage) {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(event = message.event_name(), error = %e, "Failed to encode message");
                return;
            }
        };
        for (conn_id, sender) in self.clients.read().await.iter() {
            if sender.send(Message::Text(json.clone())).is_err() {
                tracing::debug!(conn_id = %conn_id, "Client channel closed");
            }
        }
    }

    /// Send a message to one client.
    async fn send_to(&self, conn_id: &str, message: &OutboundMessage) {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(event = message.event_name(), error = %e, "Failed to encode message");
                return;
            }
        };
        if let Some(sender) = self.clients.read().await.get(conn_id) {
            if sender.send(Message::Text(json)).is_err() {
                tracing::debug!(conn_id = %conn_id, "Client channel closed");
            }
        }
    }

    /// Run `f` against the pipeline on the blocking pool.
    ///
    /// Processing and resets write to the driving log, which may be a file,
    /// so they stay off the async workers like report reads do.
    async fn with_pipeline<R, F>(&self, f: F) -> Result<R, tokio::task::JoinError>
    where
        F: FnOnce(&mut StreamPipeline) -> R + Send + 'static,
        R: Send + 'static,
    {
        let pipeline = self.pipeline.clone();
        tokio::task::spawn_blocking(move || f(&mut pipeline.blocking_lock())).await
    }

    /// Reset the session and build the acknowledgement.
    async fn reset_session(&self) -> Option<OutboundMessage> {
        match self.with_pipeline(|pipeline| pipeline.reset_session()).await {
            Ok(start) => Some(StreamPipeline::reset_ack(start)),
            Err(e) => {
                tracing::error!(error = %e, "Session reset task failed");
                None
            }
        }
    }

    /// Build the report for the current session.
    ///
    /// The pipeline lock is held only to read the session start; the log
    /// query runs on the blocking pool.
    async fn generate_report(&self, driver_name: Option<String>) -> String {
        let driver = driver_name.unwrap_or_else(|| self.config.default_driver_name.clone());
        let start = self.pipeline.lock().await.session().start_time();

        let report = match start {
            Some(start) => {
                let reports = self.reports.clone();
                tokio::task::spawn_blocking(move || reports.generate(start, &driver))
                    .await
                    .unwrap_or_else(|e| format!("Error generating report: {e}"))
            }
            None => NOT_ENOUGH_DATA.to_string(),
        };

        self.stats.record_report_generated();
        report
    }

    /// Stop the simulator child if one is running.
    async fn stop_simulator(&self) {
        if let Some(mut child) = self.simulator.lock().await.take() {
            if let Err(e) = child.kill() {
                tracing::debug!(error = %e, "Simulator already exited");
            }
            let _ = child.wait();
        }
    }
}

/// Inbound WebSocket frame
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Report request body
#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    pub driver_name: Option<String>,
}

/// Report response
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub report: String,
}

/// Response from session control endpoints
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

impl SessionResponse {
    fn success(message: impl Into<String>, start_time: String) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            start_time: Some(start_time),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            start_time: None,
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "Client connected");

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.clients.write().await.insert(conn_id.clone(), tx);
    state.send_to(&conn_id, &OutboundMessage::connected()).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_frame(&state, &conn_id, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.clients.write().await.remove(&conn_id);
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Client disconnected");
}

/// Dispatch one inbound frame.
async fn handle_frame(state: &ServerState, conn_id: &str, text: &str) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(conn_id = %conn_id, error = %e, "Ignoring unparseable frame");
            return;
        }
    };

    match frame.event.as_str() {
        "sensor_data" => {
            let data = frame.data;
            let outcome = match state.with_pipeline(move |pipeline| pipeline.process(&data)).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(conn_id = %conn_id, error = %e, "Sample processing task failed");
                    return;
                }
            };
            for message in outcome.messages() {
                state.broadcast(message).await;
            }
        }
        "reset_session" => {
            if let Some(ack) = state.reset_session().await {
                state.send_to(conn_id, &ack).await;
            }
        }
        "generate_driving_report" => {
            let driver_name = frame
                .data
                .get("driver_name")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            let report = state.generate_report(driver_name).await;
            state
                .send_to(conn_id, &OutboundMessage::DrivingReport { report })
                .await;
        }
        other => {
            tracing::debug!(conn_id = %conn_id, event = other, "Ignoring unknown event");
        }
    }
}

/// GET /run_simulator
///
/// Starts the configured sample producer unless one is already running.
async fn run_simulator(State(state): State<Arc<ServerState>>) -> Json<SessionResponse> {
    let mut slot = state.simulator.lock().await;

    if let Some(child) = slot.as_mut() {
        if matches!(child.try_wait(), Ok(None)) {
            return Json(SessionResponse::error("Simulator is already running"));
        }
    }

    let Some((program, args)) = state.config.simulator_command.split_first() else {
        return Json(SessionResponse::error("No simulator command configured"));
    };

    match Command::new(program).args(args).spawn() {
        Ok(child) => {
            tracing::info!(pid = child.id(), program = %program, "Simulator started");
            *slot = Some(child);
            let start = state.pipeline.lock().await.ensure_session();
            Json(SessionResponse::success(
                "Simulator started successfully",
                start.format("%Y-%m-%d %H:%M:%S").to_string(),
            ))
        }
        Err(e) => {
            tracing::error!(program = %program, error = %e, "Failed to start simulator");
            Json(SessionResponse::error(format!("Failed to start simulator: {e}")))
        }
    }
}

/// GET /reset_session
async fn reset_session(State(state): State<Arc<ServerState>>) -> Json<SessionResponse> {
    match state.reset_session().await {
        Some(OutboundMessage::SessionReset { start_time, .. }) => {
            Json(SessionResponse::success("Session reset successfully", start_time))
        }
        _ => Json(SessionResponse::error("Session reset failed")),
    }
}

/// POST /report
async fn report(
    State(state): State<Arc<ServerState>>,
    body: Option<Json<ReportRequest>>,
) -> Json<ReportResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    Json(ReportResponse {
        report: state.generate_report(request.driver_name).await,
    })
}

/// Build the application router.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/run_simulator", get(run_simulator))
        .route("/reset_session", get(reset_session))
        .route("/report", post(report))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the server
pub async fn run(
    config: ServerConfig,
    pipeline: StreamPipeline,
    reports: ReportGenerator,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let actual_addr = listener.local_addr()?;

    let state = Arc::new(ServerState::new(config, pipeline, reports));
    let app = router(state.clone());

    tracing::info!("NeuroDrive server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
        state.stop_simulator().await;
    });

    Ok((actual_addr, shutdown_tx))
}
