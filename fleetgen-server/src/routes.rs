//! Generator control REST + SSE routes.
//!
//! ## Endpoints
//!
//! - `GET  /api/health`            - Liveness
//! - `POST /api/generator/start`   - Start generation (`VEHICLE_WRITE`)
//! - `POST /api/generator/stop`    - Stop generation (`VEHICLE_READ`)
//! - `GET  /api/generator/status`  - Status snapshot (`VEHICLE_READ`)
//! - `GET  /api/generator/events`  - SSE view-update channel (`VEHICLE_READ`)
//! - `GET  /api/bus/events`        - SSE of the generated-record bus topic (`VEHICLE_READ`)

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use fleetgen_core::{
    ControlResponse, GenerationController, MemoryBus, StatusSnapshot, ViewEvent,
};

use crate::access::{
    roles_from_headers, PermissionCheck, PermissionDenied, PERMISSION_DENIED_ERROR_CODE,
    READ_ROLES, WRITE_ROLES,
};

// ── State ────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<GenerationController>,
    pub bus: MemoryBus,
    pub permissions: Arc<dyn PermissionCheck>,
    /// Flips to `true` when the server is shutting down; ends SSE streams.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        controller: Arc<GenerationController>,
        bus: MemoryBus,
        permissions: Arc<dyn PermissionCheck>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            controller,
            bus,
            permissions,
            shutdown,
        }
    }

    fn authorize(
        &self,
        headers: &HeaderMap,
        required: &[&str],
        operation: &str,
    ) -> Result<(), ApiError> {
        let granted = roles_from_headers(headers);
        self.permissions
            .check(&granted, required, operation)
            .map_err(permission_denied)
    }

    /// Resolves once shutdown has been signalled.
    fn shutdown_signal(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.clone();
        async move {
            let _ = rx.wait_for(|stopping| *stopping).await;
        }
    }
}

// ── Request/Response Types ───────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub data: String,
}

/// Body of `GET /api/generator/status`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatusResponse {
    pub is_generating: bool,
    pub generated_count: u64,
    pub status: String,
}

impl From<StatusSnapshot> for GenerationStatusResponse {
    fn from(snapshot: StatusSnapshot) -> Self {
        Self {
            is_generating: snapshot.is_generating,
            generated_count: snapshot.generated_count,
            status: snapshot.status_label.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn permission_denied(err: PermissionDenied) -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse {
            code: PERMISSION_DENIED_ERROR_CODE,
            message: err.to_string(),
        }),
    )
}

// ── Router ───────────────────────────────────────────────────

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/generator/start", post(start_generation))
        .route("/api/generator/stop", post(stop_generation))
        .route("/api/generator/status", get(generation_status))
        .route("/api/generator/events", get(view_events))
        .route("/api/bus/events", get(bus_events))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        data: "OK".to_string(),
    })
}

/// POST /api/generator/start
async fn start_generation(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ControlResponse>, ApiError> {
    state.authorize(&headers, WRITE_ROLES, "GeneratorStartGeneration")?;
    Ok(Json(state.controller.start().await))
}

/// POST /api/generator/stop
async fn stop_generation(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ControlResponse>, ApiError> {
    state.authorize(&headers, READ_ROLES, "GeneratorStopGeneration")?;
    Ok(Json(state.controller.stop().await))
}

/// GET /api/generator/status
async fn generation_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<GenerationStatusResponse>, ApiError> {
    state.authorize(&headers, READ_ROLES, "GeneratorGenerationStatus")?;
    Ok(Json(state.controller.status().into()))
}

/// GET /api/generator/events: SSE view-update channel
async fn view_events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    state.authorize(&headers, READ_ROLES, "GeneratorEvents")?;

    let rx = state.controller.subscribe_view();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => view_event_to_sse(&event).map(Ok),
        Err(_) => None, // Lagged, skip missed messages
    });
    let stream = futures::StreamExt::take_until(stream, state.shutdown_signal());

    Ok(Sse::new(stream).keep_alive(keep_alive()))
}

/// GET /api/bus/events: SSE of the generated-record topic
async fn bus_events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    state.authorize(&headers, READ_ROLES, "GeneratorBusEvents")?;

    let topic = state.controller.config().generated_topic.clone();
    let rx = state.bus.subscribe(&topic).await;
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(message) => match serde_json::to_string(&message) {
            Ok(json) => Some(Ok(Event::default().event(message.event_name).data(json))),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    event = %message.event_name,
                    "Skipping unserializable bus message"
                );
                None
            }
        },
        Err(_) => None,
    });
    let stream = futures::StreamExt::take_until(stream, state.shutdown_signal());

    Ok(Sse::new(stream).keep_alive(keep_alive()))
}

/// SSE frame named after the event, carrying the inner payload as JSON.
/// `None` if the payload cannot be serialized.
fn view_event_to_sse(event: &ViewEvent) -> Option<Event> {
    let json = match event {
        ViewEvent::GeneratorVehicleGenerated(envelope) => serde_json::to_string(envelope),
        ViewEvent::GeneratorStatus(snapshot) => serde_json::to_string(snapshot),
    };
    match json {
        Ok(json) => Some(Event::default().event(event.name()).data(json)),
        Err(e) => {
            tracing::warn!(
                error = %e,
                event = event.name(),
                "Skipping unserializable view event"
            );
            None
        }
    }
}

fn keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(15))
        .text("ping")
}
