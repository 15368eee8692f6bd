//! HTTP API: axum router, handlers and the serve loop.
//!
//! # Endpoints
//!
//! | Method   | Path                    | Purpose                                   |
//! |----------|-------------------------|-------------------------------------------|
//! | `GET`    | `/health`               | Liveness check with server timestamp      |
//! | `POST`   | `/test`                 | Connectivity probe of one card            |
//! | `POST`   | `/trigger`              | Pulse one index on `ip:port`              |
//! | `POST`   | `/trigger-batch`        | Pulse many, one result per item           |
//! | `GET`    | `/cards`                | Card roster                               |
//! | `PUT`    | `/cards/{id}`           | Edit one card (validated, persisted)      |
//! | `GET`    | `/layouts?maxInputs=N`  | Selectable layouts fitting N inputs       |
//! | `GET`    | `/multiviewers`         | Current layout of every display           |
//! | `GET`    | `/staged`               | Pending changes in staging order          |
//! | `POST`   | `/staged`               | Stage (or cancel) one change              |
//! | `DELETE` | `/staged`               | Drop every pending change                 |
//! | `DELETE` | `/staged/{displayId}`   | Drop one pending change                   |
//! | `POST`   | `/staged/commit`        | Trigger every pending change              |
//! | `GET/PUT`| `/mode`                 | Read / switch immediate vs staged         |
//! | `POST`   | `/layout-change`        | Operator edit routed by the current mode  |
//!
//! Trigger and probe failures are reported inside a `200 OK` body with
//! `success: false`; only malformed requests get a 4xx status.  CORS is
//! permissive because the operator UI is served from another origin.
//!
//! # Shutdown
//!
//! [`run_server`] stops accepting requests once the shared `running` flag is
//! cleared (see `main.rs`) and lets in-flight requests finish.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use tally_core::domain::layout::BANK_SIZE;
use tally_core::{
    BatchResult, CardEndpoint, CardId, CardRegistry, DisplayId, EndpointUpdate, LayoutDefinition,
    LayoutError, MultiviewerCard, RegistryError, StagedChange, TriggerResult,
};

use crate::application::staging_service::AppliedLayoutChange;
use crate::application::{Clock, CommitOutcome, StagingStore, TriggerService};
use crate::domain::messages::{
    parse_index, BatchBody, HealthResponse, LayoutChangeBody, LayoutsQuery, ModeBody, StageBody,
    StatusReply, TestBody, TriggerBody, ERR_INVALID_TRIGGER, ERR_IP_REQUIRED,
    ERR_TRIGGERS_REQUIRED,
};
use crate::domain::BridgeConfig;
use crate::infrastructure::storage::ConfigStore;
use crate::infrastructure::transport::{PacketTransport, ProbeOutcome};

// ── State ─────────────────────────────────────────────────────────────────────

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub trigger: Arc<TriggerService>,
    pub staging: Arc<StagingStore>,
    /// Where roster edits are written back; `None` keeps them in memory.
    pub config_store: Option<Arc<ConfigStore>>,
}

impl AppState {
    pub fn new(
        config: BridgeConfig,
        transport: Arc<dyn PacketTransport>,
        clock: Arc<dyn Clock>,
        registry: CardRegistry,
        config_store: Option<Arc<ConfigStore>>,
    ) -> Self {
        let registry = Arc::new(RwLock::new(registry));
        let trigger = Arc::new(TriggerService::new(transport, clock, registry, &config));
        let staging = Arc::new(StagingStore::new(Arc::clone(&trigger), config.trigger_mode));
        Self {
            config: Arc::new(config),
            trigger,
            staging,
            config_store,
        }
    }
}

/// A rejected request: status code plus `{success: false, error}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(StatusReply::failed(self.message))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownCard(_) => Self::not_found(e.to_string()),
            RegistryError::InvalidEndpoint { .. } => Self::bad_request(e.to_string()),
        }
    }
}

impl From<LayoutError> for ApiError {
    fn from(e: LayoutError) -> Self {
        match e {
            LayoutError::UnknownCard(_) => Self::not_found(e.to_string()),
            _ => Self::bad_request(e.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Builds the full API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/test", post(test_connection))
        .route("/trigger", post(trigger))
        .route("/trigger-batch", post(trigger_batch))
        .route("/cards", get(list_cards))
        .route("/cards/{id}", put(update_card))
        .route("/layouts", get(list_layouts))
        .route("/multiviewers", get(list_multiviewers))
        .route(
            "/staged",
            get(list_staged).post(stage_change).delete(clear_staged),
        )
        .route("/staged/commit", post(commit_staged))
        .route("/staged/{display_id}", delete(unstage_change))
        .route("/mode", get(get_mode).put(put_mode))
        .route("/layout-change", post(layout_change))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the API until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound (port in use, missing
/// permission) or the server fails while running.
pub async fn run_server(state: AppState, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let bind_addr = state.config.bind_addr;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {bind_addr}"))?;

    info!("tally bridge listening on http://{bind_addr}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(wait_for_shutdown(running))
        .await
        .context("HTTP server terminated unexpectedly")?;

    Ok(())
}

async fn wait_for_shutdown(running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    info!("shutdown flag set; draining HTTP server");
}

// ── Handlers: trigger surface ─────────────────────────────────────────────────

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok(Utc::now()))
}

pub async fn test_connection(
    State(state): State<AppState>,
    Json(body): Json<TestBody>,
) -> Result<Json<ProbeOutcome>, ApiError> {
    let ip = body
        .ip
        .as_deref()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .ok_or_else(|| ApiError::bad_request(ERR_IP_REQUIRED))?;
    let port = body.port.unwrap_or(state.config.default_card_port);
    Ok(Json(state.trigger.probe(ip, port).await))
}

pub async fn trigger(
    State(state): State<AppState>,
    Json(body): Json<TriggerBody>,
) -> Result<Json<TriggerResult>, ApiError> {
    let request = body
        .validate(state.config.default_card_port)
        .map_err(|e| ApiError::bad_request(e.message()))?;
    Ok(Json(state.trigger.trigger_index(request).await))
}

pub async fn trigger_batch(
    State(state): State<AppState>,
    Json(body): Json<BatchBody>,
) -> Result<Json<BatchResult>, ApiError> {
    let items = body
        .triggers
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request(ERR_TRIGGERS_REQUIRED))?;

    let default_port = state.config.default_card_port;
    let parsed: Vec<Result<_, TriggerResult>> = items
        .iter()
        .map(|item| {
            serde_json::from_value::<TriggerBody>(item.clone())
                .ok()
                .and_then(|b| b.validate(default_port).ok())
                .ok_or_else(|| invalid_item(item))
        })
        .collect();

    let valid = parsed.iter().filter_map(|p| p.as_ref().ok().cloned()).collect();
    let mut triggered = state.trigger.trigger_batch(valid).await.results.into_iter();

    let results = parsed
        .into_iter()
        .map(|p| match p {
            Ok(request) => triggered.next().unwrap_or_else(|| {
                TriggerResult::failed(request.card_id, request.ip, request.index, "missing result")
            }),
            Err(rejected) => rejected,
        })
        .collect();

    Ok(Json(BatchResult::from_results(results)))
}

/// Echoes what could be read from a malformed batch item.
fn invalid_item(item: &Value) -> TriggerResult {
    let card_id = item
        .get("cardId")
        .and_then(Value::as_u64)
        .and_then(|n| CardId::try_from(n).ok());
    let ip = item.get("ip").and_then(Value::as_str).unwrap_or_default();
    let index = item.get("index").and_then(parse_index).unwrap_or(0);
    TriggerResult::failed(card_id, ip, index, ERR_INVALID_TRIGGER)
}

// ── Handlers: operator surface ────────────────────────────────────────────────

pub async fn list_cards(State(state): State<AppState>) -> Json<Vec<CardEndpoint>> {
    Json(state.trigger.registry().read().await.all().to_vec())
}

pub async fn update_card(
    State(state): State<AppState>,
    Path(id): Path<CardId>,
    Json(update): Json<EndpointUpdate>,
) -> Result<Json<CardEndpoint>, ApiError> {
    // The write guard is held through the save so files land in edit order.
    let mut registry = state.trigger.registry().write().await;
    let card = registry.update(id, update)?.clone();
    info!(card_id = id, ip = %card.ip, enabled = card.enabled, "card updated");

    if let Some(store) = &state.config_store {
        if let Err(e) = store.save_cards(registry.all()).await {
            error!("card {id} updated in memory but not saved: {e}");
        }
    }
    Ok(Json(card))
}

pub async fn list_layouts(
    State(state): State<AppState>,
    Query(query): Query<LayoutsQuery>,
) -> Json<Vec<&'static LayoutDefinition>> {
    let max_inputs = query.max_inputs.unwrap_or(BANK_SIZE);
    Json(state.trigger.catalog().available_layouts_for(max_inputs))
}

pub async fn list_multiviewers(State(state): State<AppState>) -> Json<Vec<MultiviewerCard>> {
    Json(state.staging.cards().await)
}

pub async fn list_staged(State(state): State<AppState>) -> Json<Vec<StagedChange>> {
    Json(state.staging.list().await)
}

pub async fn stage_change(
    State(state): State<AppState>,
    Json(body): Json<StageBody>,
) -> Json<Option<StagedChange>> {
    Json(
        state
            .staging
            .stage(body.display_id, &body.from_layout, &body.to_layout, body.card_id)
            .await,
    )
}

pub async fn unstage_change(
    State(state): State<AppState>,
    Path(display_id): Path<String>,
) -> Result<Json<StagedChange>, ApiError> {
    let display_id: DisplayId = display_id.parse()?;
    state
        .staging
        .unstage(display_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("nothing staged for {display_id}")))
}

pub async fn clear_staged(State(state): State<AppState>) -> StatusCode {
    state.staging.clear().await;
    StatusCode::NO_CONTENT
}

pub async fn commit_staged(State(state): State<AppState>) -> Json<CommitOutcome> {
    Json(state.staging.commit_all().await)
}

pub async fn get_mode(State(state): State<AppState>) -> Json<ModeBody> {
    Json(ModeBody {
        mode: state.staging.mode().await,
    })
}

pub async fn put_mode(
    State(state): State<AppState>,
    Json(body): Json<ModeBody>,
) -> Json<ModeBody> {
    state.staging.set_mode(body.mode).await;
    Json(body)
}

pub async fn layout_change(
    State(state): State<AppState>,
    Json(body): Json<LayoutChangeBody>,
) -> Result<Json<AppliedLayoutChange>, ApiError> {
    Ok(Json(
        state
            .staging
            .apply_layout_change(body.display_id, &body.layout)
            .await?,
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
