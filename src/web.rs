//! Axum-based HTTP API with optional OpenAPI (utoipa) and Swagger UI

use crate::config::Config;
use crate::config_flow::{ConfigFlow, FlowResult, UserInput};
use crate::entity::EntityState;
use crate::entries::{EntryStore, EntrySummary};
use crate::error::BridgeError;
use crate::registry::IntegrationRegistry;
use crate::services::{self, SetChargingAmpsCall};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<IntegrationRegistry>,
    pub entries: Arc<Mutex<EntryStore>>,
    pub config: Arc<Config>,
}

/// Error body returned by every failing handler
pub struct ApiError(pub BridgeError);

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        Self(e)
    }
}

pub fn status_for(error: &BridgeError) -> StatusCode {
    match error {
        BridgeError::NotFound { .. } => StatusCode::NOT_FOUND,
        BridgeError::Validation { .. } => StatusCode::BAD_REQUEST,
        BridgeError::Api { .. }
        | BridgeError::Auth { .. }
        | BridgeError::Network { .. }
        | BridgeError::Timeout { .. }
        | BridgeError::UpdateFailed { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            status_for(&self.0),
            Json(serde_json::json!({"error": self.0.to_string()})),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Serialize)]
struct EntryView {
    #[serde(flatten)]
    summary: EntrySummary,
    loaded: bool,
    status: Option<crate::coordinator::CoordinatorStatus>,
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/health", responses(
    (status = 200, description = "Service is healthy")
)))]
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/entries", responses((status = 200))))]
async fn list_entries(State(state): State<AppState>) -> impl IntoResponse {
    let summaries: Vec<EntrySummary> = {
        let store = state.entries.lock().await;
        store.list().iter().map(EntrySummary::from).collect()
    };
    let mut views = Vec::with_capacity(summaries.len());
    for summary in summaries {
        let status = state.registry.entry_status(&summary.entry_id).await;
        views.push(EntryView {
            loaded: status.is_some(),
            status,
            summary,
        });
    }
    Json(views)
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/entries", request_body = UserInput, responses(
    (status = 201, description = "Entry created"),
    (status = 400, description = "Form shown again with an error code")
)))]
async fn create_entry(
    State(state): State<AppState>,
    Json(input): Json<UserInput>,
) -> ApiResult<Response> {
    let flow = ConfigFlow::new(state.registry.factory());
    let entry = match flow.step_user(Some(input)).await {
        FlowResult::CreateEntry { entry, .. } => entry,
        form @ FlowResult::ShowForm { .. } => {
            return Ok((StatusCode::BAD_REQUEST, Json(form)).into_response());
        }
    };

    state.entries.lock().await.add(entry.clone())?;
    let summary = EntrySummary::from(&entry);
    let loaded = match state.registry.setup_entry(entry).await {
        Ok(()) => true,
        Err(e) => {
            crate::logging::get_logger("web")
                .warn(&format!("Entry {} saved but not loaded: {}", summary.entry_id, e));
            false
        }
    };
    let status = state.registry.entry_status(&summary.entry_id).await;
    Ok((
        StatusCode::CREATED,
        Json(EntryView {
            summary,
            loaded,
            status,
        }),
    )
        .into_response())
}

#[cfg_attr(feature = "openapi", utoipa::path(delete, path = "/api/entries/{entry_id}",
    params(("entry_id" = String, Path)), responses(
    (status = 204), (status = 404)
)))]
async fn delete_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.registry.unload_entry(&entry_id).await;
    match state.entries.lock().await.remove(&entry_id)? {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(BridgeError::not_found(format!("entry {}", entry_id)).into()),
    }
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/entries/{entry_id}/refresh",
    params(("entry_id" = String, Path)), responses(
    (status = 200), (status = 404), (status = 502)
)))]
async fn refresh_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.registry.refresh_entry(&entry_id).await?;
    Ok(Json(state.registry.entry_status(&entry_id).await))
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/devices", responses((status = 200))))]
async fn devices(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.devices().await)
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/sensors", responses((status = 200))))]
async fn sensors(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.sensor_states().await)
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/sensors/{entity_id}",
    params(("entity_id" = String, Path)), responses(
    (status = 200), (status = 404)
)))]
async fn sensor(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state
        .registry
        .sensor_states()
        .await
        .into_iter()
        .find(|s| s.entity_id == entity_id)
        .map(Json)
        .ok_or_else(|| ApiError::from(BridgeError::not_found(format!("sensor {}", entity_id))))
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/switches", responses((status = 200))))]
async fn switches(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.switch_states().await)
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/switches/{entity_id}",
    params(("entity_id" = String, Path)), responses(
    (status = 200), (status = 404)
)))]
async fn switch_state(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state
        .registry
        .switch_states()
        .await
        .into_iter()
        .find(|s| s.entity_id == entity_id)
        .map(Json)
        .ok_or_else(|| ApiError::from(BridgeError::not_found(format!("switch {}", entity_id))))
}

async fn toggle(state: &AppState, entity_id: &str, on: bool) -> ApiResult<Json<EntityState>> {
    let switch = state
        .registry
        .switch(entity_id)
        .await
        .ok_or_else(|| BridgeError::not_found(format!("switch {}", entity_id)))?;
    if on {
        switch.turn_on().await?;
    } else {
        switch.turn_off().await?;
    }
    let current = state
        .registry
        .entity_state(entity_id)
        .await
        .ok_or_else(|| BridgeError::not_found(format!("switch {}", entity_id)))?;
    Ok(Json(current))
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/switches/{entity_id}/turn_on",
    params(("entity_id" = String, Path)), responses(
    (status = 200), (status = 404), (status = 502)
)))]
async fn turn_on(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    toggle(&state, &entity_id, true).await
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/switches/{entity_id}/turn_off",
    params(("entity_id" = String, Path)), responses(
    (status = 200), (status = 404), (status = 502)
)))]
async fn turn_off(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    toggle(&state, &entity_id, false).await
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/services/set_charging_amps",
    request_body = SetChargingAmpsCall, responses((status = 200), (status = 400), (status = 404), (status = 502))))]
async fn set_charging_amps(
    State(state): State<AppState>,
    Json(call): Json<SetChargingAmpsCall>,
) -> ApiResult<impl IntoResponse> {
    let outcome = services::set_charging_amps(&state.registry, call).await?;
    Ok(Json(outcome))
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/events", responses((status = 200))))]
async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let rx = state.registry.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|msg| {
        let payload = serde_json::to_string(&msg.ok()?).ok()?;
        Some(Ok::<Event, std::convert::Infallible>(
            Event::default().event("update").data(payload),
        ))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(feature = "openapi")]
#[utoipa::path(get, path = "/api/config/schema", responses((status = 200)))]
async fn get_config_schema() -> impl IntoResponse {
    let schema = schemars::schema_for!(crate::config::Config);
    Json(serde_json::to_value(&schema).unwrap_or(serde_json::json!({"error":"schema"})))
}

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        health, list_entries, create_entry, delete_entry, refresh_entry,
        devices, sensors, sensor, switches, switch_state, turn_on, turn_off,
        set_charging_amps, events, get_config_schema,
    ),
    components(schemas(UserInput, SetChargingAmpsCall, EntrySummary)),
    tags((name = "tessie-bridge", description = "Tessie vehicle sensors and switches"))
)]
pub struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/api/health", get(health))
        .route("/api/entries", get(list_entries).post(create_entry))
        .route("/api/entries/{entry_id}", delete(delete_entry))
        .route("/api/entries/{entry_id}/refresh", post(refresh_entry))
        .route("/api/devices", get(devices))
        .route("/api/sensors", get(sensors))
        .route("/api/sensors/{entity_id}", get(sensor))
        .route("/api/switches", get(switches))
        .route("/api/switches/{entity_id}", get(switch_state))
        .route("/api/switches/{entity_id}/turn_on", post(turn_on))
        .route("/api/switches/{entity_id}/turn_off", post(turn_off))
        .route("/api/services/set_charging_amps", post(set_charging_amps))
        .route("/api/events", get(events));

    #[cfg(feature = "openapi")]
    let router = {
        use utoipa::OpenApi;
        router
            .route("/api/config/schema", get(get_config_schema))
            .merge(
                utoipa_swagger_ui::SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()),
            )
    };

    router
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let host = state.config.web.host.clone();
    let port = state.config.web.port;
    let router = build_router(state);

    let logger = crate::logging::get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            ([127, 0, 0, 1], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (API /api)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
