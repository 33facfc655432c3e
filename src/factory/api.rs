use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use super::models::{FactoryAttribute, FactoryConfig, FactoryRecord, Owner};
use super::store::StoreHandle;
use crate::errors::StoreError;
use crate::transport::ChannelHub;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub store: StoreHandle,
    pub hub: Arc<ChannelHub>,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateFactoryRequest {
    /// Pre-assigned id; generated when absent.
    pub id: Option<String>,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<FactoryAttribute>,
    pub config: FactoryConfig,
}

#[derive(Deserialize)]
pub struct UpdateFactoryRequest {
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<FactoryAttribute>,
    pub config: FactoryConfig,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Server(cause) => ApiError::Internal(cause.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/factories", get(find_factories).post(create_factory))
        .route(
            "/api/factories/{id}",
            get(get_factory).put(update_factory).delete(delete_factory),
        )
        .route("/api/owners", post(create_owner))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn create_factory(
    State(state): State<SharedState>,
    Json(req): Json<CreateFactoryRequest>,
) -> Result<(StatusCode, Json<FactoryRecord>), ApiError> {
    let record = FactoryRecord {
        id: req
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        owner_id: req.owner_id,
        name: req.name,
        attributes: req.attributes,
        config: req.config,
        created_at: String::new(),
    };
    let created = state.store.call(move |s| s.create(&record)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_factory(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<FactoryRecord>, ApiError> {
    let record = state.store.call(move |s| s.get(&id)).await?;
    Ok(Json(record))
}

async fn update_factory(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFactoryRequest>,
) -> Result<Json<FactoryRecord>, ApiError> {
    let record = FactoryRecord {
        id,
        owner_id: req.owner_id,
        name: req.name,
        attributes: req.attributes,
        config: req.config,
        created_at: String::new(),
    };
    let updated = state.store.call(move |s| s.update(&record)).await?;
    Ok(Json(updated))
}

async fn delete_factory(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.call(move |s| s.remove(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Paged, attribute-filtered retrieval. `skip` and `maxItems` control the
/// page; every other query pair is an attribute filter.
async fn find_factories(
    State(state): State<SharedState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<FactoryRecord>>, ApiError> {
    let mut skip = 0usize;
    let mut max_items = 30usize;
    let mut attributes = Vec::new();
    for (name, value) in params {
        match name.as_str() {
            "skip" => {
                skip = value
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("Invalid skip value '{}'", value)))?;
            }
            "maxItems" => {
                max_items = value.parse().map_err(|_| {
                    ApiError::BadRequest(format!("Invalid maxItems value '{}'", value))
                })?;
            }
            _ => attributes.push((name, value)),
        }
    }
    let found = state
        .store
        .call(move |s| s.find_by_attribute(max_items, skip, &attributes))
        .await?;
    Ok(Json(found))
}

async fn create_owner(
    State(state): State<SharedState>,
    Json(owner): Json<Owner>,
) -> Result<(StatusCode, Json<Owner>), ApiError> {
    let stored = owner.clone();
    state.store.call(move |s| s.put_owner(&owner)).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}
