//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint. Handlers only
//! translate between JSON and engine calls.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{CacheError, Result};
use crate::instrument::Replay;
use crate::models::{
    DeleteResponse, FlushResponse, GetResponse, HealthResponse, StatsResponse, StoreRequest,
    StoreResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache engine
    pub engine: Engine,
}

impl AppState {
    /// Creates a new AppState around an existing engine.
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            engine: Engine::from_config(config),
        }
    }
}

/// Handler for POST /store
///
/// Stores a value under a generated key and returns the key.
pub async fn store_handler(
    State(state): State<AppState>,
    Json(req): Json<StoreRequest>,
) -> Result<Json<StoreResponse>> {
    let (value, ttl) = req.into_parts()?;
    let key = state.engine.store(value, ttl).await?;

    Ok(Json(StoreResponse::new(key)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .engine
        .retrieve(&key)
        .await
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, &value)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if state.engine.delete(&key).await {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for POST /flush
pub async fn flush_handler(State(state): State<AppState>) -> Json<FlushResponse> {
    let removed = state.engine.flush().await;
    Json(FlushResponse { removed })
}

/// Handler for GET /replay/:name
///
/// Returns the call count and input/output history of an operation.
pub async fn replay_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<Replay> {
    Json(state.engine.replay(&name).await)
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.engine.stats().await))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
