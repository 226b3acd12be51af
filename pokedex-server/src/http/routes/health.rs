//! Health check endpoint

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::http::error::ApiResult;
use crate::models::PokemonFilter;
use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Number of species in the catalog
    pub pokemon: i64,
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let pokemon = state.store.count(&PokemonFilter::default()).await?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        pokemon,
    }))
}

/// Health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}
