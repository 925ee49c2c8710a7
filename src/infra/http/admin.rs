//! Administrative surface: cache maintenance and prewarming.
//!
//! Every route here is destructive or expensive, so the whole router sits
//! behind the `x-admin-secret` header. With no secret configured the surface
//! stays disabled rather than open.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::application::shortage::{PrewarmOptions, PrewarmSummary, ShortageService};
use crate::cache::CacheAdmin;

use super::error::ApiError;

const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

#[derive(Clone)]
pub struct AdminState {
    pub cache_admin: CacheAdmin,
    pub shortage: Arc<ShortageService>,
    /// Shared secret for the admin surface; `None` disables it.
    pub secret: Option<Arc<str>>,
    /// Scan batch size used by pattern purges.
    pub purge_batch: usize,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/api/admin/cache/flush-all", post(flush_all))
        .route("/api/admin/cache/purge", post(purge))
        .route("/api/admin/shortage/prewarm", post(prewarm))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth))
        .with_state(state)
}

async fn admin_auth(
    State(state): State<AdminState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(secret) = state.secret.as_deref() else {
        return Err(ApiError::unauthorized());
    };
    let provided = request
        .headers()
        .get(ADMIN_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    if provided != Some(secret) {
        return Err(ApiError::unauthorized());
    }
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
struct FlushResponse {
    ok: bool,
    flushed: &'static str,
}

/// Wipes the entire shared store, sessions and all. Deliberately its own
/// endpoint with nothing else on it.
async fn flush_all(State(state): State<AdminState>) -> Result<Json<FlushResponse>, ApiError> {
    state
        .cache_admin
        .flush_all()
        .await
        .map_err(|err| ApiError::from(crate::application::error::AppError::Cache(err.into())))?;
    Ok(Json(FlushResponse {
        ok: true,
        flushed: "ALL",
    }))
}

#[derive(Debug, Deserialize)]
struct PurgeRequest {
    pattern: String,
    batch: Option<usize>,
}

#[derive(Debug, Serialize)]
struct PurgeResponse {
    deleted: u64,
}

async fn purge(
    State(state): State<AdminState>,
    Json(body): Json<PurgeRequest>,
) -> Result<Json<PurgeResponse>, ApiError> {
    if body.pattern.trim().is_empty() {
        return Err(ApiError::bad_request("pattern required"));
    }
    let batch = body.batch.unwrap_or(state.purge_batch);
    let deleted = state
        .cache_admin
        .del_by_pattern(body.pattern.trim(), batch)
        .await
        .map_err(|err| ApiError::from(crate::application::error::AppError::Cache(err.into())))?;
    Ok(Json(PurgeResponse { deleted }))
}

async fn prewarm(
    State(state): State<AdminState>,
    Json(options): Json<PrewarmOptions>,
) -> Result<Json<PrewarmSummary>, ApiError> {
    let summary = state.shortage.prewarm(options).await?;
    Ok(Json(summary))
}
