//! Public API handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::application::rank::{RankRequest, RankResponse, RankService};
use crate::application::shortage::{ShortageReport, ShortageService};
use crate::domain::Selection;

use super::error::ApiError;

#[derive(Clone)]
pub struct ApiState {
    pub shortage: Arc<ShortageService>,
    pub rank: Arc<RankService>,
}

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/shortage/by-anzsco", post(shortage_by_anzsco))
        .route("/api/occupations/rank-by-codes", post(rank_by_codes))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ShortageByAnzscoRequest {
    anzsco_code: String,
}

async fn shortage_by_anzsco(
    State(state): State<ApiState>,
    Json(body): Json<ShortageByAnzscoRequest>,
) -> Result<Json<ShortageReport>, ApiError> {
    let report = state.shortage.by_code(&body.anzsco_code).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize, Default)]
struct RankQuery {
    industry: Option<String>,
    limit: Option<usize>,
    refresh: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RankBody {
    #[serde(default)]
    selections: Vec<Selection>,
    industry: Option<String>,
}

#[derive(Debug, Serialize)]
struct RankEnvelope {
    cached: bool,
    #[serde(flatten)]
    response: RankResponse,
}

async fn rank_by_codes(
    State(state): State<ApiState>,
    Query(query): Query<RankQuery>,
    Json(body): Json<RankBody>,
) -> Result<Json<RankEnvelope>, ApiError> {
    // A non-blank query-string industry wins over the body, as in the
    // wizard client.
    let industry = query
        .industry
        .filter(|value| !value.trim().is_empty())
        .or(body.industry);
    let outcome = state
        .rank
        .rank(RankRequest {
            selections: body.selections,
            industry,
            limit: query.limit,
            refresh: query.refresh.as_deref() == Some("1"),
        })
        .await?;
    Ok(Json(RankEnvelope {
        cached: outcome.cached,
        response: outcome.response,
    }))
}
