//! `/api/stats` routes.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::{ApiError, ApiResult, AppState, OrInternal};
use crate::store::stats::TimelinePeriod;

const DEFAULT_TOP_SENDERS: u32 = 10;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/overview", get(overview))
        .route("/sentiment", get(sentiment))
        .route("/priority", get(priority))
        .route("/categories", get(categories))
        .route("/timeline/:period", get(timeline))
        .route("/performance", get(performance))
        .route("/top-senders", get(top_senders))
}

async fn dashboard(State(state): State<AppState>) -> ApiResult {
    let stats = state
        .store
        .dashboard()
        .await
        .or_internal("Failed to fetch statistics")?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

async fn overview(State(state): State<AppState>) -> ApiResult {
    let stats = state
        .store
        .overview()
        .await
        .or_internal("Failed to fetch overview statistics")?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

async fn sentiment(State(state): State<AppState>) -> ApiResult {
    let stats = state
        .store
        .sentiment_stats()
        .await
        .or_internal("Failed to fetch sentiment statistics")?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

async fn priority(State(state): State<AppState>) -> ApiResult {
    let stats = state
        .store
        .priority_stats()
        .await
        .or_internal("Failed to fetch priority statistics")?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

async fn categories(State(state): State<AppState>) -> ApiResult {
    let stats = state
        .store
        .category_stats()
        .await
        .or_internal("Failed to fetch category statistics")?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

async fn timeline(State(state): State<AppState>, Path(period): Path<String>) -> ApiResult {
    let period: TimelinePeriod = period.parse().map_err(ApiError::BadRequest)?;
    let timeline = state
        .store
        .timeline(period)
        .await
        .or_internal("Failed to fetch timeline statistics")?;
    Ok(Json(json!({ "success": true, "data": timeline })))
}

async fn performance(State(state): State<AppState>) -> ApiResult {
    let stats = state
        .store
        .performance()
        .await
        .or_internal("Failed to fetch performance metrics")?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

#[derive(Debug, Default, Deserialize)]
struct LimitQuery {
    limit: Option<String>,
}

async fn top_senders(State(state): State<AppState>, Query(q): Query<LimitQuery>) -> ApiResult {
    let limit = q
        .limit
        .and_then(|l| l.parse::<u32>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_TOP_SENDERS);
    let senders = state
        .store
        .top_senders(limit)
        .await
        .or_internal("Failed to fetch top senders")?;
    Ok(Json(json!({ "success": true, "count": senders.len(), "data": senders })))
}
