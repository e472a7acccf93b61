//! `/api/emails` routes.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::{ApiError, ApiResult, AppState, OrInternal};
use crate::classifier::Priority;
use crate::ingest::sample_inbox;
use crate::responder::insights::analyze_content;
use crate::responder::{ReplyRequest, ResponseGenerator};
use crate::store::{EmailFilter, EmailStatus, EmailStore};

const DEFAULT_RECENT_HOURS: u32 = 24;
const ANALYZE_WINDOW_HOURS: u32 = 168;
const INVALID_STATUS: &str = "Invalid status. Must be: pending, responded, or resolved";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/urgent", get(urgent))
        .route("/recent/:hours", get(recent))
        .route("/fetch", post(fetch))
        .route("/analyze", post(analyze))
        .route("/bulk/update-status", post(bulk_update_status))
        .route("/:id", get(show).delete(soft_delete))
        .route("/:id/status", put(update_status))
        .route("/:id/generate-response", post(generate_response))
}

fn parse_status(raw: Option<&str>) -> Result<EmailStatus, ApiError> {
    raw.and_then(|s| s.parse().ok())
        .ok_or_else(|| ApiError::BadRequest(INVALID_STATUS.to_owned()))
}

async fn list(
    State(state): State<AppState>,
    query: Result<Query<EmailFilter>, QueryRejection>,
) -> ApiResult {
    let Query(filter) = query?;
    let emails = state
        .store
        .find(&filter)
        .await
        .or_internal("Failed to fetch emails")?;
    Ok(Json(json!({ "success": true, "count": emails.len(), "data": emails })))
}

/// Urgent emails that are not yet resolved, newest first.
async fn urgent(State(state): State<AppState>) -> ApiResult {
    let filter = EmailFilter {
        priority: Some(Priority::Urgent),
        limit: None,
        ..EmailFilter::default()
    };
    let emails: Vec<_> = state
        .store
        .find(&filter)
        .await
        .or_internal("Failed to fetch urgent emails")?
        .into_iter()
        .filter(|e| e.status != EmailStatus::Resolved)
        .collect();
    Ok(Json(json!({ "success": true, "count": emails.len(), "data": emails })))
}

async fn recent(State(state): State<AppState>, Path(hours): Path<String>) -> ApiResult {
    let hours = hours
        .parse::<u32>()
        .ok()
        .filter(|h| *h > 0)
        .unwrap_or(DEFAULT_RECENT_HOURS);
    let emails = state
        .store
        .find_recent(hours)
        .await
        .or_internal("Failed to fetch recent emails")?;
    Ok(Json(json!({
        "success": true,
        "count": emails.len(),
        "timeframe": format!("{hours} hours"),
        "data": emails,
    })))
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let email = state
        .store
        .find_by_id(&id)
        .await
        .or_internal("Failed to fetch email")?
        .ok_or_else(ApiError::email_not_found)?;
    Ok(Json(json!({ "success": true, "data": email })))
}

/// Ingest the demo inbox.
async fn fetch(State(state): State<AppState>) -> ApiResult {
    let stored = state.ingestor.ingest(sample_inbox()).await;
    Ok(Json(json!({
        "success": true,
        "message": format!("Successfully processed {} new emails", stored.len()),
        "count": stored.len(),
        "data": stored,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GenerateBody {
    custom_context: Option<String>,
}

async fn generate_response(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<GenerateBody>>,
) -> ApiResult {
    const WHAT: &str = "Failed to generate response";
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let email = state
        .store
        .find_by_id(&id)
        .await
        .or_internal(WHAT)?
        .ok_or_else(ApiError::email_not_found)?;

    let reply = state
        .responder
        .generate(&ReplyRequest::from(&email), body.custom_context.as_deref())
        .await
        .or_internal(WHAT)?;
    state
        .store
        .set_ai_response(&email.id, &reply)
        .await
        .or_internal(WHAT)?
        .ok_or_else(ApiError::email_not_found)?;

    Ok(Json(json!({
        "success": true,
        "data": { "emailId": email.id, "aiResponse": reply },
    })))
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: Option<String>,
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let status = parse_status(body.status.as_deref())?;
    let email = state
        .store
        .update_status(&id, status)
        .await
        .or_internal("Failed to update email status")?
        .ok_or_else(ApiError::email_not_found)?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Email status updated to {status}"),
        "data": email,
    })))
}

/// Emails are never removed; deleting marks them resolved.
async fn soft_delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let email = state
        .store
        .update_status(&id, EmailStatus::Resolved)
        .await
        .or_internal("Failed to delete email")?
        .ok_or_else(ApiError::email_not_found)?;
    Ok(Json(json!({
        "success": true,
        "message": "Email marked as resolved",
        "data": email,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkStatusBody {
    email_ids: Option<Vec<String>>,
    status: Option<String>,
}

async fn bulk_update_status(
    State(state): State<AppState>,
    body: Result<Json<BulkStatusBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let ids = body
        .email_ids
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| ApiError::BadRequest("emailIds array is required".to_owned()))?;
    let status = parse_status(body.status.as_deref())?;
    let modified = state
        .store
        .bulk_update_status(&ids, status)
        .await
        .or_internal("Failed to bulk update emails")?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Updated {modified} emails to {status}"),
        "data": { "modifiedCount": modified },
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AnalyzeBody {
    email_ids: Vec<String>,
}

/// Content analysis and summary over the given emails, or the last week.
async fn analyze(State(state): State<AppState>, body: Option<Json<AnalyzeBody>>) -> ApiResult {
    const WHAT: &str = "Failed to analyze emails";
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let emails = if body.email_ids.is_empty() {
        state.store.find_recent(ANALYZE_WINDOW_HOURS).await
    } else {
        state.store.find_by_ids(&body.email_ids).await
    }
    .or_internal(WHAT)?;

    let analysis = analyze_content(&emails);
    let summary = state.responder.batch_summary(&emails).await;
    Ok(Json(json!({
        "success": true,
        "data": { "analysis": analysis, "summary": summary, "emailCount": emails.len() },
    })))
}
