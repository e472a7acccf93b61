//! `/api/email-sender` routes: manual sends and queue control.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::{present, ApiError, ApiResult, AppState};

const DEFAULT_ITEMS_LIMIT: usize = 50;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/send-response", post(send_response))
        .route("/queue-status", get(queue_status))
        .route("/queue-items", get(queue_items))
        .route("/process-urgent", post(process_urgent))
        .route("/force-process", post(force_process))
        .route("/clear-completed", post(clear_completed))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBody {
    email_id: Option<String>,
    response_text: Option<String>,
    #[serde(alias = "customSubject")]
    subject: Option<String>,
}

async fn send_response(
    State(state): State<AppState>,
    body: Result<Json<SendBody>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let (Some(email_id), Some(text)) = (present(req.email_id), present(req.response_text)) else {
        return Err(ApiError::BadRequest(
            "emailId and responseText are required".to_owned(),
        ));
    };
    let receipt = state
        .sender
        .send(&email_id, &text, present(req.subject).as_deref())
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Email response sent successfully",
        "data": receipt,
    })))
}

async fn queue_status(State(state): State<AppState>) -> ApiResult {
    Ok(Json(json!({ "success": true, "data": state.queue.status().await })))
}

#[derive(Debug, Default, Deserialize)]
struct ItemsQuery {
    limit: Option<String>,
}

async fn queue_items(State(state): State<AppState>, Query(q): Query<ItemsQuery>) -> ApiResult {
    let limit = q
        .limit
        .and_then(|l| l.parse::<usize>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_ITEMS_LIMIT);
    let items = state.queue.items(limit).await;
    Ok(Json(json!({ "success": true, "count": items.len(), "data": items })))
}

async fn process_urgent(State(state): State<AppState>) -> ApiResult {
    let drain = state.queue.process_urgent_now().await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Processed {} urgent emails", drain.processed),
        "data": drain,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForceBody {
    email_id: Option<String>,
}

async fn force_process(
    State(state): State<AppState>,
    body: Result<Json<ForceBody>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let email_id = present(req.email_id)
        .ok_or_else(|| ApiError::BadRequest("emailId is required".to_owned()))?;
    let result = state.queue.force_process_email(&email_id).await?;
    let message = if result.success {
        "Email processed successfully"
    } else {
        "Email processing failed"
    };
    Ok(Json(json!({
        "success": result.success,
        "message": message,
        "data": result,
    })))
}

async fn clear_completed(State(state): State<AppState>) -> ApiResult {
    let removed = state.queue.clear_completed().await;
    Ok(Json(json!({
        "success": true,
        "message": format!("Cleared {removed} completed items"),
        "data": { "removed": removed },
    })))
}
