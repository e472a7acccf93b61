//! `/api/ai` routes: classifier and responder on ad-hoc input.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::{present, ApiError, ApiResult, AppState, OrInternal};
use crate::classifier::{
    analyze_sentiment, classify_category, classify_priority, extract_information, sentiment_score,
};
use crate::responder::{ReplyRequest, ResponseGenerator};

const PREVIEW_CHARS: usize = 100;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/analyze-sentiment", post(sentiment))
        .route("/determine-priority", post(priority))
        .route("/extract-info", post(extract))
        .route("/generate-response", post(generate))
        .route("/capabilities", get(capabilities))
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[derive(Debug, Deserialize)]
struct TextBody {
    text: Option<String>,
}

async fn sentiment(body: Result<Json<TextBody>, JsonRejection>) -> ApiResult {
    let Json(body) = body?;
    let text = present(body.text)
        .ok_or_else(|| ApiError::BadRequest("Text is required for sentiment analysis".to_owned()))?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "text": preview(&text),
            "sentiment": analyze_sentiment(&text),
            "score": sentiment_score(&text),
        },
    })))
}

#[derive(Debug, Deserialize)]
struct SubjectBody {
    subject: Option<String>,
    body: Option<String>,
}

async fn priority(body: Result<Json<SubjectBody>, JsonRejection>) -> ApiResult {
    let Json(req) = body?;
    let (Some(subject), Some(text)) = (present(req.subject), present(req.body)) else {
        return Err(ApiError::BadRequest(
            "Subject and body are required for priority determination".to_owned(),
        ));
    };
    Ok(Json(json!({
        "success": true,
        "data": {
            "subject": subject,
            "priority": classify_priority(&subject, &text),
            "category": classify_category(&subject),
        },
    })))
}

#[derive(Debug, Deserialize)]
struct ExtractBody {
    body: Option<String>,
}

async fn extract(body: Result<Json<ExtractBody>, JsonRejection>) -> ApiResult {
    let Json(req) = body?;
    let text = present(req.body).ok_or_else(|| {
        ApiError::BadRequest("Email body is required for information extraction".to_owned())
    })?;
    Ok(Json(json!({ "success": true, "data": extract_information(&text) })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    email_data: Option<ReplyRequest>,
    custom_context: Option<String>,
}

async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let email = req
        .email_data
        .filter(|e| !e.subject.trim().is_empty() && !e.body.trim().is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest("Email data with subject and body is required".to_owned())
        })?;
    let reply = state
        .responder
        .generate(&email, req.custom_context.as_deref())
        .await
        .or_internal("Failed to generate response")?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "aiResponse": reply,
            "emailSubject": email.subject,
            "customContext": req.custom_context,
        },
    })))
}

async fn capabilities(State(state): State<AppState>) -> ApiResult {
    let llm = state.responder.has_provider();
    Ok(Json(json!({
        "success": true,
        "data": {
            "sentimentAnalysis": true,
            "priorityDetection": true,
            "informationExtraction": true,
            "responseGeneration": true,
            "batchAnalysis": true,
            "summaryGeneration": llm,
            "llmConfigured": llm,
            "model": state.responder.model_id(),
            "features": {
                "urgentKeywordDetection": true,
                "productMentionExtraction": true,
                "phoneNumberExtraction": true,
                "emailAddressExtraction": true,
                "customerRequirementExtraction": true,
                "contextAwareResponses": llm,
                "multiLanguageSupport": false,
            },
        },
    })))
}
