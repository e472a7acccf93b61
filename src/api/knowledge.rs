//! `/api/knowledge-base` routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::{present, ApiError, ApiResult, AppState};
use crate::knowledge::{KnowledgeEntry, KnowledgePatch};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(search))
        .route("/categories", get(categories))
        .route("/category/:category", get(show))
        .route("/find-relevant", post(find_relevant))
        .route("/add", post(add))
        .route("/update/:category", put(update))
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    query: Option<String>,
}

async fn search(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> ApiResult {
    let query = present(q.query)
        .ok_or_else(|| ApiError::BadRequest("Query parameter is required".to_owned()))?;
    let hits = state.knowledge.search(&query);
    Ok(Json(json!({
        "success": true,
        "count": hits.len(),
        "query": query,
        "data": hits,
    })))
}

async fn categories(State(state): State<AppState>) -> ApiResult {
    let categories = state.knowledge.categories();
    Ok(Json(json!({ "success": true, "count": categories.len(), "data": categories })))
}

async fn show(State(state): State<AppState>, Path(category): Path<String>) -> ApiResult {
    let entry = state
        .knowledge
        .get(&category)
        .ok_or_else(|| ApiError::NotFound("Category not found".to_owned()))?;
    Ok(Json(json!({
        "success": true,
        "data": { "category": category, "knowledge": entry },
    })))
}

#[derive(Debug, Deserialize)]
struct RelevantBody {
    subject: Option<String>,
    body: Option<String>,
}

async fn find_relevant(
    State(state): State<AppState>,
    body: Result<Json<RelevantBody>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let (Some(subject), Some(text)) = (present(req.subject), present(req.body)) else {
        return Err(ApiError::BadRequest(
            "Subject and body are required".to_owned(),
        ));
    };
    let kb = &state.knowledge;
    Ok(Json(json!({
        "success": true,
        "data": {
            "relevantKnowledge": kb.find_relevant(&subject, &text),
            "context": kb.context_for(&subject, &text),
            "suggestedSolutions": kb.suggested_solutions(&subject, &text),
            "emailSubject": subject,
        },
    })))
}

#[derive(Debug, Deserialize)]
struct AddBody {
    category: Option<String>,
    keywords: Option<Vec<String>>,
    context: Option<String>,
    #[serde(default)]
    solutions: Vec<String>,
}

async fn add(
    State(state): State<AppState>,
    body: Result<Json<AddBody>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let (Some(category), Some(keywords), Some(context)) = (
        present(req.category),
        req.keywords.filter(|k| !k.is_empty()),
        present(req.context),
    ) else {
        return Err(ApiError::BadRequest(
            "category, keywords, and context are required".to_owned(),
        ));
    };
    let entry = KnowledgeEntry {
        keywords: keywords.iter().map(|k| k.trim().to_lowercase()).collect(),
        context,
        solutions: req.solutions,
    };
    state.knowledge.add(&category, entry.clone());
    Ok(Json(json!({
        "success": true,
        "message": format!("Knowledge added for category: {category}"),
        "data": { "category": category, "knowledge": entry },
    })))
}

async fn update(
    State(state): State<AppState>,
    Path(category): Path<String>,
    body: Result<Json<KnowledgePatch>, JsonRejection>,
) -> ApiResult {
    let Json(patch) = body?;
    if patch.keywords.is_none() && patch.context.is_none() && patch.solutions.is_none() {
        return Err(ApiError::BadRequest("Update data is required".to_owned()));
    }
    if !state.knowledge.update(&category, patch) {
        return Err(ApiError::NotFound("Category not found".to_owned()));
    }
    Ok(Json(json!({
        "success": true,
        "message": format!("Knowledge updated for category: {category}"),
        "data": { "category": category, "knowledge": state.knowledge.get(&category) },
    })))
}
