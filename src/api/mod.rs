//! REST surface.
//!
//! Every handler answers with the JSON envelope
//! `{ "success": bool, "data": ..., "error"?: string, "message"?: string }`.
//! Validation failures are 400, missing emails 404, everything else 500.

mod ai;
mod emails;
mod knowledge;
mod queue;
mod stats;

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::ingest::Ingestor;
use crate::knowledge::KnowledgeBase;
use crate::queue::{PriorityQueue, QueueError};
use crate::responder::LlmResponder;
use crate::sender::{ResponseSender, SendError};
use crate::store::SqliteEmailStore;

/// Shared handles every handler can reach.
#[derive(Clone)]
pub struct AppState {
    /// Email repository and statistics.
    pub store: Arc<SqliteEmailStore>,
    /// Processing queue.
    pub queue: Arc<PriorityQueue>,
    /// Reply drafting and batch insights.
    pub responder: Arc<LlmResponder>,
    /// Reply delivery.
    pub sender: Arc<dyn ResponseSender>,
    /// Knowledge base.
    pub knowledge: Arc<KnowledgeBase>,
    /// Intake pipeline for `POST /api/emails/fetch`.
    pub ingestor: Arc<Ingestor>,
}

/// Build the application router.
///
/// `cors_origins` lists the browser origins allowed to call the API; an
/// empty list allows any origin.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .nest("/api/emails", emails::routes())
        .nest("/api/ai", ai::routes())
        .nest("/api/stats", stats::routes())
        .nest("/api/knowledge-base", knowledge::routes())
        .nest("/api/email-sender", queue::routes())
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if parsed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(parsed))
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now(),
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_owned())
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Handler error rendered as an error envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or incomplete request. 400.
    #[error("{0}")]
    BadRequest(String),

    /// The addressed resource does not exist. 404.
    #[error("{0}")]
    NotFound(String),

    /// Anything else. 500, with the operation in `error` and the cause in `message`.
    #[error("{what}: {cause}")]
    Internal {
        /// What the handler was doing.
        what: &'static str,
        /// Underlying error text.
        cause: String,
    },
}

impl ApiError {
    fn email_not_found() -> Self {
        Self::NotFound("Email not found".to_owned())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(error) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": error }),
            ),
            Self::NotFound(error) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": error }),
            ),
            Self::Internal { what, cause } => {
                tracing::error!(error = %cause, "{what}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": what, "message": cause }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(_) => Self::email_not_found(),
            other => Self::Internal {
                what: "Queue operation failed",
                cause: other.to_string(),
            },
        }
    }
}

impl From<SendError> for ApiError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::NotFound(_) => Self::email_not_found(),
            other => Self::Internal {
                what: "Failed to send email response",
                cause: other.to_string(),
            },
        }
    }
}

/// Attach the failing operation to any displayable error.
trait OrInternal<T> {
    fn or_internal(self, what: &'static str) -> Result<T, ApiError>;
}

impl<T, E: Display> OrInternal<T> for Result<T, E> {
    fn or_internal(self, what: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::Internal {
            what,
            cause: e.to_string(),
        })
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

/// A required string field, or `None` when it is absent or blank.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
