//! Router wiring and request helpers shared by the API tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use supportdesk::api::{self, AppState};
use supportdesk::config::{LlmConfig, QueueConfig};
use supportdesk::ingest::Ingestor;
use supportdesk::knowledge::KnowledgeBase;
use supportdesk::queue::PriorityQueue;
use supportdesk::responder::LlmResponder;
use supportdesk::sender::{MailSender, ResponseSender};
use supportdesk::store::{EmailStore, SqliteEmailStore};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub async fn app() -> TestApp {
    let store = Arc::new(
        SqliteEmailStore::in_memory()
            .await
            .expect("in-memory store should open"),
    );
    let email_store: Arc<dyn EmailStore> = store.clone();
    let knowledge = Arc::new(KnowledgeBase::new());
    let responder = Arc::new(LlmResponder::new(
        None,
        knowledge.clone(),
        &LlmConfig::default(),
    ));
    let sender: Arc<dyn ResponseSender> = Arc::new(
        MailSender::dry_run(email_store.clone(), "support@example.com")
            .expect("sender should build"),
    );
    let queue = Arc::new(PriorityQueue::new(
        email_store.clone(),
        responder.clone(),
        sender.clone(),
        QueueConfig::default(),
    ));
    let ingestor = Arc::new(Ingestor::new(email_store, queue.clone()));

    let state = AppState {
        store,
        queue,
        responder,
        sender,
        knowledge,
        ingestor,
    };
    TestApp {
        router: api::router(state.clone(), &[]),
        state,
    }
}

impl TestApp {
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(body)).await
    }

    /// Ingest the demo inbox and return the stored email ids.
    pub async fn seed(&self) -> Vec<String> {
        let (status, json) = self.post("/api/emails/fetch", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        json["data"]
            .as_array()
            .expect("fetch should return stored emails")
            .iter()
            .filter_map(|e| e["id"].as_str().map(str::to_owned))
            .collect()
    }
}
