//! `/api/email-sender` endpoints: manual sends and queue control.

use axum::http::StatusCode;
use serde_json::json;

use super::support::app;

#[tokio::test]
async fn send_response_requires_id_and_text() {
    let app = app().await;

    let (status, json) = app
        .post("/api/email-sender/send-response", json!({ "emailId": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "emailId and responseText are required");

    let (status, _) = app
        .post(
            "/api/email-sender/send-response",
            json!({ "emailId": "  ", "responseText": "Hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn send_response_to_unknown_email_is_404() {
    let app = app().await;
    let (status, json) = app
        .post(
            "/api/email-sender/send-response",
            json!({ "emailId": "missing", "responseText": "Hi" }),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Email not found");
}

#[tokio::test]
async fn send_response_marks_email_responded() {
    let app = app().await;
    let ids = app.seed().await;

    let (status, json) = app
        .post(
            "/api/email-sender/send-response",
            json!({
                "emailId": ids[0],
                "responseText": "We are on it.",
                "customSubject": "Re: your ticket",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Email response sent successfully");
    assert_eq!(json["data"]["success"], true);

    let (_, shown) = app.get(&format!("/api/emails/{}", ids[0])).await;
    assert_eq!(shown["data"]["status"], "responded");
    assert_eq!(shown["data"]["sentResponse"]["responseText"], "We are on it.");
}

#[tokio::test]
async fn queue_status_and_items_reflect_ingest() {
    let app = app().await;
    app.seed().await;

    let (status, json) = app.get("/api/email-sender/queue-status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["totalItems"], 5);
    assert_eq!(json["data"]["urgentItems"], 3);
    assert_eq!(json["data"]["statusBreakdown"]["queued"], 5);
    assert_eq!(json["data"]["isProcessing"], false);

    let (_, items) = app.get("/api/email-sender/queue-items?limit=2").await;
    assert_eq!(items["count"], 2);
    assert_eq!(items["data"][0]["priority"], "urgent");

    let (_, fallback) = app.get("/api/email-sender/queue-items?limit=zero").await;
    assert_eq!(fallback["count"], 5);
}

#[tokio::test]
async fn process_urgent_reports_count() {
    let app = app().await;
    app.seed().await;

    let (status, json) = app.post("/api/email-sender/process-urgent", json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Processed 3 urgent emails");
    assert_eq!(json["data"]["processed"], 3);

    let (_, again) = app.post("/api/email-sender/process-urgent", json!({})).await;
    assert_eq!(again["message"], "Processed 0 urgent emails");
}

#[tokio::test]
async fn force_process_validates_and_runs() {
    let app = app().await;
    let ids = app.seed().await;

    let (status, json) = app.post("/api/email-sender/force-process", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "emailId is required");

    let (status, _) = app
        .post("/api/email-sender/force-process", json!({ "emailId": "missing" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = app
        .post("/api/email-sender/force-process", json!({ "emailId": ids[0] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Email processed successfully");
}

#[tokio::test]
async fn clear_completed_keeps_queued_items() {
    let app = app().await;
    app.seed().await;

    let (status, json) = app.post("/api/email-sender/clear-completed", json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["removed"], 0);
    assert_eq!(app.state.queue.live_items().await.len(), 5);
}
