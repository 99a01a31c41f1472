//! HTTP routes driven through `tower::ServiceExt::oneshot`.

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{app_state, ScriptedLlm, PARIS_ANSWER, PARIS_GRAPH};
use cortex_server::create_server;

fn app() -> Router {
    create_server(app_state(Arc::new(ScriptedLlm::new([PARIS_GRAPH, PARIS_ANSWER]))))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn ingest_paris(app: &Router, brain: &str) {
    let (status, _) = send(
        app,
        Method::POST,
        "/ingest",
        Some(json!({
            "text": "Paris is the capital of France.",
            "source_id": "doc-1",
            "brain_id": brain,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_secs"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn test_empty_fields_are_unprocessable() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/ingest",
        Some(json!({"text": "", "source_id": "doc-1", "brain_id": "b1"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["message"].as_str().unwrap().contains("text"));

    let (status, _) = send(
        &app,
        Method::POST,
        "/answer",
        Some(json!({"question": "Where?", "brain_id": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_ingest_reports_extracted_graph() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/ingest",
        Some(json!({
            "text": "Paris is the capital of France.",
            "source_id": "doc-1",
            "brain_id": "b1",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chunks"], 1);
    assert_eq!(body["entities"].as_array().unwrap().len(), 2);
    assert_eq!(body["relations"][0]["relation"], "capital of");
}

#[tokio::test]
async fn test_graph_export_shape() {
    let app = app();
    ingest_paris(&app, "b1").await;

    let (status, body) = send(&app, Method::GET, "/brains/b1/graph", None).await;
    assert_eq!(status, StatusCode::OK);

    let nodes = body["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 2);
    let paris = nodes.iter().find(|n| n["name"] == "Paris").unwrap();
    assert_eq!(paris["id"], "City-Paris");
    assert_eq!(paris["group"], "City");
    assert_eq!(
        body["links"],
        json!([{"source": "City-Paris", "target": "Country-France", "label": "capital of"}])
    );
}

#[tokio::test]
async fn test_answer_route() {
    let app = app();
    ingest_paris(&app, "b1").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/answer",
        Some(json!({"question": "What is Paris the capital of?", "brain_id": "b1"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "answered");
    assert_eq!(body["referenced_nodes"], json!(["Paris", "France"]));
}

#[tokio::test]
async fn test_forget_source_and_delete_brain() {
    let app = app();
    ingest_paris(&app, "b1").await;
    ingest_paris(&app, "b2").await;

    let (status, body) = send(&app, Method::DELETE, "/brains/b1/sources/doc-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vectors_removed"], true);
    assert_eq!(body["graph"]["entities_removed"].as_array().unwrap().len(), 2);

    let (_, graph) = send(&app, Method::GET, "/brains/b1/graph", None).await;
    assert!(graph["nodes"].as_array().unwrap().is_empty());

    let (status, body) = send(&app, Method::DELETE, "/brains/b2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (_, graph) = send(&app, Method::GET, "/brains/b2/graph", None).await;
    assert!(graph["links"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_returns_matching_sources() {
    let app = app();
    ingest_paris(&app, "b1").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/brains/b1/search",
        Some(json!({"query": "Paris"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source_ids"], json!(["doc-1"]));

    let (status, body) = send(
        &app,
        Method::POST,
        "/brains/unknown/search",
        Some(json!({"query": "Paris"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app, Method::POST, "/brains/b1/search", Some(json!({"query": ""}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
