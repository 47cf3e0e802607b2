use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use calc_compute::Dispatcher;
use calc_core::config::OperationTimings;
use calc_core::{AgentTask, Operation, TaskEnvelope};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::router::build_router;
use crate::state::AppState;

fn app() -> Router {
    let dispatcher = Arc::new(Dispatcher::new(16, OperationTimings::uniform(5)));
    build_router(Arc::new(AppState::new(dispatcher)), "*")
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(b) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(b.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn submit(app: &Router, expression: &str) -> String {
    let body = json!({ "expression": expression }).to_string();
    let (status, value) = send(app, Method::POST, "/api/v1/calculate", Some(&body)).await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    value["id"].as_str().unwrap().to_string()
}

/// Act as an agent: pull one task, compute it, post the result.
async fn work_one(app: &Router) -> AgentTask {
    let (status, envelope) = send(app, Method::GET, "/internal/task", None).await;
    assert_eq!(status, StatusCode::OK, "{envelope}");
    let TaskEnvelope { task } = serde_json::from_value(envelope).unwrap();
    let body = serde_json::to_string(&task.result(task.evaluate())).unwrap();
    let (status, reply) = send(app, Method::POST, "/internal/task", Some(&body)).await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    task
}

#[tokio::test]
async fn full_round_trip_through_http() {
    let app = app();
    let id = submit(&app, "2+2*2").await;

    let (status, detail) = send(&app, Method::GET, &format!("/api/v1/expressions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["expression"]["status"], "pending");
    assert_eq!(detail["expression"]["result"], Value::Null);

    let first = work_one(&app).await;
    assert_eq!(first.operation, Operation::Multiply);
    assert_eq!(first.operation_time, 5);
    let second = work_one(&app).await;
    assert_eq!(second.operation, Operation::Add);
    assert_eq!((second.arg1, second.arg2), (2.0, 4.0));

    let (_, detail) = send(&app, Method::GET, &format!("/api/v1/expressions/{id}"), None).await;
    assert_eq!(detail["expression"]["status"], "completed");
    assert_eq!(detail["expression"]["result"], 6.0);
    assert_eq!(detail["expression"]["expression"], "2+2*2");
}

#[tokio::test]
async fn division_by_zero_completes_over_http() {
    let app = app();
    let id = submit(&app, "1/0+1").await;

    let division = work_one(&app).await;
    assert_eq!(division.operation, Operation::Divide);
    let (_, envelope) = send(&app, Method::GET, "/internal/task", None).await;
    assert_eq!(envelope["task"]["arg1"], "inf");
    assert_eq!(envelope["task"]["arg2"], 1.0);

    let body = json!({ "id": envelope["task"]["id"], "result": "inf" }).to_string();
    let (status, reply) = send(&app, Method::POST, "/internal/task", Some(&body)).await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    assert_eq!(reply["expression_completed"], true);

    let (_, detail) = send(&app, Method::GET, &format!("/api/v1/expressions/{id}"), None).await;
    assert_eq!(detail["expression"]["status"], "completed");
    assert_eq!(detail["expression"]["result"], "inf");

    submit(&app, "0/0").await;
    work_one(&app).await;
    let (_, body) = send(&app, Method::GET, "/api/v1/expressions", None).await;
    let results: Vec<&Value> = body["expressions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| &e["result"])
        .collect();
    assert!(results.contains(&&json!("NaN")), "{body}");
}

#[tokio::test]
async fn list_returns_every_expression() {
    let app = app();
    let a = submit(&app, "1+1").await;
    let b = submit(&app, "7").await;

    let (status, body) = send(&app, Method::GET, "/api/v1/expressions", None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body["expressions"].as_array().unwrap();
    assert_eq!(listed.len(), 2);
    let ids: Vec<&str> = listed.iter().filter_map(|e| e["id"].as_str()).collect();
    assert!(ids.contains(&a.as_str()) && ids.contains(&b.as_str()));
    let literal = listed.iter().find(|e| e["id"] == b.as_str()).unwrap();
    assert_eq!(literal["status"], "completed");
    assert_eq!(literal["result"], 7.0);
}

#[tokio::test]
async fn calculate_rejects_bad_input() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/api/v1/calculate", Some("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, Method::POST, "/api/v1/calculate", Some(r#"{"expr":"1+1"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        send(&app, Method::POST, "/api/v1/calculate", Some(r#"{"expression":"2+"}"#)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("invalid expression"));

    let (status, _) =
        send(&app, Method::POST, "/api/v1/calculate", Some(r#"{"expression":"2^3"}"#)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_expression_is_404() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/expressions/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn empty_queue_is_404() {
    let app = app();
    let (status, _) = send(&app, Method::GET, "/internal/task", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn task_results_are_validated() {
    let app = app();

    let (status, _) = send(&app, Method::POST, "/internal/task", Some(r#"{"id":"nope","result":1}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::POST, "/internal/task", Some(r#"{"id":"x"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    submit(&app, "3-1").await;
    let task = work_one(&app).await;
    let body = json!({ "id": task.id, "result": 100.0 }).to_string();
    let (status, body) = send(&app, Method::POST, "/internal/task", Some(&body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn health_and_metrics() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    submit(&app, "1*2+3*4").await;
    let (status, body) = send(&app, Method::GET, "/scheduler/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expressions_submitted"], 1);
    assert_eq!(body["queue_depth"], 2);
    assert_eq!(body["queue_capacity"], 16);
    assert_eq!(body["permits_available"], 13);
}

#[test]
fn openapi_documents_the_agent_protocol() {
    use utoipa::OpenApi;

    let doc = crate::api::doc::ApiDoc::openapi();
    let item = doc.paths.paths.get("/internal/task").unwrap();
    assert!(item.get.is_some());
    let post = item.post.as_ref().unwrap();
    assert!(post.request_body.is_some());
    assert!(doc.paths.paths.contains_key("/api/v1/calculate"));
}
