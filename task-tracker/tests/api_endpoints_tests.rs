use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use sea_orm::ConnectionTrait;
use serde_json::Value;
use task_tracker::task::{TaskService, TaskStatus};

mod common;

use common::{TEST_PASSWORD, body_text, create_user, get, send, setup_app};

fn json_login(login: &str, password: &str) -> Request<Body> {
    let payload = serde_json::json!({ "login": login, "password": password });
    Request::builder()
        .method("POST")
        .uri("/api/v1/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn bearer_get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

async fn api_token(app: &axum::Router) -> String {
    let response = send(app, json_login("ivanov", TEST_PASSWORD)).await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn rejects_invalid_api_credentials() {
    let (app, db) = setup_app().await;
    create_user(&db, "ivanov", "Иван Иванов").await;

    let response = send(&app, json_login("ivanov", "wrong")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn requires_bearer_token() {
    let (app, _db) = setup_app().await;

    for uri in ["/api/v1/tasks", "/api/v1/statistics"] {
        let response = send(&app, get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(json_body(response).await["error"], "UNAUTHORIZED");

        let response = send(&app, bearer_get(uri, "not-a-token")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn can_list_tasks_with_status_filter() {
    let (app, db) = setup_app().await;
    let owner = create_user(&db, "ivanov", "Иван Иванов").await;
    let token = api_token(&app).await;
    let task_service = TaskService::new(&db);
    let open = task_service
        .create_task("Open task", Some(owner.id()))
        .await
        .unwrap();
    let working = task_service.create_task("Working task", None).await.unwrap();
    task_service
        .transition(working.id(), TaskStatus::InProgress)
        .await
        .unwrap();

    let body = json_body(send(&app, bearer_get("/api/v1/tasks", &token)).await).await;
    assert_eq!(body["count"], 2);

    let response = send(&app, bearer_get("/api/v1/tasks?status=open", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["count"], 1);
    let task = &body["tasks"][0];
    assert_eq!(task["id"], open.id());
    assert_eq!(task["description"], "Open task");
    assert_eq!(task["owner_id"], owner.id());
    assert_eq!(task["owner_name"], "Иван Иванов");
    assert_eq!(task["status"], "open");

    let body = json_body(send(&app, bearer_get("/api/v1/tasks?status=in_progress", &token)).await).await;
    assert_eq!(body["tasks"][0]["id"], working.id());
    assert_eq!(body["tasks"][0]["owner_id"], Value::Null);
}

#[tokio::test]
async fn rejects_unknown_status_filter() {
    let (app, db) = setup_app().await;
    create_user(&db, "ivanov", "Иван Иванов").await;
    let token = api_token(&app).await;

    let response = send(&app, bearer_get("/api/v1/tasks?status=archived", &token)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn can_get_statistics() {
    let (app, db) = setup_app().await;
    create_user(&db, "ivanov", "Иван Иванов").await;
    let token = api_token(&app).await;
    TaskService::new(&db)
        .create_task("Counted", None)
        .await
        .unwrap();

    let response = send(&app, bearer_get("/api/v1/statistics", &token)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["counts"].as_array().unwrap().len(), 4);
    assert_eq!(body["counts"][0]["name"], "Открыта");
    assert_eq!(body["counts"][0]["count"], 1);
    assert_eq!(body["average_resolution_seconds"], 0);
    assert_eq!(body["average_resolution"], "0 сек.");
}

#[tokio::test]
async fn serves_openapi_document() {
    let (app, _db) = setup_app().await;

    let response = send(&app, get("/api-docs/openapi.json", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["paths"]["/api/v1/tasks"].is_object());
    assert!(body["paths"]["/api/v1/statistics"].is_object());
    assert!(body["paths"]["/api/v1/login"].is_object());
}

#[tokio::test]
async fn store_failure_during_token_lookup_is_server_error() {
    let (app, db) = setup_app().await;
    create_user(&db, "ivanov", "Иван Иванов").await;
    let token = api_token(&app).await;
    db.execute_unprepared("DROP TABLE users").await.unwrap();

    let response = send(&app, bearer_get("/api/v1/tasks", &token)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "INTERNAL_ERROR");
}
