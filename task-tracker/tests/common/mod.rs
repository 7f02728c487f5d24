#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response, header};
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use task_tracker::config::Config;
use task_tracker::user::{User, UserService};
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "correct horse";

/// Opens a fresh in-memory database with every migration applied.
/// A single pooled connection keeps the whole test on the same in-memory database.
pub async fn setup_db() -> anyhow::Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn test_config() -> Config {
    Config {
        db_url: "sqlite::memory:".to_string(),
        port: 8080,
        jwt_secret: "test_secret".to_string(),
        admin_login: None,
        admin_password: None,
        admin_full_name: "Администратор".to_string(),
    }
}

pub async fn create_user(db: &DatabaseConnection, login: &str, full_name: &str) -> User {
    UserService::new(db)
        .create_user(login, full_name, TEST_PASSWORD)
        .await
        .unwrap()
}

/// Builds the full application on top of a fresh database.
pub async fn setup_app() -> (axum::Router, Arc<DatabaseConnection>) {
    let db = Arc::new(setup_db().await.unwrap());
    let app = task_tracker::web::build_router(&test_config(), db.clone());
    (app, db)
}

pub async fn send(app: &axum::Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Returns the `name=value` pair of the named cookie set by the response.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{}=", name)))
        .map(|value| value.split(';').next().unwrap_or_default().to_string())
}

/// Logs in through the login form and returns the session cookie pair.
pub async fn login(app: &axum::Router, login: &str) -> String {
    let body = format!("login={}&password=correct+horse", login);
    let response = send(app, post_form("/auth", &body, None)).await;
    set_cookie(&response, "auth_token").expect("login should set the session cookie")
}
