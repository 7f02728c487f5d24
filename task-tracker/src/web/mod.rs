use askama::Template;
use axum::Router;
use axum::http::{StatusCode, header};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{Html, IntoResponse, Response};
use migration::MigratorTrait;
use sea_orm::Database;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{
    AuthState, FilteredMakeSpan, auth_user_middleware, create_login_router, logout_handler,
    login_redirect_middleware,
};
use crate::config::Config;
use crate::stats::StatisticsError;
use crate::stats::web::create_statistics_router;
use crate::task::{TaskServiceError, TaskState, create_task_router};
use crate::user::{UserService, UserServiceError};

pub mod api;

const GENERIC_ERROR_MESSAGE: &str =
    "An unexpected error occurred while processing your request. Please try again later.";

/// Custom error type for web handler operations.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Represents an error during template rendering.
    /// The specific `askama::Error` is captured as the source of this error.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    #[error(transparent)]
    Task(#[from] TaskServiceError),
    #[error(transparent)]
    User(#[from] UserServiceError),
    #[error(transparent)]
    Statistics(#[from] StatisticsError),
    /// Submitted form data that cannot be interpreted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl WebError {
    fn status_code(&self) -> StatusCode {
        match self {
            WebError::Task(TaskServiceError::TaskNotFound(_)) => StatusCode::NOT_FOUND,
            WebError::Task(TaskServiceError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            WebError::Task(TaskServiceError::InvalidDescription(_))
            | WebError::Task(TaskServiceError::OwnerNotFound(_))
            | WebError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WebError::User(UserServiceError::UserNotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!("Request failed: {:?}", self);
            error_page(status_code, GENERIC_ERROR_MESSAGE)
        } else {
            tracing::warn!("Request rejected: {}", self);
            error_page(status_code, &self.to_string())
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate<'a> {
    status_code: u16,
    message: &'a str,
}

/// Renders the error page with the given status. Falls back to bare HTML when the
/// template itself cannot be rendered.
pub fn error_page(status_code: StatusCode, message: &str) -> Response {
    let template = ErrorTemplate {
        status_code: status_code.as_u16(),
        message,
    };
    match template.render() {
        Ok(html) => (status_code, Html(html)).into_response(),
        Err(err) => {
            tracing::error!("Failed to render error page: {}", err);
            (
                status_code,
                Html(format!("<h1>{}</h1><p>{}</p>", status_code, message)),
            )
                .into_response()
        }
    }
}

/// Assembles every route of the application on top of an already migrated database.
pub fn build_router(config: &Config, db: Arc<sea_orm::DatabaseConnection>) -> Router {
    let auth_state = Arc::new(AuthState::from_config(config, db.clone()));
    let task_state = Arc::new(TaskState { db });

    let protected_routes = Router::new()
        .merge(create_task_router(task_state.clone()))
        .merge(create_statistics_router(task_state.clone()))
        .route("/logout", axum::routing::get(logout_handler))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(auth_state.clone(), auth_user_middleware))
                .layer(from_fn(login_redirect_middleware)),
        );

    let public_routes = Router::new()
        .route("/health", axum::routing::get(health_check_handler))
        .merge(create_login_router(auth_state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(auth_state.clone(), auth_user_middleware)),
        );

    let api_routes = api::create_api_router(auth_state, task_state);

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .merge(api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetSensitiveHeadersLayer::new([
                    header::AUTHORIZATION,
                    header::COOKIE,
                    header::SET_COOKIE,
                ]))
                .layer(TraceLayer::new_for_http().make_span_with(FilteredMakeSpan)),
        )
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let db = Database::connect(&config.db_url).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    if let Some((login, password)) = config.admin_credentials() {
        UserService::new(&db)
            .ensure_user(login, &config.admin_full_name, password)
            .await?;
    } else {
        tracing::warn!("No admin account configured; only existing users can log in");
    }

    let db = Arc::new(db);
    let app = build_router(&config, db.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Web server stopped, closing database connection");
    match Arc::try_unwrap(db) {
        Ok(db) => db.close().await?,
        Err(_) => tracing::warn!("Database connection still shared at shutdown"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
    }
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}
