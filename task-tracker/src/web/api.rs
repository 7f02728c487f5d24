use std::sync::Arc;

use crate::{
    auth::{self, AuthState},
    stats, task,
    task::TaskState,
};

use axum::{
    Json, Router,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use utoipa::{OpenApi, ToSchema};

/// Error body shared by every JSON endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine readable error code
    pub error: String,
    /// Human readable description
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::api::v1::json_login_handler,
        task::api::v1::get_tasks_handler,
        stats::api::v1::get_statistics_handler,
    ),
    components(schemas(
        ErrorResponse,
        auth::api::v1::JsonLoginRequest,
        auth::api::v1::LoginResponse,
        task::TaskStatus,
        task::api::v1::TaskJson,
        task::api::v1::TasksResponse,
        stats::api::v1::StatusCountJson,
        stats::api::v1::StatisticsResponse,
    )),
    tags(
        (name = "Auth", description = "Bearer token issuance"),
        (name = "Tasks", description = "Task listing"),
        (name = "Statistics", description = "Task counts and resolution time")
    )
)]
pub struct ApiDoc;

async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Creates the API routes for JSON API endpoints.
pub fn create_api_router(auth_state: Arc<AuthState>, task_state: Arc<TaskState>) -> Router {
    let login_router = auth::api::v1::create_api_router(auth_state.clone());
    let protected_routes = Router::new()
        .merge(task::api::v1::create_api_router(task_state.clone()))
        .merge(stats::api::v1::create_api_router(task_state))
        .layer(ServiceBuilder::new().layer(from_fn(auth::api::v1::require_auth_middleware)));
    let api_routes = login_router.merge(protected_routes);
    Router::new()
        .nest("/api/v1", api_routes)
        .layer(ServiceBuilder::new().layer(from_fn_with_state(
            auth_state,
            auth::api::v1::auth_user_middleware,
        )))
        .route("/api-docs/openapi.json", get(openapi_handler))
}
