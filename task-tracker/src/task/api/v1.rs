use crate::task::web::TaskState;
use crate::task::{TaskService, TaskStatus, TaskSummary};
use crate::web::api::ErrorResponse;
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// JSON representation of a Task for API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskJson {
    /// Unique identifier of the task
    pub id: u32,
    /// What needs to be done
    pub description: String,
    /// ID of the owning user
    pub owner_id: Option<u32>,
    /// Display name of the owning user
    pub owner_name: Option<String>,
    /// Current workflow status
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskSummary> for TaskJson {
    fn from(summary: TaskSummary) -> Self {
        Self {
            id: summary.id(),
            description: summary.description().to_string(),
            owner_id: summary.owner_id(),
            owner_name: summary.owner_name().map(str::to_string),
            status: summary.status(),
            created_at: summary.created_at(),
            updated_at: summary.updated_at(),
        }
    }
}

/// API response for listing tasks.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TasksResponse {
    /// List of tasks, newest first
    pub tasks: Vec<TaskJson>,
    /// Total number of tasks
    pub count: usize,
}

/// Query parameters for filtering tasks by status.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TasksQuery {
    /// Optional status to filter tasks by
    #[serde(default)]
    status: Option<TaskStatus>,
}

/// Handler for GET /api/v1/tasks - Returns tasks in JSON format.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    params(
        ("status" = Option<TaskStatus>, Query, description = "Optional status to filter tasks by")
    ),
    responses(
        (status = 200, description = "Successfully retrieved tasks", body = TasksResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_tasks_handler(
    State(state): State<Arc<TaskState>>,
    Query(query): Query<TasksQuery>,
) -> Result<Json<TasksResponse>, (StatusCode, Json<ErrorResponse>)> {
    let statuses = match query.status {
        Some(status) => vec![status],
        None => TaskStatus::ALL.to_vec(),
    };

    match TaskService::new(&state.db)
        .tasks_with_statuses(&statuses)
        .await
    {
        Ok(tasks) => {
            let tasks: Vec<TaskJson> = tasks.into_iter().map(TaskJson::from).collect();
            let count = tasks.len();
            Ok(Json(TasksResponse { tasks, count }))
        }
        Err(err) => {
            tracing::error!("Failed to get tasks: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    "INTERNAL_ERROR",
                    "Failed to retrieve tasks",
                )),
            ))
        }
    }
}

/// Creates and returns the tasks API router.
pub fn create_api_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/tasks", get(get_tasks_handler))
        .with_state(state)
}
