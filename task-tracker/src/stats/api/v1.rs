use crate::stats::{Statistics, StatisticsService, StatusCount};
use crate::task::TaskState;
use crate::web::api::ErrorResponse;
use axum::{Router, extract::State, http::StatusCode, response::Json, routing::get};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Number of tasks in one status.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusCountJson {
    pub status_id: u32,
    /// Status name as stored in the lookup table
    pub name: String,
    pub count: u64,
}

impl From<&StatusCount> for StatusCountJson {
    fn from(count: &StatusCount) -> Self {
        Self {
            status_id: count.status_id(),
            name: count.name().to_string(),
            count: count.count(),
        }
    }
}

/// API response for the task statistics.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatisticsResponse {
    /// Task counts per status, ordered by status ID
    pub counts: Vec<StatusCountJson>,
    /// Total number of tasks
    pub total: u64,
    /// Average resolution time of done tasks in seconds
    pub average_resolution_seconds: u64,
    /// Average resolution time rendered for humans
    pub average_resolution: String,
}

impl From<Statistics> for StatisticsResponse {
    fn from(statistics: Statistics) -> Self {
        let average = statistics.average_resolution();
        Self {
            counts: statistics
                .counts()
                .iter()
                .map(StatusCountJson::from)
                .collect(),
            total: statistics.total_tasks(),
            average_resolution_seconds: average.total_seconds(),
            average_resolution: average.to_string(),
        }
    }
}

/// Handler for GET /api/v1/statistics - Returns the task statistics in JSON format.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/v1/statistics",
    responses(
        (status = 200, description = "Successfully computed statistics", body = StatisticsResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Statistics"
)]
pub async fn get_statistics_handler(
    State(state): State<Arc<TaskState>>,
) -> Result<Json<StatisticsResponse>, (StatusCode, Json<ErrorResponse>)> {
    match StatisticsService::new(&state.db).compute().await {
        Ok(statistics) => Ok(Json(StatisticsResponse::from(statistics))),
        Err(err) => {
            tracing::error!("Failed to compute statistics: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    "INTERNAL_ERROR",
                    "Failed to compute statistics",
                )),
            ))
        }
    }
}

/// Creates and returns the statistics API router.
pub fn create_api_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/statistics", get(get_statistics_handler))
        .with_state(state)
}
