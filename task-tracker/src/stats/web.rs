use askama::Template;
use axum::{
    Router,
    extract::{Extension, State},
    response::Html,
    routing::get,
};
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::stats::{Statistics, StatisticsService};
use crate::task::TaskState;
use crate::web::WebError;

#[derive(Template)]
#[template(path = "stats/statistics.html")]
struct StatisticsTemplate {
    current_user: CurrentUser,
    statistics: Statistics,
}

/// Handler for GET /stat rendering task counts and the average resolution time.
#[tracing::instrument(skip(state))]
async fn statistics_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Html<String>, WebError> {
    let statistics = StatisticsService::new(&state.db).compute().await?;
    let template = StatisticsTemplate {
        current_user,
        statistics,
    };
    Ok(Html(template.render()?))
}

/// Creates and returns the statistics router.
pub fn create_statistics_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/stat", get(statistics_handler))
        .with_state(state)
}
