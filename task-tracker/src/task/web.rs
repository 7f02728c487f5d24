use askama::Template;
use axum::{
    Form, Router,
    extract::{Extension, Path, State},
    response::{Html, Redirect},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::task::{Change, Task, TaskService, TaskStatus, TaskSummary};
use crate::user::{User, UserService};
use crate::web::WebError;

#[derive(Clone, Debug)]
pub struct TaskState {
    pub db: Arc<sea_orm::DatabaseConnection>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskForm {
    description: String,
    /// Owner ID as submitted by the select box; empty means no owner.
    #[serde(default)]
    user: String,
}

impl CreateTaskForm {
    fn owner_id(&self) -> Result<Option<u32>, WebError> {
        let raw = self.user.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse()
            .map(Some)
            .map_err(|_| WebError::InvalidInput(format!("'{}' is not a user ID", raw)))
    }
}

#[derive(Template)]
#[template(path = "tasks/open_tasks.html")]
struct OpenTasksTemplate {
    current_user: CurrentUser,
    tasks: Vec<TaskSummary>,
}

#[derive(Template)]
#[template(path = "tasks/works_tasks.html")]
struct WorksTasksTemplate {
    current_user: CurrentUser,
    tasks: Vec<TaskSummary>,
}

#[derive(Template)]
#[template(path = "tasks/arh_tasks.html")]
struct ArchiveTasksTemplate {
    current_user: CurrentUser,
    tasks: Vec<TaskSummary>,
}

#[derive(Template)]
#[template(path = "tasks/create_task.html")]
struct CreateTaskTemplate {
    current_user: CurrentUser,
    users: Vec<User>,
}

#[derive(Template)]
#[template(path = "tasks/history.html")]
struct TaskHistoryTemplate {
    current_user: CurrentUser,
    task: Task,
    changes: Vec<Change>,
}

/// Handler for GET /open_tasks listing tasks that nobody has started yet.
#[tracing::instrument(skip(state))]
async fn open_tasks_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Html<String>, WebError> {
    let tasks = TaskService::new(&state.db)
        .tasks_with_statuses(&[TaskStatus::Open])
        .await?;
    let template = OpenTasksTemplate {
        current_user,
        tasks,
    };
    Ok(Html(template.render()?))
}

/// Handler for GET /to-works listing tasks in progress.
#[tracing::instrument(skip(state))]
async fn works_tasks_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Html<String>, WebError> {
    let tasks = TaskService::new(&state.db)
        .tasks_with_statuses(&[TaskStatus::InProgress])
        .await?;
    let template = WorksTasksTemplate {
        current_user,
        tasks,
    };
    Ok(Html(template.render()?))
}

/// Handler for GET /arh-tasks listing finished and rejected tasks.
#[tracing::instrument(skip(state))]
async fn archive_tasks_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Html<String>, WebError> {
    let tasks = TaskService::new(&state.db)
        .tasks_with_statuses(&[TaskStatus::Rejected, TaskStatus::Done])
        .await?;
    let template = ArchiveTasksTemplate {
        current_user,
        tasks,
    };
    Ok(Html(template.render()?))
}

/// Handler for serving the create task form.
#[tracing::instrument(skip(state))]
async fn create_task_form_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Html<String>, WebError> {
    let users = UserService::new(&state.db).get_all_users().await?;
    let template = CreateTaskTemplate {
        current_user,
        users,
    };
    Ok(Html(template.render()?))
}

/// Handler for creating a new task via POST request.
#[tracing::instrument(skip(state))]
async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    Form(form): Form<CreateTaskForm>,
) -> Result<Redirect, WebError> {
    let owner_id = form.owner_id()?;
    TaskService::new(&state.db)
        .create_task(&form.description, owner_id)
        .await?;
    Ok(Redirect::to("/open_tasks"))
}

/// Moves a task and sends the browser back to the list the action was triggered from.
async fn transition_and_redirect(
    state: &TaskState,
    id: u32,
    to: TaskStatus,
    back_to: &'static str,
) -> Result<Redirect, WebError> {
    TaskService::new(&state.db).transition(id, to).await?;
    Ok(Redirect::to(back_to))
}

/// Handler for GET /task/{id}/to_work.
#[tracing::instrument(skip(state))]
async fn to_work_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<u32>,
) -> Result<Redirect, WebError> {
    transition_and_redirect(&state, id, TaskStatus::InProgress, "/open_tasks").await
}

/// Handler for GET /task/{id}/reject, used from the open task list.
#[tracing::instrument(skip(state))]
async fn reject_open_task_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<u32>,
) -> Result<Redirect, WebError> {
    transition_and_redirect(&state, id, TaskStatus::Rejected, "/open_tasks").await
}

/// Handler for GET /works/{id}/reject, used from the in-progress list.
#[tracing::instrument(skip(state))]
async fn reject_work_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<u32>,
) -> Result<Redirect, WebError> {
    transition_and_redirect(&state, id, TaskStatus::Rejected, "/to-works").await
}

/// Handler for GET /task/{id}/done.
#[tracing::instrument(skip(state))]
async fn done_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<u32>,
) -> Result<Redirect, WebError> {
    transition_and_redirect(&state, id, TaskStatus::Done, "/to-works").await
}

/// Handler for GET /task/{id}/history showing every status the task went through.
#[tracing::instrument(skip(state))]
async fn task_history_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<u32>,
) -> Result<Html<String>, WebError> {
    let (task, changes) = TaskService::new(&state.db).task_with_history(id).await?;
    let template = TaskHistoryTemplate {
        current_user,
        task,
        changes,
    };
    Ok(Html(template.render()?))
}

/// Creates and returns the task router with all task-related routes.
/// Every route expects the login middlewares to run first.
pub fn create_task_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/open_tasks", get(open_tasks_handler))
        .route("/to-works", get(works_tasks_handler))
        .route("/arh-tasks", get(archive_tasks_handler))
        .route(
            "/create-task",
            get(create_task_form_handler).post(create_task_handler),
        )
        .route("/task/{id}/to_work", get(to_work_handler))
        .route("/task/{id}/reject", get(reject_open_task_handler))
        .route("/task/{id}/done", get(done_handler))
        .route("/task/{id}/history", get(task_history_handler))
        .route("/works/{id}/reject", get(reject_work_handler))
        .with_state(state)
}
