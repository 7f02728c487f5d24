use crate::entities::{change, task, user};
use chrono::{DateTime, Utc};
use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

pub mod api;
pub mod web;

pub use web::{TaskState, create_task_router};

/// Longest description accepted, matching the `tasks.description` column.
pub const MAX_DESCRIPTION_LENGTH: usize = 300;

/// Lifecycle state of a task. Ids match the rows seeded into the `statuses` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Rejected,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Open,
        TaskStatus::InProgress,
        TaskStatus::Rejected,
        TaskStatus::Done,
    ];

    /// Returns the primary key of the matching `statuses` row.
    pub fn id(self) -> i32 {
        match self {
            TaskStatus::Open => 1,
            TaskStatus::InProgress => 2,
            TaskStatus::Rejected => 3,
            TaskStatus::Done => 4,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.id() == id)
    }

    /// Returns the display name, identical to the seeded `statuses.name`.
    pub fn name(self) -> &'static str {
        match self {
            TaskStatus::Open => "Открыта",
            TaskStatus::InProgress => "В работе",
            TaskStatus::Rejected => "Отклонена",
            TaskStatus::Done => "Выполнена",
        }
    }

    /// Whether the workflow allows moving a task from `self` to `next`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Open, TaskStatus::InProgress)
                | (TaskStatus::Open, TaskStatus::Rejected)
                | (TaskStatus::InProgress, TaskStatus::Rejected)
                | (TaskStatus::InProgress, TaskStatus::Done)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Task {
    id: u32,
    description: String,
    owner_id: Option<u32>,
    status: TaskStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    /// Returns the ID of the task.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the ID of the owning user, if the task has one.
    pub fn owner_id(&self) -> Option<u32> {
        self.owner_id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn created_at_display(&self) -> String {
        format_timestamp(self.created_at)
    }

    pub fn updated_at_display(&self) -> String {
        format_timestamp(self.updated_at)
    }
}

impl TryFrom<task::Model> for Task {
    type Error = TaskServiceError;

    fn try_from(model: task::Model) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_id(model.status_id)
            .ok_or(TaskServiceError::UnknownStatus(model.status_id))?;
        Ok(Task {
            id: model.id as u32,
            description: model.description,
            owner_id: model.owner_id.map(|id| id as u32),
            status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// A task joined with its owner's display name, as shown in task lists.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct TaskSummary {
    task: Task,
    owner_name: Option<String>,
}

impl TaskSummary {
    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn owner_name(&self) -> Option<&str> {
        self.owner_name.as_deref()
    }
}

impl std::ops::Deref for TaskSummary {
    type Target = Task;
    fn deref(&self) -> &Self::Target {
        &self.task
    }
}

/// One entry of a task's status history.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Change {
    id: u32,
    task_id: u32,
    status: TaskStatus,
    changed_at: DateTime<Utc>,
}

impl Change {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn task_id(&self) -> u32 {
        self.task_id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn changed_at(&self) -> DateTime<Utc> {
        self.changed_at
    }

    pub fn changed_at_display(&self) -> String {
        format_timestamp(self.changed_at)
    }
}

impl TryFrom<change::Model> for Change {
    type Error = TaskServiceError;

    fn try_from(model: change::Model) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_id(model.status_id)
            .ok_or(TaskServiceError::UnknownStatus(model.status_id))?;
        Ok(Change {
            id: model.id as u32,
            task_id: model.task_id as u32,
            status,
            changed_at: model.changed_at,
        })
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%d.%m.%Y %H:%M").to_string()
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    #[error("Task with ID {0} not found")]
    TaskNotFound(u32),
    #[error("Task {task_id} cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        task_id: u32,
        from: TaskStatus,
        to: TaskStatus,
    },
    #[error("Invalid task description: {0}")]
    InvalidDescription(String),
    #[error("User with ID {0} not found")]
    OwnerNotFound(u32),
    #[error("Unknown status ID {0}")]
    UnknownStatus(i32),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Creates tasks, moves them through the workflow and records every status change.
pub struct TaskService<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl TaskService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> TaskService<'_> {
        TaskService { db }
    }

    /// Creates a task in status `Open` together with its first history entry.
    ///
    /// # Arguments
    ///
    /// * `description` - What needs to be done; surrounding whitespace is trimmed.
    /// * `owner_id` - The user responsible for the task, if any.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `Task` if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn create_task(
        &self,
        description: &str,
        owner_id: Option<u32>,
    ) -> Result<Task, TaskServiceError> {
        let description = validate_description(description)?;

        let txn = self.db.begin().await?;

        if let Some(owner_id) = owner_id {
            user::Entity::find_by_id(owner_id as i32)
                .one(&txn)
                .await?
                .ok_or(TaskServiceError::OwnerNotFound(owner_id))?;
        }

        let now = Utc::now();
        let created_model = task::ActiveModel {
            description: ActiveValue::Set(description),
            owner_id: ActiveValue::Set(owner_id.map(|id| id as i32)),
            status_id: ActiveValue::Set(TaskStatus::Open.id()),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        record_change(&txn, created_model.id, TaskStatus::Open, now).await?;
        txn.commit().await?;

        tracing::info!("Created task {}", created_model.id);
        Task::try_from(created_model)
    }

    /// Moves a task to a new status and appends the matching history entry.
    /// Both writes happen in one transaction; a rejected transition writes nothing.
    ///
    /// # Arguments
    ///
    /// * `task_id` - The ID of the task to move.
    /// * `to` - The status to move the task to.
    ///
    /// # Returns
    ///
    /// The updated `Task`, `TaskNotFound` for an unknown ID, or `InvalidTransition` when the
    /// workflow does not allow the move.
    #[tracing::instrument(skip(self))]
    pub async fn transition(&self, task_id: u32, to: TaskStatus) -> Result<Task, TaskServiceError> {
        let txn = self.db.begin().await?;

        let model = task::Entity::find_by_id(task_id as i32)
            .one(&txn)
            .await?
            .ok_or(TaskServiceError::TaskNotFound(task_id))?;
        let from = TaskStatus::from_id(model.status_id)
            .ok_or(TaskServiceError::UnknownStatus(model.status_id))?;

        if !from.can_transition_to(to) {
            return Err(TaskServiceError::InvalidTransition { task_id, from, to });
        }

        // History stays ordered even when the wall clock steps back.
        let now = Utc::now().max(model.updated_at);
        let mut active_model: task::ActiveModel = model.into();
        active_model.status_id = ActiveValue::Set(to.id());
        active_model.updated_at = ActiveValue::Set(now);
        let updated_model = active_model.update(&txn).await?;

        record_change(&txn, updated_model.id, to, now).await?;
        txn.commit().await?;

        tracing::info!("Task {} moved from '{}' to '{}'", task_id, from, to);
        Task::try_from(updated_model)
    }

    /// Retrieves a task by its ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_task(&self, task_id: u32) -> Result<Task, TaskServiceError> {
        let model = task::Entity::find_by_id(task_id as i32)
            .one(self.db)
            .await?
            .ok_or(TaskServiceError::TaskNotFound(task_id))?;
        Task::try_from(model)
    }

    /// Retrieves the tasks currently in any of the given statuses, newest first,
    /// joined with their owner's name.
    #[tracing::instrument(skip(self))]
    pub async fn tasks_with_statuses(
        &self,
        statuses: &[TaskStatus],
    ) -> Result<Vec<TaskSummary>, TaskServiceError> {
        let status_ids: Vec<i32> = statuses.iter().map(|status| status.id()).collect();
        task::Entity::find()
            .filter(task::Column::StatusId.is_in(status_ids))
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .find_also_related(user::Entity)
            .all(self.db)
            .await?
            .into_iter()
            .map(|(task_model, owner)| -> Result<TaskSummary, TaskServiceError> {
                Ok(TaskSummary {
                    task: Task::try_from(task_model)?,
                    owner_name: owner.map(|owner| owner.full_name),
                })
            })
            .collect()
    }

    /// Retrieves the full status history of a task, oldest entry first.
    #[tracing::instrument(skip(self))]
    pub async fn history(&self, task_id: u32) -> Result<Vec<Change>, TaskServiceError> {
        let (_, changes) = self.task_with_history(task_id).await?;
        Ok(changes)
    }

    /// Retrieves a task together with its status history, oldest entry first.
    #[tracing::instrument(skip(self))]
    pub async fn task_with_history(
        &self,
        task_id: u32,
    ) -> Result<(Task, Vec<Change>), TaskServiceError> {
        let task = self.get_task(task_id).await?;
        let changes = change::Entity::find()
            .filter(change::Column::TaskId.eq(task_id as i32))
            .order_by_asc(change::Column::ChangedAt)
            .order_by_asc(change::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(Change::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((task, changes))
    }
}

fn validate_description(description: &str) -> Result<String, TaskServiceError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(TaskServiceError::InvalidDescription(
            "description must not be empty".to_string(),
        ));
    }
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(TaskServiceError::InvalidDescription(format!(
            "description must be at most {} characters",
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(description.to_string())
}

async fn record_change<C: ConnectionTrait>(
    db: &C,
    task_id: i32,
    status: TaskStatus,
    changed_at: DateTime<Utc>,
) -> Result<change::Model, DbErr> {
    change::ActiveModel {
        task_id: ActiveValue::Set(task_id),
        status_id: ActiveValue::Set(status.id()),
        changed_at: ActiveValue::Set(changed_at),
        ..Default::default()
    }
    .insert(db)
    .await
}
