use crate::entities::sea_orm_active_enums::{TaskPriority, TaskStatus};
use crate::entities::*;
use crate::timer::now;
use chrono::{DateTime, Utc};
use sea_orm::*;
use std::sync::Arc;

pub mod api;

/// A unit of work owned by one user.
#[derive(Debug, PartialEq, Clone)]
pub struct Task {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Estimated effort in minutes.
    pub estimated_time: Option<i32>,
    /// Minutes accumulated by stopped timers.
    pub actual_time: f64,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            title: model.title,
            description: model.description,
            status: model.status,
            priority: model.priority,
            estimated_time: model.estimated_time,
            actual_time: model.actual_time,
            due_date: model.due_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Fields accepted when creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub estimated_time: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update of a task. `None` leaves the field untouched.
///
/// `actual_time` is not patchable; only the timer writes it.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub estimated_time: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    #[error("Task with ID {0} not found")]
    TaskNotFound(i32),
    #[error("{0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

#[derive(Clone, Debug)]
pub struct TaskState {
    pub db: Arc<DatabaseConnection>,
}

pub struct TaskService<'a> {
    db: &'a DatabaseConnection,
}

impl TaskService<'_> {
    pub fn new(db: &DatabaseConnection) -> TaskService<'_> {
        TaskService { db }
    }

    /// Creates a pending task for `user_id`.
    #[tracing::instrument(skip(self))]
    pub async fn create_task(
        &self,
        user_id: i32,
        new_task: NewTask,
    ) -> Result<Task, TaskServiceError> {
        let title = validate_title(&new_task.title)?;
        validate_estimated_time(new_task.estimated_time)?;

        let created_at = now();
        let active_model = task::ActiveModel {
            user_id: ActiveValue::Set(user_id),
            title: ActiveValue::Set(title),
            description: ActiveValue::Set(new_task.description),
            status: ActiveValue::Set(TaskStatus::Pending),
            priority: ActiveValue::Set(new_task.priority.unwrap_or_default()),
            estimated_time: ActiveValue::Set(new_task.estimated_time),
            actual_time: ActiveValue::Set(0.0),
            due_date: ActiveValue::Set(new_task.due_date),
            created_at: ActiveValue::Set(created_at),
            updated_at: ActiveValue::Set(created_at),
            ..Default::default()
        };
        let created_model = active_model.insert(self.db).await?;
        Ok(Task::from(created_model))
    }

    /// Retrieves one of the user's tasks.
    #[tracing::instrument(skip(self))]
    pub async fn get_task(&self, id: i32, user_id: i32) -> Result<Task, TaskServiceError> {
        let model = self.find_owned(id, user_id).await?;
        Ok(Task::from(model))
    }

    /// Lists the user's tasks, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_tasks(&self, user_id: i32) -> Result<Vec<Task>, TaskServiceError> {
        let tasks = task::Entity::find()
            .filter(task::Column::UserId.eq(user_id))
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok(tasks)
    }

    /// Applies a partial update to one of the user's tasks.
    #[tracing::instrument(skip(self))]
    pub async fn update_task(
        &self,
        id: i32,
        user_id: i32,
        update: TaskUpdate,
    ) -> Result<Task, TaskServiceError> {
        let model = self.find_owned(id, user_id).await?;
        let mut active_model: task::ActiveModel = model.into();

        if let Some(title) = update.title {
            active_model.title = ActiveValue::Set(validate_title(&title)?);
        }
        if let Some(description) = update.description {
            active_model.description = ActiveValue::Set(Some(description));
        }
        if let Some(status) = update.status {
            active_model.status = ActiveValue::Set(status);
        }
        if let Some(priority) = update.priority {
            active_model.priority = ActiveValue::Set(priority);
        }
        if let Some(estimated_time) = update.estimated_time {
            validate_estimated_time(Some(estimated_time))?;
            active_model.estimated_time = ActiveValue::Set(Some(estimated_time));
        }
        if let Some(due_date) = update.due_date {
            active_model.due_date = ActiveValue::Set(Some(due_date));
        }
        active_model.updated_at = ActiveValue::Set(now());

        let updated_model = active_model.update(self.db).await?;
        Ok(Task::from(updated_model))
    }

    /// Deletes one of the user's tasks. Its time records go with it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&self, id: i32, user_id: i32) -> Result<Task, TaskServiceError> {
        let model = self.find_owned(id, user_id).await?;
        let task_copy = Task::from(model.clone());
        model.delete(self.db).await?;
        Ok(task_copy)
    }

    async fn find_owned(&self, id: i32, user_id: i32) -> Result<task::Model, TaskServiceError> {
        task::Entity::find_by_id(id)
            .filter(task::Column::UserId.eq(user_id))
            .one(self.db)
            .await?
            .ok_or(TaskServiceError::TaskNotFound(id))
    }
}

fn validate_title(title: &str) -> Result<String, TaskServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TaskServiceError::Validation("Title is required".to_string()));
    }
    Ok(title.to_string())
}

fn validate_estimated_time(estimated_time: Option<i32>) -> Result<(), TaskServiceError> {
    match estimated_time {
        Some(minutes) if minutes < 0 => Err(TaskServiceError::Validation(
            "Estimated time must not be negative".to_string(),
        )),
        _ => Ok(()),
    }
}
