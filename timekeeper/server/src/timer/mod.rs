//! Timer state machine for time records.
//!
//! A task's timer moves Idle -> Running -> Paused -> Running -> ... -> Closed. Every
//! running interval is one `time_records` row with `is_active = true`. Pausing or
//! stopping closes that row for good; resuming always opens a new row.
//!
//! Each operation runs in a single store transaction whose first statement is a
//! write on the row it guards (the task for start and resume, the record for
//! pause and stop), so concurrent requests on the same row are serialized.
//! Closing is guarded by `is_active = true`, a unique index allows one active
//! record per task, and stopping adds the duration with an in-place
//! `actual_time = actual_time + ?`.

use crate::entities::sea_orm_active_enums::TaskStatus;
use crate::entities::*;
use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use std::sync::Arc;

pub mod api;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Current time truncated to milliseconds.
///
/// Stored timestamps keep exactly this precision, so a duration computed here is
/// reproducible from the persisted `start_time` and `end_time`.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Minutes elapsed between two instants, fractional and unrounded.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / MILLIS_PER_MINUTE
}

/// One contiguous interval during which a timer ran against a task.
#[derive(Debug, PartialEq, Clone)]
pub struct TimeRecord {
    pub id: i32,
    pub task_id: i32,
    pub user_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Minutes between `start_time` and `end_time`; `None` while active.
    pub duration: Option<f64>,
    pub is_active: bool,
}

impl From<time_record::Model> for TimeRecord {
    fn from(model: time_record::Model) -> Self {
        Self {
            id: model.id,
            task_id: model.task_id,
            user_id: model.user_id,
            start_time: model.start_time,
            end_time: model.end_time,
            duration: model.duration,
            is_active: model.is_active,
        }
    }
}

/// Error type for TimerService operations.
#[derive(Debug, thiserror::Error)]
pub enum TimerServiceError {
    #[error("Task with ID {0} not found")]
    TaskNotFound(i32),
    #[error("Active time record with ID {0} not found")]
    ActiveRecordNotFound(i32),
    #[error("Time record with ID {0} not found")]
    RecordNotFound(i32),
    #[error("Task with ID {0} already has a running timer")]
    TimerAlreadyRunning(i32),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl From<TransactionError<TimerServiceError>> for TimerServiceError {
    fn from(err: TransactionError<TimerServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => TimerServiceError::Database(db_err),
            TransactionError::Transaction(err) => err,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TimerState {
    pub db: Arc<DatabaseConnection>,
}

pub struct TimerService<'a> {
    db: &'a DatabaseConnection,
}

impl TimerService<'_> {
    pub fn new(db: &DatabaseConnection) -> TimerService<'_> {
        TimerService { db }
    }

    /// Starts a timer on one of the user's tasks and marks the task in progress.
    ///
    /// # Returns
    ///
    /// The new active `TimeRecord`. Fails with `TaskNotFound` when the task does not
    /// exist or belongs to someone else, and with `TimerAlreadyRunning` when the
    /// task already has an active record.
    #[tracing::instrument(skip(self))]
    pub async fn start_timer(
        &self,
        task_id: i32,
        user_id: i32,
    ) -> Result<TimeRecord, TimerServiceError> {
        let record = self
            .db
            .transaction::<_, TimeRecord, TimerServiceError>(|txn| {
                Box::pin(async move {
                    let record = open_record(txn, task_id, user_id).await?;

                    task::Entity::update_many()
                        .col_expr(
                            task::Column::Status,
                            Expr::value(TaskStatus::InProgress.to_value()),
                        )
                        .col_expr(task::Column::UpdatedAt, Expr::value(record.start_time))
                        .filter(task::Column::Id.eq(task_id))
                        .exec(txn)
                        .await?;

                    Ok(record)
                })
            })
            .await?;

        tracing::info!("Started time record {} on task {}", record.id, task_id);
        Ok(record)
    }

    /// Closes one of the user's active records without touching the task.
    #[tracing::instrument(skip(self))]
    pub async fn pause_timer(
        &self,
        record_id: i32,
        user_id: i32,
    ) -> Result<TimeRecord, TimerServiceError> {
        let record = self
            .db
            .transaction::<_, TimeRecord, TimerServiceError>(|txn| {
                Box::pin(async move { close_record(txn, record_id, user_id).await })
            })
            .await?;

        tracing::info!(
            "Paused time record {} after {:.3} minutes",
            record.id,
            record.duration.unwrap_or_default()
        );
        Ok(record)
    }

    /// Opens a fresh record on one of the user's tasks.
    ///
    /// Earlier records are left as they are, and the task status is not changed.
    #[tracing::instrument(skip(self))]
    pub async fn resume_timer(
        &self,
        task_id: i32,
        user_id: i32,
    ) -> Result<TimeRecord, TimerServiceError> {
        let record = self
            .db
            .transaction::<_, TimeRecord, TimerServiceError>(|txn| {
                Box::pin(async move { open_record(txn, task_id, user_id).await })
            })
            .await?;

        tracing::info!("Resumed task {} with time record {}", task_id, record.id);
        Ok(record)
    }

    /// Closes one of the user's active records and adds its duration to the task.
    #[tracing::instrument(skip(self))]
    pub async fn stop_timer(
        &self,
        record_id: i32,
        user_id: i32,
    ) -> Result<TimeRecord, TimerServiceError> {
        let record = self
            .db
            .transaction::<_, TimeRecord, TimerServiceError>(|txn| {
                Box::pin(async move {
                    let record = close_record(txn, record_id, user_id).await?;
                    let duration = record.duration.unwrap_or_default();

                    task::Entity::update_many()
                        .col_expr(
                            task::Column::ActualTime,
                            Expr::col(task::Column::ActualTime).add(duration),
                        )
                        .filter(task::Column::Id.eq(record.task_id))
                        .exec(txn)
                        .await?;

                    Ok(record)
                })
            })
            .await?;

        tracing::info!(
            "Stopped time record {} on task {} after {:.3} minutes",
            record.id,
            record.task_id,
            record.duration.unwrap_or_default()
        );
        Ok(record)
    }

    /// Returns the task a record of the user belongs to.
    #[tracing::instrument(skip(self))]
    pub async fn task_of_record(
        &self,
        record_id: i32,
        user_id: i32,
    ) -> Result<i32, TimerServiceError> {
        let record = time_record::Entity::find_by_id(record_id)
            .filter(time_record::Column::UserId.eq(user_id))
            .one(self.db)
            .await?
            .ok_or(TimerServiceError::RecordNotFound(record_id))?;
        Ok(record.task_id)
    }

    /// Returns the records of one of the user's tasks, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn records_for_task(
        &self,
        task_id: i32,
        user_id: i32,
    ) -> Result<Vec<TimeRecord>, TimerServiceError> {
        let records = time_record::Entity::find()
            .filter(time_record::Column::TaskId.eq(task_id))
            .filter(time_record::Column::UserId.eq(user_id))
            .order_by_asc(time_record::Column::StartTime)
            .order_by_asc(time_record::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(TimeRecord::from)
            .collect();
        Ok(records)
    }
}

/// Inserts a new active record after checking ownership and that no other
/// record of the task is running.
async fn open_record<C>(
    db: &C,
    task_id: i32,
    user_id: i32,
) -> Result<TimeRecord, TimerServiceError>
where
    C: ConnectionTrait,
{
    claim_task(db, task_id, user_id).await?;

    let running = time_record::Entity::find()
        .filter(time_record::Column::TaskId.eq(task_id))
        .filter(time_record::Column::IsActive.eq(true))
        .count(db)
        .await?;
    if running > 0 {
        return Err(TimerServiceError::TimerAlreadyRunning(task_id));
    }

    let active_model = time_record::ActiveModel {
        task_id: ActiveValue::Set(task_id),
        user_id: ActiveValue::Set(user_id),
        start_time: ActiveValue::Set(now()),
        end_time: ActiveValue::Set(None),
        duration: ActiveValue::Set(None),
        is_active: ActiveValue::Set(true),
        ..Default::default()
    };
    let created_model = active_model.insert(db).await.map_err(|err| {
        // Unique index on active records per task.
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                TimerServiceError::TimerAlreadyRunning(task_id)
            }
            _ => TimerServiceError::Database(err),
        }
    })?;
    Ok(TimeRecord::from(created_model))
}

/// Takes the write lock on one of the user's tasks before anything is read.
///
/// The no-op update locks the task row on Postgres and the database on SQLite,
/// so concurrent opens on the same task run one after the other and the later
/// one sees the record the earlier one inserted.
async fn claim_task<C>(db: &C, task_id: i32, user_id: i32) -> Result<(), TimerServiceError>
where
    C: ConnectionTrait,
{
    let result = task::Entity::update_many()
        .col_expr(task::Column::UserId, Expr::col(task::Column::UserId).into())
        .filter(task::Column::Id.eq(task_id))
        .filter(task::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(TimerServiceError::TaskNotFound(task_id));
    }
    Ok(())
}

/// Closes an active record exactly once.
///
/// The first statement is a no-op update that only matches while `is_active`
/// is still true. It takes the row lock, so a concurrent close waits for this
/// transaction and then matches no row.
async fn close_record<C>(
    db: &C,
    record_id: i32,
    user_id: i32,
) -> Result<TimeRecord, TimerServiceError>
where
    C: ConnectionTrait,
{
    let claimed = time_record::Entity::update_many()
        .col_expr(
            time_record::Column::IsActive,
            Expr::col(time_record::Column::IsActive).into(),
        )
        .filter(time_record::Column::Id.eq(record_id))
        .filter(time_record::Column::UserId.eq(user_id))
        .filter(time_record::Column::IsActive.eq(true))
        .exec(db)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(TimerServiceError::ActiveRecordNotFound(record_id));
    }

    let active = time_record::Entity::find_by_id(record_id)
        .one(db)
        .await?
        .ok_or(TimerServiceError::ActiveRecordNotFound(record_id))?;

    // Never end before the start, even if the wall clock stepped backwards.
    let end_time = now().max(active.start_time);
    let duration = duration_minutes(active.start_time, end_time);

    time_record::Entity::update_many()
        .col_expr(time_record::Column::EndTime, Expr::value(end_time))
        .col_expr(time_record::Column::Duration, Expr::value(duration))
        .col_expr(time_record::Column::IsActive, Expr::value(false))
        .filter(time_record::Column::Id.eq(record_id))
        .filter(time_record::Column::IsActive.eq(true))
        .exec(db)
        .await?;

    Ok(TimeRecord {
        end_time: Some(end_time),
        duration: Some(duration),
        is_active: false,
        ..TimeRecord::from(active)
    })
}
