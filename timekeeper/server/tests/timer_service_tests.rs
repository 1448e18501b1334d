use sea_orm::{ActiveModelTrait, ActiveValue, EntityTrait, SqlErr};
use std::time::Duration;
use timekeeper_server::entities::sea_orm_active_enums::TaskStatus;
use timekeeper_server::entities::time_record;
use timekeeper_server::task::TaskService;
use timekeeper_server::timer::{TimerService, TimerServiceError, duration_minutes, now};

mod common;

use common::{create_task, create_user, setup_db, setup_shared_db};

async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn can_start_timer_and_mark_task_in_progress() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;
    let task = create_task(&db, &user, "Write report").await;

    let record = TimerService::new(&db)
        .start_timer(task.id, user.id())
        .await
        .unwrap();

    assert_eq!(record.task_id, task.id);
    assert_eq!(record.user_id, user.id());
    assert!(record.is_active);
    assert_eq!(record.end_time, None);
    assert_eq!(record.duration, None);

    let task = TaskService::new(&db).get_task(task.id, user.id()).await.unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.actual_time, 0.0);
}

#[tokio::test]
async fn can_reject_start_on_missing_task() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;

    let result = TimerService::new(&db).start_timer(999, user.id()).await;

    assert!(matches!(result, Err(TimerServiceError::TaskNotFound(999))));
    let records = time_record::Entity::find().all(&db).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn can_reject_start_on_task_of_other_user() {
    let db = setup_db().await.unwrap();
    let owner = create_user(&db, "alice").await;
    let intruder = create_user(&db, "mallory").await;
    let task = create_task(&db, &owner, "Private task").await;

    let result = TimerService::new(&db).start_timer(task.id, intruder.id()).await;

    assert!(matches!(result, Err(TimerServiceError::TaskNotFound(_))));
    let task = TaskService::new(&db).get_task(task.id, owner.id()).await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    let records = time_record::Entity::find().all(&db).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn can_reject_second_running_timer_on_same_task() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;
    let task = create_task(&db, &user, "Write report").await;
    let service = TimerService::new(&db);
    service.start_timer(task.id, user.id()).await.unwrap();

    let result = service.start_timer(task.id, user.id()).await;

    assert!(matches!(
        result,
        Err(TimerServiceError::TimerAlreadyRunning(id)) if id == task.id
    ));
    let records = service.records_for_task(task.id, user.id()).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn can_pause_timer_without_touching_task() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;
    let task = create_task(&db, &user, "Write report").await;
    let service = TimerService::new(&db);
    let started = service.start_timer(task.id, user.id()).await.unwrap();
    tick().await;

    let paused = service.pause_timer(started.id, user.id()).await.unwrap();

    assert_eq!(paused.id, started.id);
    assert!(!paused.is_active);
    let end_time = paused.end_time.unwrap();
    assert!(end_time >= paused.start_time);
    assert_eq!(
        paused.duration,
        Some(duration_minutes(paused.start_time, end_time))
    );

    let task = TaskService::new(&db).get_task(task.id, user.id()).await.unwrap();
    assert_eq!(task.actual_time, 0.0);
    assert_eq!(task.status, TaskStatus::InProgress);
}

#[tokio::test]
async fn can_persist_closed_record_exactly() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;
    let task = create_task(&db, &user, "Write report").await;
    let service = TimerService::new(&db);
    let started = service.start_timer(task.id, user.id()).await.unwrap();
    tick().await;

    let stopped = service.stop_timer(started.id, user.id()).await.unwrap();

    let stored = service.records_for_task(task.id, user.id()).await.unwrap();
    assert_eq!(stored, vec![stopped.clone()]);
    assert_eq!(
        stored[0].duration,
        Some(duration_minutes(stored[0].start_time, stored[0].end_time.unwrap()))
    );
}

#[tokio::test]
async fn can_accumulate_actual_time_across_records() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;
    let task = create_task(&db, &user, "Write report").await;
    let service = TimerService::new(&db);

    let first = service.start_timer(task.id, user.id()).await.unwrap();
    tick().await;
    let first = service.stop_timer(first.id, user.id()).await.unwrap();

    let second = service.resume_timer(task.id, user.id()).await.unwrap();
    tick().await;
    let second = service.stop_timer(second.id, user.id()).await.unwrap();

    let expected = 0.0 + first.duration.unwrap() + second.duration.unwrap();
    let task = TaskService::new(&db).get_task(task.id, user.id()).await.unwrap();
    assert_eq!(task.actual_time, expected);
}

#[tokio::test]
async fn can_reject_pause_and_stop_on_closed_record() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;
    let task = create_task(&db, &user, "Write report").await;
    let service = TimerService::new(&db);
    let started = service.start_timer(task.id, user.id()).await.unwrap();
    let stopped = service.stop_timer(started.id, user.id()).await.unwrap();
    let task_before = TaskService::new(&db).get_task(task.id, user.id()).await.unwrap();

    let paused = service.pause_timer(started.id, user.id()).await;
    let stopped_again = service.stop_timer(started.id, user.id()).await;

    assert!(matches!(paused, Err(TimerServiceError::ActiveRecordNotFound(_))));
    assert!(matches!(
        stopped_again,
        Err(TimerServiceError::ActiveRecordNotFound(_))
    ));
    let records = service.records_for_task(task.id, user.id()).await.unwrap();
    assert_eq!(records, vec![stopped]);
    let task_after = TaskService::new(&db).get_task(task.id, user.id()).await.unwrap();
    assert_eq!(task_after, task_before);
}

#[tokio::test]
async fn can_reject_stop_on_missing_record() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;

    let result = TimerService::new(&db).stop_timer(42, user.id()).await;

    assert!(matches!(
        result,
        Err(TimerServiceError::ActiveRecordNotFound(42))
    ));
}

#[tokio::test]
async fn can_reject_stop_on_record_of_other_user() {
    let db = setup_db().await.unwrap();
    let owner = create_user(&db, "alice").await;
    let intruder = create_user(&db, "mallory").await;
    let task = create_task(&db, &owner, "Write report").await;
    let service = TimerService::new(&db);
    let started = service.start_timer(task.id, owner.id()).await.unwrap();

    let result = service.stop_timer(started.id, intruder.id()).await;

    assert!(matches!(
        result,
        Err(TimerServiceError::ActiveRecordNotFound(_))
    ));
    let records = service.records_for_task(task.id, owner.id()).await.unwrap();
    assert!(records[0].is_active);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn can_stop_concurrently_only_once() {
    let shared = setup_shared_db().await.unwrap();
    let db = &shared.db;
    let user = create_user(db, "alice").await;
    let service = TimerService::new(db);

    for round in 0..20 {
        let task = create_task(db, &user, &format!("Task {}", round)).await;
        let started = service.start_timer(task.id, user.id()).await.unwrap();

        let (first, second) = tokio::join!(
            service.stop_timer(started.id, user.id()),
            service.stop_timer(started.id, user.id())
        );

        let (stopped, rejected) = match (first, second) {
            (Ok(stopped), Err(err)) | (Err(err), Ok(stopped)) => (stopped, err),
            other => panic!("expected exactly one stop to succeed, got {:?}", other),
        };
        assert!(matches!(
            rejected,
            TimerServiceError::ActiveRecordNotFound(_)
        ));
        let task = TaskService::new(db).get_task(task.id, user.id()).await.unwrap();
        assert_eq!(task.actual_time, 0.0 + stopped.duration.unwrap());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn can_start_concurrently_only_once() {
    let shared = setup_shared_db().await.unwrap();
    let db = &shared.db;
    let user = create_user(db, "alice").await;
    let service = TimerService::new(db);

    for round in 0..20 {
        let task = create_task(db, &user, &format!("Task {}", round)).await;

        let (first, second) = tokio::join!(
            service.start_timer(task.id, user.id()),
            service.start_timer(task.id, user.id())
        );

        let rejected = match (first, second) {
            (Ok(_), Err(err)) | (Err(err), Ok(_)) => err,
            other => panic!("expected exactly one start to succeed, got {:?}", other),
        };
        assert!(matches!(
            rejected,
            TimerServiceError::TimerAlreadyRunning(id) if id == task.id
        ));
        let active = service
            .records_for_task(task.id, user.id())
            .await
            .unwrap()
            .into_iter()
            .filter(|record| record.is_active)
            .count();
        assert_eq!(active, 1);
    }
}

#[tokio::test]
async fn can_reject_second_active_record_at_store_level() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;
    let task = create_task(&db, &user, "Write report").await;
    TimerService::new(&db)
        .start_timer(task.id, user.id())
        .await
        .unwrap();

    let duplicate = time_record::ActiveModel {
        task_id: ActiveValue::Set(task.id),
        user_id: ActiveValue::Set(user.id()),
        start_time: ActiveValue::Set(now()),
        is_active: ActiveValue::Set(true),
        ..Default::default()
    }
    .insert(&db)
    .await;

    assert!(matches!(
        duplicate.unwrap_err().sql_err(),
        Some(SqlErr::UniqueConstraintViolation(_))
    ));
}

#[tokio::test]
async fn can_resume_with_new_record_after_pause() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;
    let task = create_task(&db, &user, "Write report").await;
    let service = TimerService::new(&db);
    let started = service.start_timer(task.id, user.id()).await.unwrap();
    let paused = service.pause_timer(started.id, user.id()).await.unwrap();

    let resumed = service.resume_timer(task.id, user.id()).await.unwrap();

    assert_ne!(resumed.id, paused.id);
    assert!(resumed.is_active);
    assert_eq!(resumed.task_id, task.id);
    let records = service.records_for_task(task.id, user.id()).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], paused);
}

#[tokio::test]
async fn can_reject_resume_while_running() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;
    let task = create_task(&db, &user, "Write report").await;
    let service = TimerService::new(&db);
    service.start_timer(task.id, user.id()).await.unwrap();

    let result = service.resume_timer(task.id, user.id()).await;

    assert!(matches!(
        result,
        Err(TimerServiceError::TimerAlreadyRunning(_))
    ));
}

#[tokio::test]
async fn can_find_task_of_record() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;
    let other = create_user(&db, "bob").await;
    let task = create_task(&db, &user, "Write report").await;
    let service = TimerService::new(&db);
    let started = service.start_timer(task.id, user.id()).await.unwrap();

    assert_eq!(
        service.task_of_record(started.id, user.id()).await.unwrap(),
        task.id
    );
    assert!(matches!(
        service.task_of_record(started.id, other.id()).await,
        Err(TimerServiceError::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn can_run_full_timer_session() {
    let db = setup_db().await.unwrap();
    let user = create_user(&db, "alice").await;
    let task = create_task(&db, &user, "Write report").await;
    let service = TimerService::new(&db);

    let first = service.start_timer(task.id, user.id()).await.unwrap();
    tick().await;
    let first = service.pause_timer(first.id, user.id()).await.unwrap();
    let second = service.resume_timer(task.id, user.id()).await.unwrap();
    tick().await;
    let second = service.stop_timer(second.id, user.id()).await.unwrap();

    let records = service.records_for_task(task.id, user.id()).await.unwrap();
    assert_eq!(records, vec![first.clone(), second.clone()]);
    assert!(records.iter().all(|record| !record.is_active));

    // Only the stopped record counts towards the task.
    let task = TaskService::new(&db).get_task(task.id, user.id()).await.unwrap();
    assert_eq!(task.actual_time, 0.0 + second.duration.unwrap());
    assert_eq!(task.status, TaskStatus::InProgress);
}
