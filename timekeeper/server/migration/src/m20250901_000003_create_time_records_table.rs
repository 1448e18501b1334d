use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

use crate::m20250901_000001_create_users_table::Users;
use crate::m20250901_000002_create_tasks_table::Tasks;

#[derive(DeriveMigrationName)]
pub struct Migration;

const FK_TIME_RECORDS_TO_TASKS: &str = "fk-time_records-task_id";
const FK_TIME_RECORDS_TO_USERS: &str = "fk-time_records-user_id";
const IDX_TIME_RECORDS_TASK_ACTIVE: &str = "idx-time_records-task_id-is_active";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TimeRecords::Table)
                    .if_not_exists()
                    .col(pk_auto(TimeRecords::Id))
                    .col(integer(TimeRecords::TaskId))
                    .col(integer(TimeRecords::UserId))
                    .col(timestamp_with_time_zone(TimeRecords::StartTime))
                    .col(timestamp_with_time_zone_null(TimeRecords::EndTime))
                    .col(double_null(TimeRecords::Duration))
                    .col(boolean(TimeRecords::IsActive).default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TIME_RECORDS_TO_TASKS)
                            .from(TimeRecords::Table, TimeRecords::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TIME_RECORDS_TO_USERS)
                            .from(TimeRecords::Table, TimeRecords::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(IDX_TIME_RECORDS_TASK_ACTIVE)
                    .table(TimeRecords::Table)
                    .col(TimeRecords::TaskId)
                    .col(TimeRecords::IsActive)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(IDX_TIME_RECORDS_TASK_ACTIVE)
                    .table(TimeRecords::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(TimeRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TimeRecords {
    Table,
    Id,
    TaskId,
    UserId,
    StartTime,
    EndTime,
    Duration,
    IsActive,
}
