use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

use crate::m20250901_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

const FK_TASKS_TO_USERS: &str = "fk-tasks-user_id";
const IDX_TASKS_USER_ID: &str = "idx-tasks-user_id";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(pk_auto(Tasks::Id))
                    .col(integer(Tasks::UserId))
                    .col(string(Tasks::Title))
                    .col(text_null(Tasks::Description))
                    // Statuses and priorities are stored as short strings so the
                    // schema stays portable between Postgres and SQLite.
                    .col(string_len(Tasks::Status, 16).default("pending"))
                    .col(string_len(Tasks::Priority, 16).default("medium"))
                    .col(integer_null(Tasks::EstimatedTime))
                    .col(double(Tasks::ActualTime).default(0.0))
                    .col(timestamp_with_time_zone_null(Tasks::DueDate))
                    .col(timestamp_with_time_zone(Tasks::CreatedAt))
                    .col(timestamp_with_time_zone(Tasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TASKS_TO_USERS)
                            .from(Tasks::Table, Tasks::UserId)
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
                    .name(IDX_TASKS_USER_ID)
                    .table(Tasks::Table)
                    .col(Tasks::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(IDX_TASKS_USER_ID)
                    .table(Tasks::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Tasks {
    Table,
    Id,
    UserId,
    Title,
    Description,
    Status,
    Priority,
    EstimatedTime,
    ActualTime,
    DueDate,
    CreatedAt,
    UpdatedAt,
}
