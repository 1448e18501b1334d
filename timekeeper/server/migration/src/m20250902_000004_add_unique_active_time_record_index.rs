use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const IDX_TIME_RECORDS_ONE_ACTIVE: &str = "idx-time_records-task_id-one_active";

// Partial unique indexes share this syntax on Postgres and SQLite.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(&format!(
                r#"CREATE UNIQUE INDEX IF NOT EXISTS "{}" ON "time_records" ("task_id") WHERE "is_active""#,
                IDX_TIME_RECORDS_ONE_ACTIVE
            ))
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(&format!(
                r#"DROP INDEX IF EXISTS "{}""#,
                IDX_TIME_RECORDS_ONE_ACTIVE
            ))
            .await?;
        Ok(())
    }
}
