pub use sea_orm_migration::prelude::*;

mod m20250901_000001_create_users_table;
mod m20250901_000002_create_tasks_table;
mod m20250901_000003_create_time_records_table;
mod m20250902_000004_add_unique_active_time_record_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_000001_create_users_table::Migration),
            Box::new(m20250901_000002_create_tasks_table::Migration),
            Box::new(m20250901_000003_create_time_records_table::Migration),
            Box::new(m20250902_000004_add_unique_active_time_record_index::Migration),
        ]
    }
}
