//! sea-orm entity models for the `users`, `tasks` and `time_records` tables.

pub mod prelude;

pub mod sea_orm_active_enums;
pub mod task;
pub mod time_record;
pub mod user;
