pub use super::task::Entity as Task;
pub use super::time_record::Entity as TimeRecord;
pub use super::user::Entity as User;
