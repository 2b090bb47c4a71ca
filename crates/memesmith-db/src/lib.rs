pub mod activity_log;
pub mod activity_store;

pub use activity_log::{ActivityLog, SqliteActivityLog};
pub use activity_store::{ActivityStore, GenerationRecord, StoredChatMessage};
