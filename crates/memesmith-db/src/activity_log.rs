use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use memesmith_common::Result;
use tokio::sync::Mutex;

use crate::activity_store::{ActivityStore, GenerationRecord};

/// Sink for durable activity records. Failures are reported, never fatal to callers.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record_message(
        &self,
        chat_id: i64,
        message_id: i64,
        user_id: Option<i64>,
        username: Option<&str>,
        text: &str,
    ) -> Result<()>;

    async fn record_generation(&self, record: GenerationRecord) -> Result<()>;
}

/// [`ActivityLog`] backed by an [`ActivityStore`].
#[derive(Clone)]
pub struct SqliteActivityLog {
    store: Arc<Mutex<ActivityStore>>,
}

impl SqliteActivityLog {
    pub fn new(store: ActivityStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(ActivityStore::open(path)?))
    }

    pub fn store(&self) -> Arc<Mutex<ActivityStore>> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl ActivityLog for SqliteActivityLog {
    async fn record_message(
        &self,
        chat_id: i64,
        message_id: i64,
        user_id: Option<i64>,
        username: Option<&str>,
        text: &str,
    ) -> Result<()> {
        let store = self.store.lock().await;
        store.save_message(chat_id, message_id, user_id, username, text)
    }

    async fn record_generation(&self, record: GenerationRecord) -> Result<()> {
        let store = self.store.lock().await;
        store.log_generation(&record)
    }
}
