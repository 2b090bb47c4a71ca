use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    url: String,
    /// Unix seconds.
    created_at: i64,
}

/// On-disk query -> template URL cache with a fixed time-to-live.
///
/// One JSON file per query, named by the SHA-256 of the query. Reads purge
/// expired entries. Writes go through a temp file and a rename so readers
/// never see a partial entry; a failed write is logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct TemplateCache {
    dir: PathBuf,
    ttl: Duration,
}

impl TemplateCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn key(query: &str) -> String {
        format!("{:x}", Sha256::digest(query.as_bytes()))
    }

    fn entry_path(&self, query: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::key(query)))
    }

    pub async fn get(&self, query: &str) -> Option<String> {
        let path = self.entry_path(query);
        let raw = tokio::fs::read(&path).await.ok()?;

        let entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("dropping unreadable cache entry {}: {e}", path.display());
                let _ = tokio::fs::remove_file(&path).await;
                return None;
            }
        };

        let age = Utc::now().timestamp().saturating_sub(entry.created_at);
        if age < 0 || age as u64 >= self.ttl.as_secs() {
            debug!("cache entry for '{query}' expired ({age}s old)");
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }

        Some(entry.url)
    }

    pub async fn put(&self, query: &str, url: &str) {
        if let Err(e) = self.try_put(query, url).await {
            warn!("failed to write template cache for '{query}': {e}");
        }
    }

    async fn try_put(&self, query: &str, url: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let entry = CacheEntry {
            url: url.to_string(),
            created_at: Utc::now().timestamp(),
        };
        let body = serde_json::to_vec(&entry)?;

        let path = self.entry_path(query);
        let tmp = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            Self::key(query),
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}
