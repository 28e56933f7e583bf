//! Durable storage for task records. One in-memory implementation for
//! tests/single-box operation, one file-backed implementation that survives
//! a worker restart.

use async_trait::async_trait;
use dashmap::DashMap;
use orchestrator_core::{Error, Result, TaskRecord};
use std::path::PathBuf;
use std::sync::Arc;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn put(&self, record: TaskRecord) -> Result<()>;
    async fn get(&self, correlation_id: &str) -> Result<Option<TaskRecord>>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<TaskRecord>>;
}

/// Keyed by `correlation_id`. Good enough for a single worker process or
/// for tests; state is lost on restart.
#[derive(Default)]
pub struct InMemoryTaskStore {
    records: DashMap<String, TaskRecord>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn put(&self, record: TaskRecord) -> Result<()> {
        self.records.insert(record.correlation_id.clone(), record);
        Ok(())
    }

    async fn get(&self, correlation_id: &str) -> Result<Option<TaskRecord>> {
        Ok(self.records.get(correlation_id).map(|r| r.clone()))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<TaskRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.user_id.as_deref() == Some(user_id))
            .map(|r| r.clone())
            .collect())
    }
}

/// One JSON file per correlation id under `root`. Durable across restarts
/// without pulling in an actual database dependency.
pub struct FileTaskStore {
    root: PathBuf,
}

impl FileTaskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, correlation_id: &str) -> PathBuf {
        self.root.join(format!("{correlation_id}.json"))
    }

    async fn read_one(&self, path: &std::path::Path) -> Result<TaskRecord> {
        let bytes = tokio::fs::read(path).await?;
        serde_json::from_slice(&bytes).map_err(Error::from)
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn put(&self, record: TaskRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(&record.correlation_id);
        let bytes = serde_json::to_vec_pretty(&record)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn get(&self, correlation_id: &str) -> Result<Option<TaskRecord>> {
        let path = self.path_for(correlation_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(self.read_one(&path).await?))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<TaskRecord>> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let record = self.read_one(&path).await?;
            if record.user_id.as_deref() == Some(user_id) {
                out.push(record);
            }
        }
        Ok(out)
    }
}

pub type SharedTaskStore = Arc<dyn TaskStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryTaskStore::new();
        let record = TaskRecord::pending("c1", Some("u1".to_string()), "do a thing", 50);
        store.put(record.clone()).await.unwrap();
        let fetched = store.get("c1").await.unwrap().unwrap();
        assert_eq!(fetched.correlation_id, "c1");
        let for_user = store.list_for_user("u1").await.unwrap();
        assert_eq!(for_user.len(), 1);
    }

    #[tokio::test]
    async fn file_store_round_trips() {
        let dir = std::env::temp_dir().join(format!("orchestrator-worker-test-{}", uuid::Uuid::new_v4()));
        let store = FileTaskStore::new(&dir);
        let record = TaskRecord::pending("c2", None, "do another thing", 50);
        store.put(record).await.unwrap();
        let fetched = store.get("c2").await.unwrap();
        assert!(fetched.is_some());
        assert!(store.get("missing").await.unwrap().is_none());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
