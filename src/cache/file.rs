use super::CacheBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Whole cache kept in one JSON object file, rewritten on every change.
pub struct FileBackend {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileBackend {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Cache file {} is unreadable, starting empty: {}", path.display(), e);
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let cache_error = |e: std::io::Error| Error::Cache(format!("{}: {}", self.path.display(), e));

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(cache_error)?;
            }
        }
        tokio::fs::write(&self.path, serde_json::to_vec(entries)?)
            .await
            .map_err(cache_error)?;
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FileBackend {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn store(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }

    /// One rewrite for the whole batch.
    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        for key in keys {
            entries.remove(key);
        }
        if entries.len() != before {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let backend = FileBackend::open(&path).await.unwrap();
        backend.store("a", "1".to_string()).await.unwrap();
        backend.store("b", "2".to_string()).await.unwrap();
        backend.remove("b").await.unwrap();
        drop(backend);

        let reopened = FileBackend::open(&path).await.unwrap();
        assert_eq!(reopened.load("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(reopened.load("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_many_persists_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let backend = FileBackend::open(&path).await.unwrap();
        for key in ["a", "b", "c"] {
            backend.store(key, key.to_string()).await.unwrap();
        }
        backend
            .remove_many(&["a".to_string(), "c".to_string(), "missing".to_string()])
            .await
            .unwrap();
        drop(backend);

        let reopened = FileBackend::open(&path).await.unwrap();
        assert_eq!(reopened.keys().await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "[[[").unwrap();

        let backend = FileBackend::open(&path).await.unwrap();
        assert!(backend.keys().await.unwrap().is_empty());
    }
}
