//! 文件存储 - 基础设施层
//!
//! 批量任务的输入 CSV 与结果 CSV 都通过这里读写，路径形如
//! `jobs/{id}/input/{filename}` 与 `jobs/{id}/output/{stem}_output.csv`。

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::error::{JobError, JobResult};

/// 任务文件存储
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, path: &str, content: Vec<u8>) -> JobResult<()>;

    async fn get(&self, path: &str) -> JobResult<Vec<u8>>;
}

/// 本地磁盘存储
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> JobResult<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(JobError::storage(path, "path must be relative without '..'"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, path: &str, content: Vec<u8>) -> JobResult<()> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| JobError::storage(path, e))?;
        }
        fs::write(&full_path, content)
            .await
            .map_err(|e| JobError::storage(path, e))
    }

    async fn get(&self, path: &str) -> JobResult<Vec<u8>> {
        let full_path = self.resolve(path)?;
        fs::read(&full_path)
            .await
            .map_err(|e| JobError::storage(path, e))
    }
}

/// 进程内存储
#[derive(Default)]
pub struct MemoryArtifactStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, path: &str, content: Vec<u8>) -> JobResult<()> {
        self.files.write().await.insert(path.to_string(), content);
        Ok(())
    }

    async fn get(&self, path: &str) -> JobResult<Vec<u8>> {
        self.files
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| JobError::storage(path, "not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_store_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        store
            .put("jobs/abc/output/sites_output.csv", b"a,b\n".to_vec())
            .await
            .unwrap();

        let content = store.get("jobs/abc/output/sites_output.csv").await.unwrap();
        assert_eq!(content, b"a,b\n");
        assert!(dir.path().join("jobs/abc/output").is_dir());
    }

    #[tokio::test]
    async fn test_local_store_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        assert!(store.put("../outside.csv", Vec::new()).await.is_err());
        assert!(store.get("/etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store_missing_path() {
        let store = MemoryArtifactStore::new();
        assert!(store.get("jobs/x/input/a.csv").await.is_err());
    }
}
