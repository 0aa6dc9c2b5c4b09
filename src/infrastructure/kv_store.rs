//! 键值存储 - 基础设施层
//!
//! 缓存网关依赖这个 trait，不关心背后是内存还是外部服务。

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// 带过期时间的键值存储
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 读取；不存在或已过期返回 None
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 写入并设置过期时间
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// 删除；返回 key 是否存在
    async fn delete(&self, key: &str) -> Result<bool>;
}

struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// 进程内存储，过期条目在读取或写入时清除
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前所有未过期的 key（按字典序）
    pub async fn keys(&self) -> Vec<String> {
        let now = Utc::now();
        let entries = self.entries.lock().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl).context("缓存 TTL 超出范围")?;
        let now = Utc::now();
        let expires_at = now + ttl;

        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        Ok(entries
            .remove(key)
            .map_or(false, |entry| entry.expires_at > Utc::now()))
    }
}
