//! 缓存网关 - 业务能力层
//!
//! cache-aside 读写，key 为 `{namespace}:{url}`。
//! 缓存永远不会让调用方失败：后端错误、超时、无法解析的内容
//! 在读取时都视为未命中，在写入时只打印警告。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ScrapeError;
use crate::infrastructure::KvStore;
use crate::models::{CacheNamespace, ContactResult};
use crate::services::url_normalizer::NormalizedUrl;

pub struct CacheGateway {
    store: Arc<dyn KvStore>,
    ttl: Duration,
    timeout: Duration,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn KvStore>, config: &Config) -> Self {
        Self {
            store,
            ttl: config.cache_ttl(),
            timeout: config.cache_timeout(),
        }
    }

    pub async fn get(&self, namespace: CacheNamespace, url: &NormalizedUrl) -> Option<ContactResult> {
        let key = namespace.key(url.as_str());

        let raw = match self.bounded("cache get", self.store.get(&key)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("缓存未命中: {}", key);
                return None;
            }
            Err(e) => {
                warn!("⚠️ 读取缓存失败，按未命中处理: {} ({})", key, e);
                return None;
            }
        };

        match serde_json::from_str::<ContactResult>(&raw) {
            Ok(result) => {
                debug!("缓存命中: {}", key);
                Some(result)
            }
            Err(e) => {
                warn!("⚠️ 缓存内容无法解析，按未命中处理: {} ({})", key, e);
                None
            }
        }
    }

    pub async fn put(&self, namespace: CacheNamespace, url: &NormalizedUrl, result: &ContactResult) {
        let key = namespace.key(url.as_str());

        let payload = match serde_json::to_string(result) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("⚠️ 结果无法序列化，跳过缓存: {} ({})", key, e);
                return;
            }
        };

        match self
            .bounded("cache put", self.store.set(&key, payload, self.ttl))
            .await
        {
            Ok(()) => debug!("已写入缓存: {} (TTL {}s)", key, self.ttl.as_secs()),
            Err(e) => warn!("⚠️ 写入缓存失败: {} ({})", key, e),
        }
    }

    /// 删除一条缓存，返回是否删除了已存在的条目
    pub async fn invalidate(&self, namespace: CacheNamespace, url: &NormalizedUrl) -> bool {
        let key = namespace.key(url.as_str());
        match self.bounded("cache delete", self.store.delete(&key)).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!("⚠️ 删除缓存失败: {} ({})", key, e);
                false
            }
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, ScrapeError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ScrapeError::cache_backend(e)),
            Err(_) => Err(ScrapeError::Timeout {
                operation,
                after: self.timeout,
            }),
        }
    }
}
