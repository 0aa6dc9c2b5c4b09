//! 测试用的协作者实现
//!
//! 单元测试与 `tests/` 下的集成测试共用，不依赖网络和外部服务。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::{JobError, JobResult};
use crate::infrastructure::{ArtifactStore, KvStore, MemoryArtifactStore, PageFetcher};
use crate::models::{ContactCandidates, ValidatedContacts};
use crate::services::AiAssistant;

/// 记录同时进行中的调用数及其峰值
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard { gauge: self }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

pub struct GaugeGuard<'a> {
    gauge: &'a ConcurrencyGauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 按 URL 返回预设 HTML 的抓取器
///
/// 未登记的 URL 返回 404 错误。
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
    requested: Mutex<Vec<String>>,
    gauge: ConcurrencyGauge,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// 抓取该 URL 时 panic（模拟流程内部崩溃）
    pub fn panicking(mut self, url: &str) -> Self {
        self.panicking.insert(url.to_string());
        self
    }

    /// 每次抓取前等待
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requested().len()
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.gauge.peak()
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        if let Ok(mut urls) = self.requested.lock() {
            urls.push(url.to_string());
        }
        let _guard = self.gauge.enter();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.contains(url) {
            panic!("fetcher crashed on {}", url);
        }
        if self.failing.contains(url) {
            anyhow::bail!("connection refused: {}", url);
        }
        match self.pages.get(url) {
            Some(html) => Ok(html.clone()),
            None => anyhow::bail!("HTTP 404 Not Found for {}", url),
        }
    }
}

/// 预设回复的 AI 助手
///
/// 默认：找不到联系页；校验时原样认可全部候选。
#[derive(Default)]
pub struct ScriptedAi {
    contact_page: Option<String>,
    validation: Option<ValidatedContacts>,
    failing: bool,
    contact_page_calls: AtomicUsize,
    validate_calls: AtomicUsize,
    last_link_count: Mutex<Option<usize>>,
}

impl ScriptedAi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contact_page(mut self, page: &str) -> Self {
        self.contact_page = Some(page.to_string());
        self
    }

    pub fn with_validation(mut self, validated: ValidatedContacts) -> Self {
        self.validation = Some(validated);
        self
    }

    /// 所有调用都返回错误
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn contact_page_calls(&self) -> usize {
        self.contact_page_calls.load(Ordering::SeqCst)
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn last_link_count(&self) -> Option<usize> {
        self.last_link_count.lock().ok().and_then(|count| *count)
    }
}

#[async_trait]
impl AiAssistant for ScriptedAi {
    async fn find_contact_page(&self, _base_url: &str, links: &[String]) -> Result<Option<String>> {
        self.contact_page_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut count) = self.last_link_count.lock() {
            *count = Some(links.len());
        }
        if self.failing {
            anyhow::bail!("AI service unavailable");
        }
        Ok(self.contact_page.clone())
    }

    async fn validate_contacts(&self, candidates: &ContactCandidates) -> Result<ValidatedContacts> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            anyhow::bail!("AI service unavailable");
        }
        Ok(self.validation.clone().unwrap_or_else(|| ValidatedContacts {
            emails: candidates.emails.clone(),
            phones: candidates.phones.clone(),
            profiles: Some(candidates.profiles.clone()),
        }))
    }
}

/// 所有操作都失败的键值存储
pub struct FailingKvStore;

#[async_trait]
impl KvStore for FailingKvStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        anyhow::bail!("cache backend unreachable")
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
        anyhow::bail!("cache backend unreachable")
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        anyhow::bail!("cache backend unreachable")
    }
}

/// 可以读写输入文件、但拒绝写入结果文件的存储
#[derive(Default)]
pub struct OutputRejectingStore {
    inner: MemoryArtifactStore,
}

impl OutputRejectingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for OutputRejectingStore {
    async fn put(&self, path: &str, content: Vec<u8>) -> JobResult<()> {
        if path.contains("/output/") {
            return Err(JobError::storage(path, "bucket is read-only"));
        }
        self.inner.put(path, content).await
    }

    async fn get(&self, path: &str) -> JobResult<Vec<u8>> {
        self.inner.get(path).await
    }
}

