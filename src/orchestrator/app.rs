//! 应用入口 - 编排层
//!
//! 把配置和协作者组装成完整的服务：单次查询直接走 `ScrapeFlow`，
//! 批量任务交给 `JobManager`。

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{JobResult, ScrapeResult};
use crate::infrastructure::{
    ArtifactStore, HttpFetcher, JobStore, KvStore, LocalArtifactStore, MemoryJobStore,
    MemoryKvStore, PageFetcher,
};
use crate::models::{BatchInput, ContactResult, JobId, JobStatus, JobStatusView, ScrapeMode};
use crate::orchestrator::job_manager::{JobHandle, JobManager};
use crate::orchestrator::row_scheduler::RowScheduler;
use crate::orchestrator::worker_pool::{PoolStats, WorkerPool};
use crate::services::{normalize, AiAssistant, OpenAiAssistant};
use crate::utils::logging::log_startup;
use crate::workflow::{ScrapeFlow, ScrapeRequest};

/// 外部协作者
///
/// 构造时显式传入，测试中替换为 `testing` 模块里的实现。
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn PageFetcher>,
    pub ai: Arc<dyn AiAssistant>,
    pub kv_store: Arc<dyn KvStore>,
    pub job_store: Arc<dyn JobStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

impl Collaborators {
    /// 生产环境的默认实现
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(config).context("无法创建 HTTP 客户端")?;
        Ok(Self {
            fetcher: Arc::new(fetcher),
            ai: Arc::new(OpenAiAssistant::new(config)),
            kv_store: Arc::new(MemoryKvStore::new()),
            job_store: Arc::new(MemoryJobStore::new()),
            artifacts: Arc::new(LocalArtifactStore::new(&config.artifact_root)),
        })
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<ScrapeFlow>,
    jobs: JobManager,
}

impl App {
    /// 初始化应用（需要在 tokio 运行时内调用）
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        log_startup(&config);

        let collaborators = Collaborators::from_config(&config)?;
        if config.openai_api_key.is_empty() {
            warn!("⚠️ 未设置 OPENAI_API_KEY，AI 调用将失败并走降级路径");
        }
        Ok(Self::with_collaborators(config, collaborators))
    }

    /// 用给定的协作者组装应用
    pub fn with_collaborators(config: Config, collaborators: Collaborators) -> Self {
        let flow = Arc::new(ScrapeFlow::new(
            collaborators.fetcher,
            collaborators.ai,
            collaborators.kv_store,
            &config,
        ));
        let scheduler = Arc::new(RowScheduler::new(
            flow.clone(),
            collaborators.job_store.clone(),
            collaborators.artifacts.clone(),
            &config,
        ));
        let jobs = JobManager::new(
            collaborators.job_store,
            collaborators.artifacts,
            WorkerPool::new(config.max_workers),
            scheduler,
            config.website_column.clone(),
        );

        info!("✓ 应用初始化完成");
        Self { config, flow, jobs }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 单次查询，任何错误都体现在 `status=error` 的结果里
    pub async fn lookup(&self, website: &str, mode: ScrapeMode, validate: bool) -> ContactResult {
        let request = ScrapeRequest::new(website, mode).with_validate(validate);
        self.flow.run(&request).await
    }

    /// 单次查询，输入无效时返回 Err
    pub async fn try_lookup(
        &self,
        website: &str,
        mode: ScrapeMode,
        validate: bool,
    ) -> ScrapeResult<ContactResult> {
        let request = ScrapeRequest::new(website, mode).with_validate(validate);
        self.flow.try_run(&request).await
    }

    /// 清除某个网站在该模式下的缓存，返回是否确实删除了条目
    pub async fn invalidate_cache(&self, website: &str, mode: ScrapeMode) -> ScrapeResult<bool> {
        let url = normalize(website)?;
        Ok(self.flow.cache().invalidate(mode.namespace(), &url).await)
    }

    pub async fn submit_batch(&self, input: BatchInput) -> JobResult<JobHandle> {
        self.jobs.submit(input).await
    }

    pub async fn job_status(&self, id: JobId) -> JobResult<JobStatusView> {
        self.jobs.status(id).await
    }

    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: Option<usize>,
    ) -> JobResult<Vec<JobStatusView>> {
        self.jobs.list_jobs(status, limit).await
    }

    pub async fn download(&self, id: JobId) -> JobResult<(String, Vec<u8>)> {
        self.jobs.download(id).await
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.jobs.pool_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryArtifactStore;
    use crate::testing::{ScriptedAi, StaticFetcher};
    use tokio_test::{assert_err, assert_ok};

    fn app(fetcher: StaticFetcher) -> App {
        App::with_collaborators(
            Config::default(),
            Collaborators {
                fetcher: Arc::new(fetcher),
                ai: Arc::new(ScriptedAi::new()),
                kv_store: Arc::new(MemoryKvStore::new()),
                job_store: Arc::new(MemoryJobStore::new()),
                artifacts: Arc::new(MemoryArtifactStore::new()),
            },
        )
    }

    #[tokio::test]
    async fn test_invalidate_cache_by_mode() {
        let app = app(StaticFetcher::new().page("http://shop.io", "<p>sales@shop.io</p>"));
        let result = app.lookup("https://www.Shop.io/", ScrapeMode::Fast, false).await;
        assert_eq!(result.emails(), ["sales@shop.io".to_string()]);

        assert!(!assert_ok!(app.invalidate_cache("shop.io", ScrapeMode::ProfileOnly).await));
        assert!(assert_ok!(app.invalidate_cache("shop.io", ScrapeMode::Full).await));
        assert!(!assert_ok!(app.invalidate_cache("shop.io", ScrapeMode::Fast).await));
    }

    #[tokio::test]
    async fn test_invalidate_rejects_blank_website() {
        let app = app(StaticFetcher::new());
        let err = assert_err!(app.invalidate_cache("  ", ScrapeMode::Fast).await);
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn test_pool_stats_use_config() {
        let app = app(StaticFetcher::new());
        let stats = app.pool_stats();
        assert_eq!(stats.max_workers, 2);
        assert_eq!(stats.available_slots, 2);
    }
}
