//! 网站抽取流程 - 流程层
//!
//! 核心职责：定义"一个网站"的完整处理流程
//!
//! 流程顺序：
//! 1. 规范化网址（失败立即返回，不发起任何请求）
//! 2. 查缓存（命中直接返回）
//! 3. 抓主页 → 抽取
//! 4. 仅 full 模式：AI 推荐联系页 → 抓取 → 合并
//! 5. 按需 AI 校验
//! 6. 定性 → 写缓存

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::error::{ScrapeError, ScrapeResult, HOMEPAGE_FETCH_FAILED};
use crate::infrastructure::{KvStore, PageFetcher};
use crate::models::{ContactCandidates, ContactResult};
use crate::services::ai_assistant::MAX_CONTACT_PAGE_LINKS;
use crate::services::{extractor, normalize, AiAssistant, CacheGateway, NormalizedUrl};
use crate::utils::truncate_text;
use crate::workflow::scrape_ctx::{ScrapeCtx, ScrapeRequest};

/// 网站抽取流程
///
/// - 编排单个网站的抽取步骤
/// - 决定何时抓取、何时问 AI、何时降级
/// - 不关心批量任务和并发
pub struct ScrapeFlow {
    fetcher: Arc<dyn PageFetcher>,
    ai: Arc<dyn AiAssistant>,
    cache: CacheGateway,
    fetch_timeout: Duration,
    ai_timeout: Duration,
    verbose_logging: bool,
}

impl ScrapeFlow {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        ai: Arc<dyn AiAssistant>,
        kv_store: Arc<dyn KvStore>,
        config: &Config,
    ) -> Self {
        Self {
            fetcher,
            ai,
            cache: CacheGateway::new(kv_store, config),
            fetch_timeout: config.fetch_timeout(),
            ai_timeout: config.ai_timeout(),
            verbose_logging: config.verbose_logging,
        }
    }

    pub fn cache(&self) -> &CacheGateway {
        &self.cache
    }

    /// 执行抽取，所有错误都转换为 `status=error` 的结果
    pub async fn run(&self, request: &ScrapeRequest) -> ContactResult {
        match self.try_run(request).await {
            Ok(result) => result,
            Err(e) => {
                warn!("{} ❌ 输入无效: {}", request.ctx, e);
                ContactResult::error(request.website.trim(), e.to_string())
            }
        }
    }

    /// 执行抽取，只有输入无效时返回 Err
    ///
    /// 主页抓取失败返回 `status=error` 的结果，其余外部故障都在流程内降级。
    pub async fn try_run(&self, request: &ScrapeRequest) -> ScrapeResult<ContactResult> {
        let ctx = &request.ctx;
        let url = normalize(&request.website)?;
        let namespace = request.mode.namespace();

        info!("{} 🔍 开始抽取: {} (模式: {})", ctx, url, request.mode);

        // ========== 缓存 ==========
        if let Some(cached) = self.cache.get(namespace, &url).await {
            info!("{} ✓ 命中缓存: {}", ctx, url);
            return Ok(cached);
        }

        // ========== 主页 ==========
        let home_html = match self.fetch(url.as_str()).await {
            Ok(html) => html,
            Err(e) => {
                warn!("{} ❌ 主页抓取失败: {}", ctx, e);
                return Ok(ContactResult::error(url.as_str(), HOMEPAGE_FETCH_FAILED));
            }
        };

        let mut candidates =
            extractor::extract_candidates(&home_html, request.mode.collects_contacts());
        self.log_candidates(ctx, "主页", &candidates);

        // ========== 联系页（仅 full 模式） ==========
        if request.mode.seeks_contact_page() {
            let links = extractor::extract_links(&home_html, url.as_str());
            if let Some(page) = self.pick_contact_page(ctx, &url, &links).await {
                match self.fetch(&page).await {
                    Ok(html) => {
                        let extra = extractor::extract_candidates(&html, true);
                        self.log_candidates(ctx, "联系页", &extra);
                        candidates.merge(extra);
                    }
                    Err(e) => {
                        let e = ScrapeError::ContactPageFetch {
                            url: page.clone(),
                            reason: e.to_string(),
                        };
                        warn!("{} ⚠️ {}，仅使用主页数据", ctx, e);
                    }
                }
            }
        }

        // ========== 校验 ==========
        if request.validate && !candidates.is_empty() {
            candidates = self.validate(ctx, candidates).await;
        }

        let result = ContactResult::from_candidates(url.as_str(), candidates, request.mode);
        info!("{} ✓ 抽取完成: {}", ctx, result.status);

        self.cache.put(namespace, &url, &result).await;
        Ok(result)
    }

    /// 选出联系页
    ///
    /// AI 失败时按关键词兜底；AI 明确认为没有时不兜底。
    /// 与主页相同的候选会被忽略。
    async fn pick_contact_page(
        &self,
        ctx: &ScrapeCtx,
        home: &NormalizedUrl,
        links: &[String],
    ) -> Option<String> {
        if links.is_empty() {
            debug!("{} 主页没有站内链接，跳过联系页", ctx);
            return None;
        }

        let limited = &links[..links.len().min(MAX_CONTACT_PAGE_LINKS)];
        let ai_pick = self
            .bounded("AI contact page", self.ai.find_contact_page(home.as_str(), limited))
            .await;

        let candidate = match ai_pick {
            Ok(Some(page)) => {
                info!("{} 🤖 AI 推荐联系页: {}", ctx, page);
                page
            }
            Ok(None) => {
                info!("{} 🤖 AI 未找到联系页", ctx);
                return None;
            }
            Err(e) => {
                warn!("{} ⚠️ AI 推荐联系页失败: {}，改用关键词匹配", ctx, e);
                let guess = extractor::guess_contact_page(limited)?;
                info!("{} 🔑 关键词匹配到联系页: {}", ctx, guess);
                guess
            }
        };

        let candidate = Url::parse(home.as_str())
            .and_then(|base| base.join(&candidate))
            .map(|url| url.to_string())
            .unwrap_or(candidate);

        match normalize(&candidate) {
            Ok(normalized) if &normalized == home => {
                debug!("{} 联系页与主页相同，忽略", ctx);
                None
            }
            Ok(_) => Some(candidate),
            Err(e) => {
                warn!("{} ⚠️ 联系页地址无效，忽略: {}", ctx, e);
                None
            }
        }
    }

    /// AI 校验，只能删减候选；失败时保留原数据
    async fn validate(&self, ctx: &ScrapeCtx, mut candidates: ContactCandidates) -> ContactCandidates {
        match self
            .bounded("AI validation", self.ai.validate_contacts(&candidates))
            .await
        {
            Ok(validated) => {
                candidates.retain_validated(&validated);
                info!(
                    "{} 🤖 校验完成: {} 个邮箱, {} 个电话",
                    ctx,
                    candidates.emails.len(),
                    candidates.phones.len()
                );
            }
            Err(e) => warn!("{} ⚠️ AI 校验失败，保留未校验数据: {}", ctx, e),
        }
        candidates
    }

    async fn fetch(&self, url: &str) -> ScrapeResult<String> {
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(Ok(html)) => Ok(html),
            Ok(Err(e)) => Err(ScrapeError::fetch(url, e)),
            Err(_) => Err(ScrapeError::Timeout {
                operation: "page fetch",
                after: self.fetch_timeout,
            }),
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> ScrapeResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.ai_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ScrapeError::ai_service(e)),
            Err(_) => Err(ScrapeError::Timeout {
                operation,
                after: self.ai_timeout,
            }),
        }
    }

    fn log_candidates(&self, ctx: &ScrapeCtx, page: &str, candidates: &ContactCandidates) {
        debug!(
            "{} {}: {} 个邮箱, {} 个电话, {} 个公司主页, {} 个个人主页",
            ctx,
            page,
            candidates.emails.len(),
            candidates.phones.len(),
            candidates.profiles.company.len(),
            candidates.profiles.personal.len()
        );
        if self.verbose_logging && !candidates.emails.is_empty() {
            info!(
                "{}   邮箱: {}",
                ctx,
                truncate_text(&candidates.emails.join(", "), 120)
            );
        }
    }
}
