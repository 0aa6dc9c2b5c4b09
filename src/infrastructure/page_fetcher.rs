//! 页面抓取 - 基础设施层
//!
//! 只负责"给一个 URL，拿回 HTML 文本"，不认识联系方式，也不做解析。

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use tracing::debug;

use crate::config::Config;

/// 页面抓取能力
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 抓取页面 HTML；网络错误或非 2xx 状态都返回 Err
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// 基于 reqwest 的 HTTP 抓取器
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("无法创建 HTTP 客户端")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("🌐 抓取页面: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("请求失败: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        response.text().await.context("无法读取响应内容")
    }
}
