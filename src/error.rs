//! 错误类型
//!
//! 分两类：
//! - `ScrapeError`：单个网站抽取流程中的错误（大部分在流程内部降级处理）
//! - `JobError`：批量任务生命周期中的错误
//!
//! 错误信息会出现在对外的 JSON / CSV 结果里，所以 Display 文本保持英文。

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// 主页抓取失败时对外返回的固定错误信息
pub const HOMEPAGE_FETCH_FAILED: &str = "homepage fetch failed";

/// 单个网站抽取流程的错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScrapeError {
    /// 网站为空或无法解析，立即返回，不重试
    #[error("invalid website: {0}")]
    InvalidInput(String),

    /// 主页无法访问，对当前行/请求是致命的
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// 联系页抓取失败，回退到仅主页数据
    #[error("contact page fetch failed for {url}: {reason}")]
    ContactPageFetch { url: String, reason: String },

    /// AI 服务不可用或返回无法解析的内容
    #[error("AI service error: {0}")]
    AiService(String),

    /// 缓存后端错误，降级为无缓存路径
    #[error("cache backend error: {0}")]
    CacheBackend(String),

    /// 批量任务中某一行的错误，只影响该行
    #[error("row {index} failed: {reason}")]
    Row { index: usize, reason: String },

    /// 外部调用超时
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl ScrapeError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ScrapeError::InvalidInput(msg.into())
    }

    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        ScrapeError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn ai_service(source: impl ToString) -> Self {
        ScrapeError::AiService(source.to_string())
    }

    pub fn cache_backend(source: impl ToString) -> Self {
        ScrapeError::CacheBackend(source.to_string())
    }

    /// 是否为"输入错误"（调用方的问题，不是系统的问题）
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, ScrapeError::InvalidInput(_))
    }
}

/// 批量任务错误
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    /// 任务已经处于终态，不允许再修改
    #[error("job {0} is already finished")]
    AlreadyFinished(Uuid),

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: String,
        to: String,
    },

    /// 批量输入无法读取（表格损坏、缺少网站列等）
    #[error("{0}")]
    BatchInput(String),

    /// 存储服务读写失败
    #[error("storage error at {path}: {reason}")]
    Storage { path: String, reason: String },

    /// 任务尚未完成，没有可下载的结果
    #[error("job {id} is not completed yet. Current status: {status}")]
    NotCompleted { id: Uuid, status: String },

    /// 调度器已停止，无法接收新任务
    #[error("worker pool is shut down")]
    PoolClosed,
}

impl JobError {
    pub fn storage(path: impl Into<String>, reason: impl ToString) -> Self {
        JobError::Storage {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<csv::Error> for JobError {
    fn from(err: csv::Error) -> Self {
        JobError::BatchInput(format!("failed to read CSV: {}", err))
    }
}

// ========== Result 类型别名 ==========

/// 抽取流程结果类型
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// 批量任务结果类型
pub type JobResult<T> = Result<T, JobError>;
