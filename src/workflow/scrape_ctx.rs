//! 抽取请求与上下文
//!
//! 封装"要抽取哪个网站、用什么模式、来自哪个任务的第几行"

use std::fmt::Display;

use crate::models::{JobId, ScrapeMode};

/// 抽取上下文（仅用于日志）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScrapeCtx {
    /// 单次查询
    #[default]
    Lookup,
    /// 批量任务中的某一行（行号从 1 开始）
    Row { job_id: JobId, row: usize },
}

impl Display for ScrapeCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrapeCtx::Lookup => write!(f, "[查询]"),
            ScrapeCtx::Row { job_id, row } => write!(f, "[任务 {} 行 #{}]", job_id, row),
        }
    }
}

/// 单个网站的抽取请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub website: String,
    pub mode: ScrapeMode,
    /// 是否让 AI 校验结果
    pub validate: bool,
    pub ctx: ScrapeCtx,
}

impl ScrapeRequest {
    pub fn new(website: impl Into<String>, mode: ScrapeMode) -> Self {
        Self {
            website: website.into(),
            mode,
            validate: false,
            ctx: ScrapeCtx::Lookup,
        }
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// 标记为批量任务的第 `index` 行（从 0 开始）
    pub fn for_row(mut self, job_id: JobId, index: usize) -> Self {
        self.ctx = ScrapeCtx::Row {
            job_id,
            row: index + 1,
        };
        self
    }
}
