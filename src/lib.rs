//! # Contact Scraper
//!
//! 从公司网站抽取联系方式（邮箱、电话、LinkedIn 主页）的 Rust 库，
//! 支持单次查询和基于 CSV 的批量任务。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `PageFetcher` - 抓取网页原始内容
//! - `KvStore` / `JobStore` / `ArtifactStore` - 缓存、任务记录、文件存储
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个网站
//! - `normalize` - 网址规范化
//! - `extractor` - 规则抽取邮箱 / 电话 / 主页链接
//! - `AiAssistant` - 推荐联系页、校验抽取结果
//! - `CacheGateway` - 按模式分命名空间的缓存读写
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个网站"的完整处理流程
//! - `ScrapeRequest` - 请求与上下文封装（job_id + 行号）
//! - `ScrapeFlow` - 流程编排（缓存 → 主页 → 联系页 → 校验 → 缓存）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/job_manager` - 批量任务的提交、查询、下载
//! - `orchestrator/worker_pool` - 全局任务并发控制
//! - `orchestrator/row_scheduler` - 单个任务内的行并发控制
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod testing;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{JobError, JobResult, ScrapeError, ScrapeResult};
pub use models::{BatchInput, ContactResult, Job, JobId, JobStatus, JobStatusView, ScrapeMode};
pub use orchestrator::{App, Collaborators, JobHandle};
pub use services::{normalize, NormalizedUrl};
pub use workflow::{ScrapeFlow, ScrapeRequest};
