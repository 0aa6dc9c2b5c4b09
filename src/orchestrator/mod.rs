//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量任务和并发调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 组装配置与协作者
//! - 单次查询直接调用 ScrapeFlow
//! - 批量相关请求转交 JobManager
//!
//! ### `job_manager` - 任务管理器
//! - 保存输入文件、登记任务
//! - 查询 / 列出任务、下载结果
//!
//! ### `worker_pool` - 全局任务池
//! - 最多 `MAX_WORKERS` 个任务同时运行（Semaphore）
//! - FIFO 放行，不抢占
//!
//! ### `row_scheduler` - 行调度器
//! - 每个任务内最多 `CSV_CONCURRENT_WORKERS` 行同时处理
//! - 按行号收集结果、更新进度、生成结果文件
//!
//! ## 层次关系
//!
//! ```text
//! app
//!     ↓
//! job_manager → worker_pool (处理 Vec<Job>)
//!     ↓
//! row_scheduler (处理一个任务的所有行)
//!     ↓
//! workflow::ScrapeFlow (处理单个网站)
//!     ↓
//! services (能力层：normalize / extract / AI / cache)
//!     ↓
//! infrastructure (基础设施：fetcher / stores)
//! ```
//!
//! ## 设计原则
//!
//! 1. **两级并发**：任务池限制任务数，行调度器限制行数，互不嵌套
//! 2. **唯一写入方**：任务运行期间只有它的行调度器更新进度
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做抽取判断

pub mod app;
pub mod job_manager;
pub mod row_scheduler;
pub mod worker_pool;

// 重新导出主要类型
pub use app::{App, Collaborators};
pub use job_manager::{JobHandle, JobManager, DEFAULT_LIST_LIMIT};
pub use row_scheduler::RowScheduler;
pub use worker_pool::{PoolStats, WorkerPool};
