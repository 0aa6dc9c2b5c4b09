//! 任务管理器 - 编排层
//!
//! 批量任务的对外入口：提交、查询、列出、下载结果。
//! 提交时只做最少的检查（能否解析成表格），网站列的检查留给行调度器，
//! 缺列的任务会以 `failed` 结束并带上可用列名。

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{error, info};

use crate::error::{JobError, JobResult};
use crate::infrastructure::{ArtifactStore, JobStore};
use crate::models::{parse_table, BatchInput, Job, JobId, JobStatus, JobStatusView, SubmitReceipt};
use crate::orchestrator::row_scheduler::RowScheduler;
use crate::orchestrator::worker_pool::{PoolStats, WorkerPool};
use crate::services::artifact_writer;

/// 列表接口的默认条数
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// 提交结果：回执 + 任务结束通知
#[derive(Debug)]
pub struct JobHandle {
    pub receipt: SubmitReceipt,
    /// 任务进入终态后收到 `()`
    pub finished: oneshot::Receiver<()>,
}

pub struct JobManager {
    job_store: Arc<dyn JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    pool: WorkerPool,
    scheduler: Arc<RowScheduler>,
    default_column: String,
}

impl JobManager {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        artifacts: Arc<dyn ArtifactStore>,
        pool: WorkerPool,
        scheduler: Arc<RowScheduler>,
        default_column: impl Into<String>,
    ) -> Self {
        Self {
            job_store,
            artifacts,
            pool,
            scheduler,
            default_column: default_column.into(),
        }
    }

    /// 提交批量任务
    ///
    /// 保存输入文件、创建 `queued` 任务并排入任务池，立即返回。
    pub async fn submit(&self, input: BatchInput) -> JobResult<JobHandle> {
        if self.pool.is_closed() {
            return Err(JobError::PoolClosed);
        }
        let table = parse_table(&input.content)?;
        let column = input
            .website_column
            .clone()
            .unwrap_or_else(|| self.default_column.clone());

        let mut job = Job::new(
            table.len(),
            input.mode,
            input.validate,
            input.filename.clone(),
            column,
        );
        let job_id = job.id;

        let path = artifact_writer::input_path(job_id, &input.filename);
        self.artifacts.put(&path, input.content).await?;
        job.input_path = Some(path);

        let receipt = SubmitReceipt::from(&job);
        self.job_store.insert(job).await?;
        info!(
            "[任务 {}] 📥 已提交: {} ({} 行, 模式 {})",
            job_id, input.filename, receipt.total_rows, receipt.mode
        );

        let scheduler = self.scheduler.clone();
        let finished = self
            .pool
            .submit(job_id, async move { scheduler.run(job_id).await })
            .map_err(|e| {
                error!("[任务 {}] ❌ 无法排入任务池: {}", job_id, e);
                e
            })?;

        Ok(JobHandle { receipt, finished })
    }

    pub async fn status(&self, id: JobId) -> JobResult<JobStatusView> {
        Ok(self.job_store.get(id).await?.status_view())
    }

    /// 列出任务（按创建时间倒序）
    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: Option<usize>,
    ) -> JobResult<Vec<JobStatusView>> {
        let jobs = self
            .job_store
            .list(status, limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .await?;
        Ok(jobs.iter().map(Job::status_view).collect())
    }

    /// 下载结果文件，返回 (文件名, 内容)
    pub async fn download(&self, id: JobId) -> JobResult<(String, Vec<u8>)> {
        let job = self.job_store.get(id).await?;
        let output_path = match (&job.status, &job.output_path) {
            (JobStatus::Completed, Some(path)) => path.clone(),
            _ => {
                return Err(JobError::NotCompleted {
                    id,
                    status: job.status.to_string(),
                })
            }
        };

        let content = self.artifacts.get(&output_path).await?;
        let filename = output_path
            .rsplit('/')
            .next()
            .unwrap_or(output_path.as_str())
            .to_string();
        Ok((filename, content))
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}
