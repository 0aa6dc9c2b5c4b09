//! 任务存储 - 基础设施层
//!
//! 状态机规则在 `Job` 上，这里只负责按 id 加锁读写。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{JobError, JobResult};
use crate::models::{Job, JobId, JobStatus};

/// 任务记录存储
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: Job) -> JobResult<()>;

    async fn get(&self, id: JobId) -> JobResult<Job>;

    /// 按创建时间倒序列出任务
    async fn list(&self, status: Option<JobStatus>, limit: usize) -> JobResult<Vec<Job>>;

    async fn mark_processing(&self, id: JobId) -> JobResult<Job>;

    async fn record_row(&self, id: JobId, failed: bool) -> JobResult<Job>;

    async fn mark_completed(&self, id: JobId, output_path: String) -> JobResult<Job>;

    async fn mark_failed(&self, id: JobId, error: String) -> JobResult<Job>;
}

/// 进程内任务存储
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify<F>(&self, id: JobId, f: F) -> JobResult<Job>
    where
        F: FnOnce(&mut Job) -> JobResult<()> + Send,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        f(job)?;
        Ok(job.clone())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: Job) -> JobResult<()> {
        self.jobs.write().await.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: JobId) -> JobResult<Job> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }

    async fn list(&self, status: Option<JobStatus>, limit: usize) -> JobResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut matched: Vec<Job> = jobs
            .values()
            .filter(|job| status.map_or(true, |s| job.status == s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit);
        Ok(matched)
    }

    async fn mark_processing(&self, id: JobId) -> JobResult<Job> {
        self.modify(id, |job| job.start()).await
    }

    async fn record_row(&self, id: JobId, failed: bool) -> JobResult<Job> {
        self.modify(id, |job| job.record_row(failed)).await
    }

    async fn mark_completed(&self, id: JobId, output_path: String) -> JobResult<Job> {
        self.modify(id, |job| job.complete(output_path)).await
    }

    async fn mark_failed(&self, id: JobId, error: String) -> JobResult<Job> {
        self.modify(id, |job| job.fail(error)).await
    }
}
