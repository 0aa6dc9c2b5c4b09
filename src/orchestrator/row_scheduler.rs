//! 行调度器 - 编排层
//!
//! ## 职责
//!
//! 负责一个批量任务内部的所有行，是任务级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **读取输入**：从存储中取回 CSV，找到网站列
//! 2. **并发控制**：最多 `CSV_CONCURRENT_WORKERS` 行同时跑抽取流程
//! 3. **结果归位**：行结果通过通道带着行号回来，写入按行号索引的数组
//! 4. **进度更新**：每行结束时更新一次计数（唯一写入方）
//! 5. **生成结果**：全部结束后按输入顺序写出结果 CSV
//!
//! 单行的失败（超时、panic、抓取失败）只影响该行。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{JobError, JobResult, ScrapeError};
use crate::infrastructure::{ArtifactStore, JobStore};
use crate::models::{parse_table, Job, JobId, RowOutcome, ScrapeMode};
use crate::services::artifact_writer;
use crate::utils::logging::{log_job_start, print_job_stats};
use crate::workflow::{ScrapeFlow, ScrapeRequest};

/// 任务处理过程中 panic 时写入的错误信息
pub const JOB_CRASHED: &str = "job worker crashed";

pub struct RowScheduler {
    flow: Arc<ScrapeFlow>,
    job_store: Arc<dyn JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    concurrency: usize,
    row_timeout: Duration,
    debug: bool,
}

/// 派发给每一行的共享参数
#[derive(Clone)]
struct RowSettings {
    job_id: JobId,
    mode: ScrapeMode,
    validate: bool,
    row_timeout: Duration,
}

impl RowScheduler {
    pub fn new(
        flow: Arc<ScrapeFlow>,
        job_store: Arc<dyn JobStore>,
        artifacts: Arc<dyn ArtifactStore>,
        config: &Config,
    ) -> Self {
        Self {
            flow,
            job_store,
            artifacts,
            concurrency: config.csv_concurrent_workers.max(1),
            row_timeout: config.row_timeout(),
            debug: config.debug,
        }
    }

    /// 运行一个任务直到终态
    pub async fn run(&self, job_id: JobId) {
        let job = match self.job_store.mark_processing(job_id).await {
            Ok(job) => job,
            Err(e) => {
                error!("[任务 {}] ❌ 无法开始处理: {}", job_id, e);
                return;
            }
        };
        log_job_start(&job);

        let processed = AssertUnwindSafe(self.process(&job)).catch_unwind().await;
        let finished = match processed {
            Ok(Ok(output_path)) => self.job_store.mark_completed(job_id, output_path).await,
            Ok(Err(e)) => {
                error!("[任务 {}] ❌ 任务失败: {}", job_id, e);
                self.job_store.mark_failed(job_id, e.to_string()).await
            }
            Err(_) => {
                error!("[任务 {}] ❌ 处理协程 panic", job_id);
                self.job_store
                    .mark_failed(job_id, JOB_CRASHED.to_string())
                    .await
            }
        };

        match finished {
            Ok(job) => print_job_stats(&job),
            Err(e) => error!("[任务 {}] ❌ 无法更新任务状态: {}", job_id, e),
        }
    }

    async fn process(&self, job: &Job) -> JobResult<String> {
        let input_path = job
            .input_path
            .as_deref()
            .ok_or_else(|| JobError::BatchInput("job has no input file".to_string()))?;

        let content = self.artifacts.get(input_path).await.map_err(|e| {
            JobError::BatchInput(format!("Failed to download CSV from storage: {}", e))
        })?;
        let table = parse_table(&content)?;
        let websites = table.website_cells(&job.website_column)?;
        info!(
            "[任务 {}] CSV 已加载: {} 行, {} 列",
            job.id,
            table.len(),
            table.headers.len()
        );

        let outcomes = self.run_rows(job, websites).await;

        info!("[任务 {}] 所有行处理完成，正在生成结果文件", job.id);
        let rendered = artifact_writer::render_artifact(&table, &outcomes, job.mode, self.debug)?;
        let output_path = artifact_writer::output_path(job.id, &job.original_filename);
        self.artifacts.put(&output_path, rendered).await?;
        info!("[任务 {}] ✓ 结果文件已保存: {}", job.id, output_path);

        Ok(output_path)
    }

    /// 并发处理所有行，返回按行号排列的结果
    async fn run_rows(&self, job: &Job, websites: Vec<String>) -> Vec<RowOutcome> {
        let total = websites.len();
        let mut arena: Vec<Option<RowOutcome>> = vec![None; total];

        let (sender, mut receiver) = mpsc::channel(self.concurrency);
        let settings = RowSettings {
            job_id: job.id,
            mode: job.mode,
            validate: job.validate,
            row_timeout: self.row_timeout,
        };
        let dispatcher = tokio::spawn(dispatch_rows(
            self.flow.clone(),
            Arc::new(Semaphore::new(self.concurrency)),
            sender,
            websites,
            settings,
        ));

        while let Some((index, outcome)) = receiver.recv().await {
            let failed = outcome.is_failure();
            match &outcome {
                RowOutcome::Scraped(result) if !failed => {
                    debug!("[任务 {}] 行 #{} 完成: {}", job.id, index + 1, result.status)
                }
                RowOutcome::Scraped(result) => warn!(
                    "[任务 {}] ⚠️ 行 #{} 失败: {}",
                    job.id,
                    index + 1,
                    result.error.as_deref().unwrap_or("unknown error")
                ),
                RowOutcome::Skipped => warn!("[任务 {}] ⚠️ 行 #{} 网站为空，跳过", job.id, index + 1),
                RowOutcome::Aborted(reason) => {
                    error!("[任务 {}] ❌ 行 #{} 中断: {}", job.id, index + 1, reason)
                }
            }

            match self.job_store.record_row(job.id, failed).await {
                Ok(progress) => debug!(
                    "[任务 {}] 进度: {}/{}",
                    job.id, progress.processed_rows, progress.total_rows
                ),
                Err(e) => warn!("[任务 {}] ⚠️ 无法更新进度: {}", job.id, e),
            }

            if let Some(slot) = arena.get_mut(index) {
                *slot = Some(outcome);
            }
        }

        if let Err(e) = dispatcher.await {
            error!("[任务 {}] ❌ 行调度协程异常退出: {}", job.id, e);
        }

        arena
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| RowOutcome::Aborted("row result missing".to_string())))
            .collect()
    }
}

/// 按顺序派发行；空行直接回报，其余行先拿许可再 spawn
async fn dispatch_rows(
    flow: Arc<ScrapeFlow>,
    semaphore: Arc<Semaphore>,
    sender: mpsc::Sender<(usize, RowOutcome)>,
    websites: Vec<String>,
    settings: RowSettings,
) {
    for (index, website) in websites.into_iter().enumerate() {
        if website.trim().is_empty() {
            if sender.send((index, RowOutcome::Skipped)).await.is_err() {
                return;
            }
            continue;
        }

        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            return;
        };

        let flow = flow.clone();
        let sender = sender.clone();
        let settings = settings.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let outcome = run_row(&flow, website, index, &settings).await;
            let _ = sender.send((index, outcome)).await;
        });
    }
}

async fn run_row(flow: &ScrapeFlow, website: String, index: usize, settings: &RowSettings) -> RowOutcome {
    let request = ScrapeRequest::new(website, settings.mode)
        .with_validate(settings.validate)
        .for_row(settings.job_id, index);

    let guarded = AssertUnwindSafe(flow.run(&request)).catch_unwind();
    match tokio::time::timeout(settings.row_timeout, guarded).await {
        Ok(Ok(result)) => RowOutcome::Scraped(result),
        Ok(Err(panic)) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            RowOutcome::Aborted(ScrapeError::Row { index, reason }.to_string())
        }
        Err(_) => RowOutcome::Aborted(
            ScrapeError::Timeout {
                operation: "row processing",
                after: settings.row_timeout,
            }
            .to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{MemoryArtifactStore, MemoryJobStore, MemoryKvStore};
    use crate::models::JobStatus;
    use crate::testing::{OutputRejectingStore, ScriptedAi, StaticFetcher};

    struct Harness {
        scheduler: RowScheduler,
        job_store: Arc<MemoryJobStore>,
        artifacts: Arc<dyn ArtifactStore>,
    }

    fn harness(fetcher: Arc<StaticFetcher>, artifacts: Arc<dyn ArtifactStore>, config: Config) -> Harness {
        let flow = Arc::new(ScrapeFlow::new(
            fetcher,
            Arc::new(ScriptedAi::new()),
            Arc::new(MemoryKvStore::new()),
            &config,
        ));
        let job_store = Arc::new(MemoryJobStore::new());
        let scheduler = RowScheduler::new(flow, job_store.clone(), artifacts.clone(), &config);
        Harness {
            scheduler,
            job_store,
            artifacts,
        }
    }

    async fn queue_job(h: &Harness, csv: &str, rows: usize) -> JobId {
        let mut job = Job::new(rows, ScrapeMode::Fast, false, "sites.csv", "website");
        let path = artifact_writer::input_path(job.id, "sites.csv");
        h.artifacts.put(&path, csv.as_bytes().to_vec()).await.unwrap();
        job.input_path = Some(path);
        let id = job.id;
        h.job_store.insert(job).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_rows_keep_input_order() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .page("http://a.com", "<p>a@a.com</p>")
                .page("http://c.com", "<p>c@c.com</p>")
                .failing("http://b.com"),
        );
        let h = harness(fetcher, Arc::new(MemoryArtifactStore::new()), Config::default());
        let id = queue_job(&h, "website,name\na.com,A\nb.com,B\n,Blank\nc.com,C\n", 4).await;

        h.scheduler.run(id).await;

        let job = h.job_store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed_rows, 4);
        assert_eq!(job.failed_rows, 2);

        let output = h.artifacts.get(job.output_path.as_deref().unwrap()).await.unwrap();
        let table = parse_table(&output).unwrap();
        let statuses: Vec<&str> = table.rows.iter().map(|r| r[2].as_str()).collect();
        assert_eq!(statuses, vec!["success", "error", "skipped", "success"]);
        assert_eq!(table.rows[3][1], "C");
        assert_eq!(table.rows[3][4], "c@c.com");
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let mut fetcher = StaticFetcher::new().with_delay(Duration::from_millis(30));
        let mut csv = String::from("website\n");
        for i in 0..12 {
            fetcher = fetcher.page(&format!("http://site{}.com", i), "<p>x</p>");
            csv.push_str(&format!("site{}.com\n", i));
        }
        let fetcher = Arc::new(fetcher);
        let config = Config {
            csv_concurrent_workers: 3,
            ..Config::default()
        };
        let h = harness(fetcher.clone(), Arc::new(MemoryArtifactStore::new()), config);
        let id = queue_job(&h, &csv, 12).await;

        h.scheduler.run(id).await;

        assert_eq!(fetcher.calls(), 12);
        assert!(fetcher.peak_concurrency() <= 3);
        assert_eq!(h.job_store.get(id).await.unwrap().processed_rows, 12);
    }

    #[tokio::test]
    async fn test_panicking_row_is_isolated() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .page("http://ok.com", "<p>ok@ok.com</p>")
                .panicking("http://boom.com"),
        );
        let h = harness(fetcher, Arc::new(MemoryArtifactStore::new()), Config::default());
        let id = queue_job(&h, "website\nboom.com\nok.com\n", 2).await;

        h.scheduler.run(id).await;

        let job = h.job_store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.failed_rows, 1);
        assert_eq!(job.processed_rows, 2);
    }

    #[tokio::test]
    async fn test_missing_column_fails_job() {
        let h = harness(
            Arc::new(StaticFetcher::new()),
            Arc::new(MemoryArtifactStore::new()),
            Config::default(),
        );
        let id = queue_job(&h, "url,name\na.com,A\n", 1).await;

        h.scheduler.run(id).await;

        let job = h.job_store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert!(error.contains("'website'"));
        assert!(error.contains("url, name"));
    }

    #[tokio::test]
    async fn test_unstorable_output_fails_job() {
        let fetcher = Arc::new(StaticFetcher::new().page("http://a.com", "<p>a@a.com</p>"));
        let h = harness(fetcher, Arc::new(OutputRejectingStore::new()), Config::default());
        let id = queue_job(&h, "website\na.com\n", 1).await;

        h.scheduler.run(id).await;

        let job = h.job_store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.processed_rows, 1);
        assert!(job.output_path.is_none());
    }

    /// 写结果文件时 panic 的存储
    #[derive(Default)]
    struct PanickingOutputStore {
        inner: MemoryArtifactStore,
    }

    #[async_trait::async_trait]
    impl ArtifactStore for PanickingOutputStore {
        async fn put(&self, path: &str, content: Vec<u8>) -> JobResult<()> {
            if path.contains("/output/") {
                panic!("disk driver exploded");
            }
            self.inner.put(path, content).await
        }

        async fn get(&self, path: &str) -> JobResult<Vec<u8>> {
            self.inner.get(path).await
        }
    }

    #[tokio::test]
    async fn test_panicking_job_is_marked_failed() {
        let fetcher = Arc::new(StaticFetcher::new().page("http://a.com", "<p>a@a.com</p>"));
        let h = harness(fetcher, Arc::new(PanickingOutputStore::default()), Config::default());
        let id = queue_job(&h, "website\na.com\n", 1).await;

        h.scheduler.run(id).await;

        let job = h.job_store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(JOB_CRASHED));
        assert!(job.output_path.is_none());
    }
}
