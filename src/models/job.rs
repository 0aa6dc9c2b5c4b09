use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::JobError;
use crate::models::contact::{ContactResult, ScrapeMode};

pub type JobId = Uuid;

/// 批量任务状态
///
/// 只允许 queued → processing → completed | failed，终态不可再修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// 状态机是否允许 `self → next`
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(JobError::BatchInput(format!("unknown job status '{}'", other))),
        }
    }
}

/// 批量任务记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub mode: ScrapeMode,
    pub validate: bool,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub failed_rows: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub original_filename: String,
    pub website_column: String,
    pub input_path: Option<String>,
    pub output_path: Option<String>,
}

impl Job {
    pub fn new(
        total_rows: usize,
        mode: ScrapeMode,
        validate: bool,
        original_filename: impl Into<String>,
        website_column: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Queued,
            mode,
            validate,
            total_rows,
            processed_rows: 0,
            failed_rows: 0,
            created_at: Utc::now(),
            completed_at: None,
            error: None,
            original_filename: original_filename.into(),
            website_column: website_column.into(),
            input_path: None,
            output_path: None,
        }
    }

    /// 进度百分比，保留两位小数；0 行任务视为 0%
    pub fn progress_percentage(&self) -> f64 {
        if self.total_rows == 0 {
            return 0.0;
        }
        let pct = self.processed_rows as f64 / self.total_rows as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), JobError> {
        if self.status.is_terminal() {
            return Err(JobError::AlreadyFinished(self.id));
        }
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                id: self.id,
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// queued → processing
    pub fn start(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Processing)
    }

    /// 记录一行处理完成，计数只增不减且不超过总行数
    pub fn record_row(&mut self, failed: bool) -> Result<(), JobError> {
        if self.status != JobStatus::Processing {
            return Err(JobError::InvalidTransition {
                id: self.id,
                from: self.status.to_string(),
                to: "row update".to_string(),
            });
        }
        if self.processed_rows < self.total_rows {
            self.processed_rows += 1;
            if failed {
                self.failed_rows += 1;
            }
        }
        Ok(())
    }

    /// processing → completed
    pub fn complete(&mut self, output_path: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobStatus::Completed)?;
        self.output_path = Some(output_path.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// queued | processing → failed
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.id,
            status: self.status,
            total_rows: self.total_rows,
            processed_rows: self.processed_rows,
            failed_rows: self.failed_rows,
            progress_percentage: self.progress_percentage(),
            created_at: self.created_at,
            completed_at: self.completed_at,
            error: self.error.clone(),
            output_path: self.output_path.clone(),
        }
    }
}

/// 对外的任务状态视图
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub failed_rows: usize,
    pub progress_percentage: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

/// 提交批量任务后立即返回的回执
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_rows: usize,
    pub mode: ScrapeMode,
}

impl From<&Job> for SubmitReceipt {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            total_rows: job.total_rows,
            mode: job.mode,
        }
    }
}

/// 单行的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// 抽取流程跑完（结果本身可能是 error 状态）
    Scraped(ContactResult),
    /// 网站单元格为空，未进入抽取流程
    Skipped,
    /// 超时或异常中断
    Aborted(String),
}

impl RowOutcome {
    /// 是否计入失败行数
    pub fn is_failure(&self) -> bool {
        match self {
            RowOutcome::Scraped(result) => result.is_error(),
            RowOutcome::Skipped | RowOutcome::Aborted(_) => true,
        }
    }
}

/// 批量任务输入
#[derive(Debug, Clone)]
pub struct BatchInput {
    /// 原始 CSV 内容
    pub content: Vec<u8>,
    pub filename: String,
    /// 网站列名，为空时使用配置中的默认值
    pub website_column: Option<String>,
    pub mode: ScrapeMode,
    pub validate: bool,
}

impl BatchInput {
    pub fn new(content: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            filename: filename.into(),
            website_column: None,
            mode: ScrapeMode::default(),
            validate: false,
        }
    }

    pub fn with_mode(mut self, mode: ScrapeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_website_column(mut self, column: impl Into<String>) -> Self {
        self.website_column = Some(column.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_lifecycle_and_terminal_guard() {
        let mut job = Job::new(2, ScrapeMode::Fast, false, "sites.csv", "website");
        assert!(job.record_row(false).is_err());

        job.start().unwrap();
        job.record_row(false).unwrap();
        job.record_row(true).unwrap();
        // 超过总行数的更新被忽略
        job.record_row(true).unwrap();
        assert_eq!(job.processed_rows, 2);
        assert_eq!(job.failed_rows, 1);

        job.complete("jobs/x/output/sites_output.csv").unwrap();
        assert!(job.completed_at.is_some());
        assert!(matches!(
            job.fail("late"),
            Err(JobError::AlreadyFinished(_))
        ));
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_progress_percentage() {
        let mut job = Job::new(3, ScrapeMode::Fast, false, "sites.csv", "website");
        assert_eq!(job.progress_percentage(), 0.0);

        job.processed_rows = 1;
        assert_eq!(job.progress_percentage(), 33.33);

        job.processed_rows = 3;
        assert_eq!(job.progress_percentage(), 100.0);

        let empty = Job::new(0, ScrapeMode::Fast, false, "empty.csv", "website");
        assert_eq!(empty.progress_percentage(), 0.0);
    }

    #[test]
    fn test_status_view_is_camel_case() {
        let job = Job::new(2, ScrapeMode::Full, false, "sites.csv", "website");
        let json = serde_json::to_value(job.status_view()).unwrap();

        assert_eq!(json["status"], "queued");
        assert_eq!(json["totalRows"], 2);
        assert_eq!(json["progressPercentage"], 0.0);
        assert!(json.get("outputPath").is_none());
    }
}
