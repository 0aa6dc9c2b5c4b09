//! 结果文件生成 - 业务能力层
//!
//! 只负责"把每行的结果写成 CSV"，不关心行是如何并发处理的。
//! 原始列（包括超出表头的单元格）原样保留，结果列追加在后面，行顺序与输入一致。

use std::path::Path;

use tracing::debug;

use crate::error::{JobError, JobResult};
use crate::models::{BatchTable, ContactResult, JobId, RowOutcome, ScrapeMode};

const EMPTY_WEBSITE: &str = "Empty website URL";
const MAX_CONTACT_COLUMNS: usize = 3;

/// 输入文件在存储中的路径：`jobs/{id}/input/{filename}`
pub fn input_path(job_id: JobId, filename: &str) -> String {
    format!("jobs/{}/input/{}", job_id, safe_file_name(filename))
}

/// 结果文件在存储中的路径：`jobs/{id}/output/{stem}_output.csv`
pub fn output_path(job_id: JobId, filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "input".to_string());
    format!("jobs/{}/output/{}_output.csv", job_id, stem)
}

/// 追加的结果列名
pub fn result_columns(mode: ScrapeMode, debug: bool) -> Vec<&'static str> {
    let mut columns = match mode {
        ScrapeMode::ProfileOnly => vec!["company_linkedin", "personal_linkedin", "scrape_status"],
        ScrapeMode::Full | ScrapeMode::Fast => vec![
            "scrape_status",
            "raw_json_response",
            "email1",
            "email2",
            "email3",
            "phone1",
            "phone2",
            "phone3",
            "company_linkedin_url",
            "personal_linkedin_url",
        ],
    };
    if debug {
        columns.push("error");
    }
    columns
}

/// 渲染结果 CSV
///
/// `outcomes[i]` 对应 `table.rows[i]`。
pub fn render_artifact(
    table: &BatchTable,
    outcomes: &[RowOutcome],
    mode: ScrapeMode,
    debug: bool,
) -> JobResult<Vec<u8>> {
    if outcomes.len() != table.rows.len() {
        return Err(JobError::BatchInput(format!(
            "row count mismatch: {} rows, {} outcomes",
            table.rows.len(),
            outcomes.len()
        )));
    }

    // 比表头长的行保留多出的单元格，表头用空列名补齐
    let width = table
        .rows
        .iter()
        .map(Vec::len)
        .fold(table.headers.len(), usize::max);

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = table.headers.iter().map(String::as_str).collect();
    header.resize(width, "");
    header.extend(result_columns(mode, debug));
    writer.write_record(&header)?;

    for (row, outcome) in table.rows.iter().zip(outcomes) {
        let mut record = row.clone();
        record.resize(width, String::new());
        record.extend(result_cells(outcome, mode, debug));
        writer.write_record(&record)?;
    }

    let content = writer
        .into_inner()
        .map_err(|e| JobError::BatchInput(format!("failed to render CSV: {}", e.error())))?;
    debug!("结果 CSV 已生成: {} 行, {} 字节", outcomes.len(), content.len());
    Ok(content)
}

fn result_cells(outcome: &RowOutcome, mode: ScrapeMode, debug: bool) -> Vec<String> {
    let (mut cells, error) = match mode {
        ScrapeMode::ProfileOnly => profile_cells(outcome),
        ScrapeMode::Full | ScrapeMode::Fast => contact_cells(outcome),
    };
    if debug {
        cells.push(error.unwrap_or_default());
    }
    cells
}

fn contact_cells(outcome: &RowOutcome) -> (Vec<String>, Option<String>) {
    let mut cells = vec![String::new(); 10];
    match outcome {
        RowOutcome::Skipped => {
            cells[0] = "skipped".to_string();
            (cells, Some(EMPTY_WEBSITE.to_string()))
        }
        RowOutcome::Aborted(reason) => {
            cells[0] = "error".to_string();
            (cells, Some(reason.clone()))
        }
        RowOutcome::Scraped(result) => {
            cells[0] = result.status.to_string();
            cells[1] = serde_json::to_string(result).unwrap_or_default();
            fill_slots(&mut cells[2..5], result.emails());
            fill_slots(&mut cells[5..8], result.phones());
            cells[8] = result.company_profiles().first().cloned().unwrap_or_default();
            cells[9] = result.personal_profiles().join(", ");
            (cells, result.error.clone())
        }
    }
}

fn profile_cells(outcome: &RowOutcome) -> (Vec<String>, Option<String>) {
    match outcome {
        RowOutcome::Skipped => (
            vec![String::new(), String::new(), "skipped".to_string()],
            Some(EMPTY_WEBSITE.to_string()),
        ),
        RowOutcome::Aborted(reason) => (
            vec![String::new(), String::new(), "error".to_string()],
            Some(reason.clone()),
        ),
        RowOutcome::Scraped(result) => (profile_row(result), result.error.clone()),
    }
}

fn profile_row(result: &ContactResult) -> Vec<String> {
    vec![
        result.company_profiles().join(", "),
        result.personal_profiles().join(", "),
        result.status.to_string(),
    ]
}

fn fill_slots(slots: &mut [String], values: &[String]) {
    for (slot, value) in slots.iter_mut().zip(values.iter().take(MAX_CONTACT_COLUMNS)) {
        *slot = value.clone();
    }
}

fn safe_file_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "input.csv".to_string())
}
