use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;

use crate::error::{JobError, JobResult};
use crate::models::job::BatchInput;

/// 解析后的批量输入表格
///
/// 每一行都补齐到表头长度，缺失单元格为空字符串。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl BatchTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// 取出网站列的所有单元格（已去除首尾空白）
    ///
    /// 列不存在时返回的错误信息会列出所有可用列名。
    pub fn website_cells(&self, column: &str) -> JobResult<Vec<String>> {
        let index = self.column_index(column).ok_or_else(|| {
            JobError::BatchInput(format!(
                "CSV must contain a '{}' column. Available columns: {}",
                column,
                self.headers.join(", ")
            ))
        })?;

        Ok(self
            .rows
            .iter()
            .map(|row| row.get(index).map(|c| c.trim().to_string()).unwrap_or_default())
            .collect())
    }
}

/// 从内存中的 CSV 内容解析表格
pub fn parse_table(content: &[u8]) -> JobResult<BatchTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(JobError::BatchInput("CSV has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len().max(row.len()), String::new());
        rows.push(row);
    }

    Ok(BatchTable { headers, rows })
}

/// 从本地文件加载批量任务输入
pub async fn load_csv_file(path: &Path) -> Result<BatchInput> {
    let content = fs::read(path)
        .await
        .with_context(|| format!("无法读取CSV文件: {}", path.display()))?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "input.csv".to_string());

    tracing::info!("正在加载: {} ({} 字节)", filename, content.len());

    Ok(BatchInput::new(content, filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_pads_short_rows() {
        let table = parse_table(b"name,website\nAcme,acme.com\nBeta\n").unwrap();

        assert_eq!(table.headers, vec!["name", "website"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1], vec!["Beta", ""]);
        assert_eq!(
            table.website_cells("website").unwrap(),
            vec!["acme.com", ""]
        );
    }

    #[test]
    fn test_missing_column_lists_available() {
        let table = parse_table(b"name,url\nAcme,acme.com\n").unwrap();
        let err = table.website_cells("website").unwrap_err();

        let message = err.to_string();
        assert!(message.contains("'website'"));
        assert!(message.contains("name, url"));
    }

    #[test]
    fn test_header_only_has_no_rows() {
        let table = parse_table(b"website\n").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_empty_content_rejected() {
        assert!(parse_table(b"").is_err());
    }

    #[tokio::test]
    async fn test_load_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companies.csv");
        std::fs::write(&path, "website\nexample.com\n").unwrap();

        let input = load_csv_file(&path).await.unwrap();
        assert_eq!(input.filename, "companies.csv");
        assert_eq!(parse_table(&input.content).unwrap().len(), 1);
    }
}
