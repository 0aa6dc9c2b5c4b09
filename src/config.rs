use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// 程序配置
///
/// 构造后不可变，按值（或 `Arc`）传给各个组件，不存在全局配置。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 调试模式：结果 CSV 额外输出 error 列
    pub debug: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,

    // --- 缓存 ---
    /// 缓存 TTL（秒），每个部署固定
    pub cache_ttl_secs: u64,
    /// 单次缓存读写的超时（秒）
    pub cache_timeout_secs: u64,

    // --- AI ---
    pub openai_api_key: String,
    pub openai_api_base_url: String,
    pub openai_model: String,
    pub openai_timeout_secs: u64,

    // --- 页面抓取 ---
    pub request_timeout_secs: u64,
    pub user_agent: String,

    // --- 并发 ---
    /// 同时运行的批量任务数量
    pub max_workers: usize,
    /// 每个批量任务内同时处理的行数
    pub csv_concurrent_workers: usize,
    /// 单行处理的总超时（秒）
    pub row_timeout_secs: u64,

    // --- 批量输入输出 ---
    /// 默认网站列名
    pub website_column: String,
    /// 本地存储根目录
    pub artifact_root: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            verbose_logging: false,
            cache_ttl_secs: 86_400,
            cache_timeout_secs: 2,
            openai_api_key: String::new(),
            openai_api_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4.1-mini".to_string(),
            openai_timeout_secs: 20,
            request_timeout_secs: 10,
            user_agent: "Mozilla/5.0".to_string(),
            max_workers: 2,
            csv_concurrent_workers: 10,
            row_timeout_secs: 120,
            website_column: "website".to_string(),
            artifact_root: "storage".to_string(),
        }
    }
}

impl Config {
    /// 只从环境变量加载（未设置的使用默认值）
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，再用环境变量覆盖
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
                toml::from_str::<Config>(&content)
                    .with_context(|| format!("无法解析配置文件: {}", path.display()))?
            }
            None => Self::default(),
        };

        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 用环境变量覆盖当前值
    ///
    /// 无法解析的值会打印警告并保留原值。
    pub fn with_env_overrides(self) -> Self {
        Self {
            debug: env_parse("DEBUG", self.debug),
            verbose_logging: env_parse("VERBOSE_LOGGING", self.verbose_logging),
            cache_ttl_secs: env_parse("CACHE_TTL", self.cache_ttl_secs),
            cache_timeout_secs: env_parse("CACHE_TIMEOUT", self.cache_timeout_secs),
            openai_api_key: env_string("OPENAI_API_KEY", self.openai_api_key),
            openai_api_base_url: env_string("OPENAI_API_BASE_URL", self.openai_api_base_url),
            openai_model: env_string("OPENAI_MODEL", self.openai_model),
            openai_timeout_secs: env_parse("OPENAI_TIMEOUT", self.openai_timeout_secs),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT", self.request_timeout_secs),
            user_agent: env_string("USER_AGENT", self.user_agent),
            max_workers: env_parse("MAX_WORKERS", self.max_workers),
            csv_concurrent_workers: env_parse("CSV_CONCURRENT_WORKERS", self.csv_concurrent_workers),
            row_timeout_secs: env_parse("ROW_TIMEOUT", self.row_timeout_secs),
            website_column: env_string("WEBSITE_COLUMN", self.website_column),
            artifact_root: env_string("ARTIFACT_ROOT", self.artifact_root),
        }
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            anyhow::bail!("MAX_WORKERS 必须大于 0");
        }
        if self.csv_concurrent_workers == 0 {
            anyhow::bail!("CSV_CONCURRENT_WORKERS 必须大于 0");
        }
        if self.website_column.trim().is_empty() {
            anyhow::bail!("WEBSITE_COLUMN 不能为空");
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_timeout_secs)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.openai_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn row_timeout(&self) -> Duration {
        Duration::from_secs(self.row_timeout_secs)
    }
}

fn env_string(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("⚠️ 环境变量 {} 的值 '{}' 无法解析，使用默认值", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment_settings() {
        let config = Config::default();
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.csv_concurrent_workers, 10);
        assert_eq!(config.cache_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.website_column, "website");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("max_workers = 4\ndebug = true\n").unwrap();
        assert_eq!(config.max_workers, 4);
        assert!(config.debug);
        assert_eq!(config.csv_concurrent_workers, 10);
        assert_eq!(config.openai_model, "gpt-4.1-mini");
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = Config {
            csv_concurrent_workers: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraper.toml");
        std::fs::write(&path, "cache_ttl_secs = 60\nwebsite_column = \"url\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.website_column, "url");
    }
}
