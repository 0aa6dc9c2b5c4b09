/// 日志工具模块
///
/// 提供日志初始化以及格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use crate::config::Config;
use crate::models::{Job, JobStatus};

/// 已安装日志的级别句柄
///
/// 日志要在读取配置之前初始化（配置解析时的警告才能输出），
/// 配置里的 `verbose_logging` 通过这个句柄事后生效。
pub struct LogHandle {
    filter: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogHandle {
    /// 切换 debug 级别；设置了 `RUST_LOG` 时保持不变
    pub fn set_verbose(&self, verbose: bool) {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        if let Some(filter) = &self.filter {
            let _ = filter.reload(level_filter(verbose));
        }
    }
}

/// 初始化 tracing 日志
///
/// `RUST_LOG` 优先；否则默认 `contact_scraper=info`，
/// `verbose` 为 true 时提升到 debug。
/// 重复调用是安全的（测试中会多次调用），只有第一次安装的句柄可用。
pub fn init(verbose: bool) -> LogHandle {
    let (subscriber, handle) = build_subscriber(verbose, std::io::stdout);
    let installed = subscriber.try_init().is_ok();
    LogHandle {
        filter: installed.then_some(handle),
    }
}

fn build_subscriber<W>(
    verbose: bool,
    writer: W,
) -> (
    impl tracing::Subscriber + Send + Sync + 'static,
    reload::Handle<EnvFilter, Registry>,
)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(level_filter(verbose));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(writer));
    (subscriber, handle)
}

fn level_filter(verbose: bool) -> EnvFilter {
    let default_directive = if verbose {
        "contact_scraper=debug"
    } else {
        "contact_scraper=info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 联系方式抽取服务");
    info!("📊 最大并发任务数: {}", config.max_workers);
    info!("📊 每个任务的并发行数: {}", config.csv_concurrent_workers);
    info!("🤖 AI 模型: {}", config.openai_model);
    info!("{}", "=".repeat(60));
}

/// 记录任务开始信息
pub fn log_job_start(job: &Job) {
    info!("\n{}", "=".repeat(60));
    info!("[任务 {}] 📦 开始处理", job.id);
    info!("[任务 {}] 文件: {}", job.id, job.original_filename);
    info!("[任务 {}] 模式: {}", job.id, job.mode);
    info!("[任务 {}] 行数: {}", job.id, job.total_rows);
    info!("{}", "=".repeat(60));
}

/// 打印任务最终统计信息
pub fn print_job_stats(job: &Job) {
    info!("\n{}", "─".repeat(60));
    info!("[任务 {}] 📊 处理完成统计", job.id);
    if let Some(completed_at) = job.completed_at {
        info!(
            "[任务 {}] 完成时间: {}",
            job.id,
            completed_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    let succeeded = job.processed_rows.saturating_sub(job.failed_rows);
    info!("[任务 {}] ✅ 成功: {}/{}", job.id, succeeded, job.total_rows);
    info!("[任务 {}] ❌ 失败: {}", job.id, job.failed_rows);
    match job.status {
        JobStatus::Failed => info!(
            "[任务 {}] 任务失败: {}",
            job.id,
            job.error.as_deref().unwrap_or("未知错误")
        ),
        _ => {
            if let Some(path) = &job.output_path {
                info!("[任务 {}] 结果已保存至: {}", job.id, path);
            }
        }
    }
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_config_warnings_reach_log_installed_first() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let buffer = SharedBuffer::default();
        let sink = buffer.clone();
        let (subscriber, _) = build_subscriber(false, move || sink.clone());

        std::env::set_var("CACHE_TIMEOUT", "soon");
        let config = tracing::subscriber::with_default(subscriber, || Config::load(None));
        std::env::remove_var("CACHE_TIMEOUT");

        assert_eq!(config.unwrap().cache_timeout_secs, 2);
        let text = buffer.text();
        assert!(text.contains("CACHE_TIMEOUT"));
        assert!(text.contains("soon"));
    }

    #[test]
    fn test_verbose_applies_after_init() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let buffer = SharedBuffer::default();
        let sink = buffer.clone();
        let (subscriber, filter) = build_subscriber(false, move || sink.clone());
        let handle = LogHandle {
            filter: Some(filter),
        };

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("debug before reload");
            handle.set_verbose(true);
            tracing::debug!("debug after reload");
        });

        let text = buffer.text();
        assert!(!text.contains("debug before reload"));
        assert!(text.contains("debug after reload"));
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("abc", 3), "abc");
        assert_eq!(truncate_text("联系我们页面", 2), "联系...");
    }
}
