use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use contact_scraper::models::load_csv_file;
use contact_scraper::utils::logging;
use contact_scraper::{App, Config, JobStatus, ScrapeMode};

/// 从公司网站抽取联系方式
#[derive(Parser, Debug)]
#[command(name = "contact_scraper", version)]
struct Cli {
    /// TOML 配置文件（环境变量会覆盖其中的值）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 输出 debug 日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 抽取单个网站，输出 JSON
    Lookup {
        website: String,
        /// full | fast | profile-only
        #[arg(long, default_value = "full")]
        mode: ScrapeMode,
        /// 用 AI 校验抽取结果
        #[arg(long)]
        validate: bool,
    },
    /// 批量处理 CSV，结果写到本地文件
    Batch {
        csv: PathBuf,
        /// 网站列名（默认取配置中的 website_column）
        #[arg(long)]
        column: Option<String>,
        #[arg(long, default_value = "full")]
        mode: ScrapeMode,
        #[arg(long)]
        validate: bool,
        /// 结果文件路径（默认写到当前目录，文件名为 {stem}_output.csv）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 先初始化日志，配置解析时的警告才能输出
    let log = logging::init(cli.verbose);

    // 加载配置
    let config = Config::load(cli.config.as_deref())?;
    log.set_verbose(cli.verbose || config.verbose_logging);

    let app = App::initialize(config).await?;

    match cli.command {
        Command::Lookup {
            website,
            mode,
            validate,
        } => {
            let result = app.lookup(&website, mode, validate).await;
            let json = serde_json::to_string_pretty(&result).context("无法序列化结果")?;
            println!("{}", json);
        }
        Command::Batch {
            csv,
            column,
            mode,
            validate,
            output,
        } => {
            let mut input = load_csv_file(&csv)
                .await?
                .with_mode(mode)
                .with_validate(validate);
            if let Some(column) = column {
                input = input.with_website_column(column);
            }
            run_batch(&app, input, output).await?;
        }
    }

    Ok(())
}

/// 提交任务，等待结束并把结果写到本地
async fn run_batch(
    app: &App,
    input: contact_scraper::BatchInput,
    output: Option<PathBuf>,
) -> Result<()> {
    let handle = app.submit_batch(input).await?;
    let job_id = handle.receipt.job_id;
    let mut finished = handle.finished;

    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    loop {
        tokio::select! {
            _ = &mut finished => break,
            _ = ticker.tick() => {
                let view = app.job_status(job_id).await?;
                info!(
                    "[任务 {}] ⏳ 进度: {}/{} ({:.2}%)",
                    job_id, view.processed_rows, view.total_rows, view.progress_percentage
                );
            }
        }
    }

    let view = app.job_status(job_id).await?;
    if view.status != JobStatus::Completed {
        anyhow::bail!(
            "任务 {} 失败: {}",
            job_id,
            view.error.as_deref().unwrap_or("unknown error")
        );
    }

    let (filename, content) = app.download(job_id).await?;
    let target = output.unwrap_or_else(|| PathBuf::from(filename));
    tokio::fs::write(&target, content)
        .await
        .with_context(|| format!("无法写入结果文件: {}", target.display()))?;
    info!("✓ 结果已写入: {}", target.display());

    Ok(())
}
