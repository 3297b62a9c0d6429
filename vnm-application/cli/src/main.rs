//! VNM CLI 应用

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "vnm")]
#[command(about = "VNM - 管理网络割接编排工具", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// 日志文件目录（不指定则只输出到终端）
    #[arg(long)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 割接执行
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },

    /// 部署规格检查
    Spec {
        #[command(subcommand)]
        action: SpecAction,
    },

    /// 割接报告管理
    Report {
        #[command(subcommand)]
        action: ReportAction,
    },
}

#[derive(Subcommand)]
pub enum MigrateAction {
    /// 执行完整割接流程
    Run {
        /// 部署规格文件 (JSON)
        #[arg(short, long)]
        spec: String,

        /// 割接设置文件 (TOML)
        #[arg(short = 'c', long, default_value = "config/vnm.toml")]
        settings: String,

        /// 报告输出目录
        #[arg(long, default_value = "reports")]
        report_dir: String,
    },

    /// 预览每台主机的变更集，不触碰环境
    Plan {
        /// 部署规格文件 (JSON)
        #[arg(short, long)]
        spec: String,

        /// 割接设置文件 (TOML)
        #[arg(short = 'c', long, default_value = "config/vnm.toml")]
        settings: String,
    },
}

#[derive(Subcommand)]
pub enum SpecAction {
    /// 校验部署规格与割接设置
    Check {
        /// 部署规格文件 (JSON)
        #[arg(short, long)]
        spec: String,

        /// 割接设置文件 (TOML)
        #[arg(short = 'c', long, default_value = "config/vnm.toml")]
        settings: String,
    },
}

#[derive(Subcommand)]
pub enum ReportAction {
    /// 列出割接报告
    List {
        /// 报告目录
        #[arg(long, default_value = "reports")]
        report_dir: String,

        /// 限制数量
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// 显示报告详情
    Show {
        /// 报告文件路径
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    logging::init(log_level, cli.log_dir.as_deref())?;

    info!("VNM CLI 启动");

    // 处理命令
    match cli.command {
        Commands::Migrate { action } => commands::migrate::handle(action).await?,
        Commands::Spec { action } => commands::spec::handle(action).await?,
        Commands::Report { action } => commands::report::handle(action).await?,
    }

    Ok(())
}
