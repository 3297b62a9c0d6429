//! 日志初始化
//!
//! 终端输出始终开启；指定日志目录后同时追加写入按日期命名的
//! 文件，作为割接的留档审计记录。

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// 初始化全局日志订阅器
///
/// 级别优先读 RUST_LOG 环境变量，未设置时用命令行给定的级别。
pub fn init(level: Level, log_dir: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let stdout_layer = tracing_subscriber::fmt::layer();

    match log_dir {
        Some(dir) => {
            let file = open_log_file(dir)?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file));
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .init();
        }
    }

    Ok(())
}

fn open_log_file(dir: &str) -> Result<File> {
    std::fs::create_dir_all(dir).with_context(|| format!("创建日志目录失败: {}", dir))?;
    let file_name = format!("vnm-{}.log", chrono::Local::now().format("%Y%m%d"));
    let path = Path::new(dir).join(file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("打开日志文件失败: {}", path.display()))
}
