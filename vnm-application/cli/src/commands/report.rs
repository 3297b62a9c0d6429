//! 割接报告管理命令

use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;

use vnm_migration::MigrationReport;

use super::common;

pub async fn handle(action: crate::ReportAction) -> Result<()> {
    match action {
        crate::ReportAction::List { report_dir, limit } => list_reports(&report_dir, limit).await,
        crate::ReportAction::Show { file } => show_report(&file).await,
    }
}

async fn list_reports(report_dir: &str, limit: usize) -> Result<()> {
    let dir = std::path::Path::new(report_dir);
    if !dir.exists() {
        println!("{}", format!("报告目录不存在: {}", report_dir).yellow());
        return Ok(());
    }

    let entries =
        std::fs::read_dir(dir).with_context(|| format!("读取报告目录失败: {}", report_dir))?;

    let mut reports = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }

        // 不是报告格式的 JSON 直接跳过
        if let Ok(content) = std::fs::read_to_string(&path) {
            if let Ok(report) = serde_json::from_str::<MigrationReport>(&content) {
                reports.push((path, report));
            }
        }
    }

    if reports.is_empty() {
        println!("{}", "没有找到任何割接报告".yellow());
        return Ok(());
    }

    // 最近的排前面
    reports.sort_by(|a, b| b.1.start_time.cmp(&a.1.start_time));
    reports.truncate(limit);

    println!("找到 {} 个报告:\n", reports.len().to_string().green());

    println!(
        "{:<32} {:<20} {:<8} {:<26} {:<8}",
        "文件".bold(),
        "开始时间".bold(),
        "结果".bold(),
        "最终状态".bold(),
        "步骤".bold()
    );
    println!("{}", "-".repeat(96));

    for (path, report) in reports {
        let result_str = if report.is_success() {
            "成功".green()
        } else {
            "失败".red()
        };

        let time_str = report
            .start_time
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        let steps_str = format!("{}/{}", report.success_count, report.total_steps);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("?")
            .to_string();

        println!(
            "{:<32} {:<20} {:<8} {:<26} {:<8}",
            file_name,
            time_str,
            result_str,
            report.final_state.to_string(),
            steps_str
        );
    }

    Ok(())
}

async fn show_report(file: &str) -> Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("读取报告文件失败: {}", file))?;
    let report: MigrationReport =
        serde_json::from_str(&content).with_context(|| format!("解析报告失败: {}", file))?;

    common::print_report(&report);

    if let Some(error) = &report.error {
        println!("\n首个失败原因: {}", error.red());
    }
    Ok(())
}
