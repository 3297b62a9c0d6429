//! 公共工具函数模块
//!
//! 提供各命令模块共享的功能：配置加载与报告渲染。

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use vnm_migration::{CutoverSettings, DeploySpec, MigrationConfig, MigrationReport, StepStatus};

/// 加载并合并部署规格与割接设置
pub fn load_config(spec_path: &str, settings_path: &str) -> Result<MigrationConfig> {
    let spec = DeploySpec::from_file(spec_path)
        .with_context(|| format!("加载部署规格失败: {}", spec_path))?;

    if !Path::new(settings_path).exists() {
        anyhow::bail!(
            "割接设置文件不存在: {}（每台主机的上行链路分配必须由它提供）",
            settings_path
        );
    }
    let settings = CutoverSettings::from_file(settings_path)
        .with_context(|| format!("加载割接设置失败: {}", settings_path))?;

    Ok(MigrationConfig::resolve(&spec, &settings)?)
}

/// 打印割接报告
pub fn print_report(report: &MigrationReport) {
    println!("\n{}", "=".repeat(60));
    println!("{}", "割接报告".bold());
    println!("{}", "=".repeat(60));
    println!();

    println!("流程名称: {}", report.name.cyan().bold());
    println!("最终状态: {}", report.final_state.to_string().cyan());
    println!("主机数量: {}", report.total_hosts.to_string().yellow());
    println!("执行时间: {} ms", report.duration_ms.to_string().yellow());
    println!();

    println!("步骤统计:");
    println!("  总步骤: {}", report.total_steps.to_string().bright_blue());
    println!("  成功:   {}", report.success_count.to_string().green());
    println!("  失败:   {}", report.failed_count.to_string().red());
    println!("  跳过:   {}", report.skipped_count.to_string().yellow());
    println!();

    if !report.steps.is_empty() {
        println!("步骤详情:");
        println!();

        for step in &report.steps {
            let status_icon = match step.status {
                StepStatus::Success => "✓".green(),
                StepStatus::Failed => "✗".red(),
                StepStatus::Skipped => "⊘".yellow(),
            };

            println!(
                "{} 步骤 {}: {}",
                status_icon.bold(),
                (step.step_index + 1).to_string().bright_black(),
                step.description
            );

            if let Some(output) = &step.output {
                println!("   输出: {}", output.bright_black());
            }

            if let Some(error) = &step.error {
                println!("   错误: {}", error.red());
            }

            println!("   耗时: {} ms", step.duration_ms.to_string().bright_black());
            println!();
        }
    }

    println!("{}", "=".repeat(60));
    let status = if report.is_success() {
        format!("{} 割接成功", "✓".green().bold())
    } else {
        format!("{} 割接失败", "✗".red().bold())
    };
    println!("{}", status);
    println!("{}", "=".repeat(60));
}
