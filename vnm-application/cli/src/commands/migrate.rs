//! 割接执行命令

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use vnm_migration::MigrationOrchestrator;
use vnm_vsphere::{VsphereClient, VsphereConfig};

use super::common;

pub async fn handle(action: crate::MigrateAction) -> Result<()> {
    match action {
        crate::MigrateAction::Run {
            spec,
            settings,
            report_dir,
        } => run_migration(&spec, &settings, &report_dir).await,
        crate::MigrateAction::Plan { spec, settings } => print_plan(&spec, &settings).await,
    }
}

async fn run_migration(spec_path: &str, settings_path: &str, report_dir: &str) -> Result<()> {
    let config = common::load_config(spec_path, settings_path)?;

    // 执行前的概览
    println!();
    println!("{}", "=".repeat(60));
    println!("{}", "管理网络割接".bold());
    println!("{}", "=".repeat(60));
    println!("vCenter 设备: {}", config.appliance.address().cyan());
    println!("管理端口组:   {}", config.mgmt_port_group.cyan());
    println!("主机数量:     {}", config.hosts.len().to_string().yellow());
    for host in &config.hosts {
        let uplinks: Vec<String> = host
            .uplinks
            .iter()
            .map(|u| format!("{}->{}", u.device, u.port_key))
            .collect();
        println!(
            "  - {} ({})",
            host.endpoint.host,
            uplinks.join(", ").bright_black()
        );
    }
    println!("{}", "=".repeat(60));
    println!();

    let client = VsphereClient::new(VsphereConfig::default()).context("创建管理 API 客户端失败")?;

    // Ctrl-C 转为取消请求，在步骤边界生效
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到 Ctrl-C，流程将在当前步骤结束后停止");
            ctrl_c_token.cancel();
        }
    });

    let mut orchestrator = MigrationOrchestrator::new(&client, config).with_cancellation(cancel);
    let report = orchestrator.run().await;

    let file_name = format!("cutover-{}.json", Local::now().format("%Y%m%d-%H%M%S"));
    let report_path = Path::new(report_dir).join(&file_name);
    report
        .save_to_file(&report_path)
        .with_context(|| format!("保存报告失败: {}", report_path.display()))?;

    common::print_report(&report);
    println!(
        "报告已保存: {}",
        report_path.display().to_string().bright_black()
    );

    if !report.is_success() {
        anyhow::bail!("割接失败，最终状态 {}", report.final_state);
    }
    Ok(())
}

/// 打印每台主机将要提交的变更集，不建立任何会话
async fn print_plan(spec_path: &str, settings_path: &str) -> Result<()> {
    let config = common::load_config(spec_path, settings_path)?;

    println!("\n{}\n", "割接计划预览（不会触碰环境）".bold());
    println!("vCenter 设备: {}", config.appliance.address().cyan());
    println!(
        "vCenter 虚拟机: {} ([{}] -> [{}] -> [{}])",
        config.appliance_vm_name.cyan(),
        config.mgmt_port_group,
        config.switch.temp_port_group,
        config.mgmt_port_group
    );
    println!();

    for host in &config.hosts {
        let plan = config.plan_for(host);
        let change_set = plan.to_change_set();
        println!("{}", format!("主机 {}", plan.host).cyan().bold());
        println!("{}", serde_json::to_string_pretty(&change_set)?);
        println!();
    }

    println!("共 {} 台主机", config.hosts.len().to_string().green());
    Ok(())
}
