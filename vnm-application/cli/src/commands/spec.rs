//! 部署规格检查命令

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use vnm_migration::{CutoverSettings, DeploySpec, MigrationConfig};

pub async fn handle(action: crate::SpecAction) -> Result<()> {
    match action {
        crate::SpecAction::Check { spec, settings } => check(&spec, &settings).await,
    }
}

async fn check(spec_path: &str, settings_path: &str) -> Result<()> {
    println!("检查部署规格: {}", spec_path.cyan());

    let spec = DeploySpec::from_file(spec_path)
        .with_context(|| format!("加载部署规格失败: {}", spec_path))?;
    println!("  {} 规格解析成功", "✓".green());
    println!(
        "  主机数量: {}",
        spec.host_specs.len().to_string().yellow()
    );
    println!("  域名后缀: {}", spec.dns_spec.subdomain.bright_black());
    match spec.management_port_group() {
        Ok(port_group) => println!("  管理端口组: {}", port_group.cyan()),
        Err(e) => println!("  {} {}", "✗".red(), e),
    }

    println!("\n检查割接设置: {}", settings_path.cyan());
    if !Path::new(settings_path).exists() {
        println!("  {} 设置文件不存在", "✗".red());
        anyhow::bail!("割接设置文件不存在: {}", settings_path);
    }
    let settings = CutoverSettings::from_file(settings_path)
        .with_context(|| format!("加载割接设置失败: {}", settings_path))?;
    println!("  {} 设置解析成功", "✓".green());
    println!(
        "  上行链路分配: {} 台主机",
        settings.uplinks.len().to_string().yellow()
    );

    println!();
    match MigrationConfig::resolve(&spec, &settings) {
        Ok(config) => {
            println!("{} 校验通过\n", "✓".green().bold());
            for host in &config.hosts {
                let uplinks: Vec<String> = host
                    .uplinks
                    .iter()
                    .map(|u| format!("{}->{}", u.device, u.port_key))
                    .collect();
                println!(
                    "  {} {} ({})",
                    "✓".green(),
                    host.endpoint.host,
                    uplinks.join(", ").bright_black()
                );
            }
            Ok(())
        }
        Err(e) => {
            println!("{} 校验失败: {}", "✗".red().bold(), e);
            anyhow::bail!("部署规格校验未通过");
        }
    }
}
