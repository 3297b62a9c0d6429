//! 割接配置
//!
//! 输入分两部分：部署规格（JSON，描述环境里有哪些主机和凭据）和
//! 割接设置（TOML，描述交换机命名、等待策略和每台主机的上行链路
//! 分配）。两者在 [`MigrationConfig::resolve`] 中合并成一份经过
//! 校验的执行配置。

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use vnm_common::{join_fqdn, Credential, Endpoint};
use vnm_vsphere::types::StandardSwitchPolicy;

use crate::error::{MigrationError, Result};
use crate::plan::{HostNetworkPlan, UplinkAssignment};
use crate::reboot::WaitPolicy;

/// vCenter SSO 管理员账号
pub const SSO_ADMIN_USERNAME: &str = "administrator@vsphere.local";

// ============================================
// 部署规格（JSON）
// ============================================

/// 部署规格文件
///
/// 只取割接需要的字段，其余内容在反序列化时直接忽略。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySpec {
    /// 主机清单
    pub host_specs: Vec<HostSpec>,
    /// DNS 配置
    pub dns_spec: DnsSpec,
    /// vCenter 配置
    pub vcenter_spec: VcenterSpec,
    /// PSC / SSO 配置
    pub psc_specs: Vec<PscSpec>,
    /// 网络清单
    pub network_specs: Vec<NetworkSpec>,
}

/// 单台主机的规格
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    /// 主机名（短名，域名后缀来自 dnsSpec.subdomain）
    pub hostname: String,
    /// 主机登录凭据
    pub credentials: Credential,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsSpec {
    /// 域名后缀
    pub subdomain: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VcenterSpec {
    /// vCenter 主机名（短名）
    pub vcenter_hostname: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PscSpec {
    /// SSO 管理员密码
    pub admin_user_sso_password: String,
}

/// 逻辑网络定义
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// 网络类型（MANAGEMENT / VMOTION / VSAN ...）
    pub network_type: String,
    /// 分布式交换机上对应的端口组键
    pub port_group_key: String,
}

impl DeploySpec {
    /// 从 JSON 文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// 从 JSON 字符串加载
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| MigrationError::Config(format!("部署规格解析失败: {}", e)))
    }

    /// 管理网络的分布式端口组键
    pub fn management_port_group(&self) -> Result<&str> {
        self.network_specs
            .iter()
            .find(|n| n.network_type.eq_ignore_ascii_case("MANAGEMENT"))
            .map(|n| n.port_group_key.as_str())
            .ok_or_else(|| {
                MigrationError::Config("部署规格缺少 MANAGEMENT 网络定义".to_string())
            })
    }
}

// ============================================
// 割接设置（TOML）
// ============================================

/// 割接设置文件
///
/// 所有字段均有默认值，空文件也能得到一份可用（但无上行链路
/// 分配）的设置。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CutoverSettings {
    /// 交换机与端口组命名
    pub switch: SwitchSettings,
    /// vCenter 设备相关设置
    pub appliance: ApplianceSettings,
    /// 等待与重试策略
    pub wait: WaitSettings,
    /// 每台主机的上行链路分配，键为主机名（短名或 FQDN）
    pub uplinks: HashMap<String, Vec<UplinkAssignment>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwitchSettings {
    /// 主机上的标准交换机名
    pub standard_switch: String,
    /// 目标分布式交换机名
    pub distributed_switch: String,
    /// vCenter 虚拟机割接期间的临时端口组（标准交换机上）
    pub temp_port_group: String,
    /// 割接时从标准交换机上移除的残留端口组
    pub stale_port_group: String,
    /// 管理 VMkernel 接口名
    pub mgmt_vmk: String,
}

impl Default for SwitchSettings {
    fn default() -> Self {
        Self {
            standard_switch: "vSwitch0".to_string(),
            distributed_switch: "SDDC-Dswitch-Private1".to_string(),
            temp_port_group: "VM Network".to_string(),
            stale_port_group: "Management Network".to_string(),
            mgmt_vmk: "vmk0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApplianceSettings {
    /// vCenter 虚拟机在清单中的名字，缺省时取 vCenter 主机短名
    pub vm_name: Option<String>,
}

/// 等待策略的文件表示（秒），经 [`WaitSettings::to_policy`] 校验后生效
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    /// 首次重试间隔（秒）
    pub initial_delay_secs: u64,
    /// 重试间隔上限（秒）
    pub max_delay_secs: u64,
    /// 间隔退避倍率
    pub backoff_multiplier: f64,
    /// 单个等待阶段的总时限（秒）
    pub phase_deadline_secs: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: 5,
            max_delay_secs: 60,
            backoff_multiplier: 2.0,
            phase_deadline_secs: 1800,
        }
    }
}

impl WaitSettings {
    /// 校验并转换为运行时等待策略
    pub fn to_policy(&self) -> Result<WaitPolicy> {
        if self.initial_delay_secs == 0 {
            return Err(MigrationError::Config(
                "wait.initial_delay_secs 必须大于 0".to_string(),
            ));
        }
        if self.phase_deadline_secs == 0 {
            return Err(MigrationError::Config(
                "wait.phase_deadline_secs 必须大于 0".to_string(),
            ));
        }
        if self.max_delay_secs < self.initial_delay_secs {
            return Err(MigrationError::Config(
                "wait.max_delay_secs 不能小于 wait.initial_delay_secs".to_string(),
            ));
        }
        // mul_f64 对离谱的倍率会溢出 panic，这里一并拦住
        if !(1.0..=10.0).contains(&self.backoff_multiplier) {
            return Err(MigrationError::Config(
                "wait.backoff_multiplier 必须在 1.0~10.0 之间".to_string(),
            ));
        }
        Ok(WaitPolicy {
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs),
            backoff_multiplier: self.backoff_multiplier,
            phase_deadline: Duration::from_secs(self.phase_deadline_secs),
        })
    }
}

impl CutoverSettings {
    /// 从 TOML 文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// 从 TOML 字符串加载
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MigrationError::Config(format!("割接设置解析失败: {}", e)))
    }

    /// 查指定主机的上行链路分配，先按短名再按 FQDN
    pub fn uplinks_for(&self, hostname: &str, fqdn: &str) -> Option<&[UplinkAssignment]> {
        self.uplinks
            .get(hostname)
            .or_else(|| self.uplinks.get(fqdn))
            .map(|v| v.as_slice())
    }
}

// ============================================
// 合并后的执行配置
// ============================================

/// 单台主机的执行条目
#[derive(Debug, Clone)]
pub struct HostEntry {
    /// 主机管理接口
    pub endpoint: Endpoint,
    /// 主机登录凭据
    pub credential: Credential,
    /// 上行链路分配（1~2 条，端口键全局唯一）
    pub uplinks: Vec<UplinkAssignment>,
}

/// 校验过的割接执行配置
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// vCenter 设备管理接口
    pub appliance: Endpoint,
    /// vCenter SSO 管理员凭据
    pub appliance_credential: Credential,
    /// vCenter 虚拟机在主机清单中的名字
    pub appliance_vm_name: String,
    /// 管理网络的分布式端口组键
    pub mgmt_port_group: String,
    /// 按割接顺序排列的主机清单，首台承载 vCenter 虚拟机
    pub hosts: Vec<HostEntry>,
    /// 交换机与端口组命名
    pub switch: SwitchSettings,
    /// 等待策略
    pub wait: WaitPolicy,
}

impl MigrationConfig {
    /// 合并部署规格与割接设置
    ///
    /// 所有静态校验都在这里完成：主机清单非空、管理网络已定义、
    /// SSO 密码存在、每台主机有 1~2 条上行链路分配且上行端口键
    /// 不跨主机复用。校验失败立即返回 [`MigrationError::Config`]，
    /// 不触碰任何环境。
    pub fn resolve(spec: &DeploySpec, settings: &CutoverSettings) -> Result<Self> {
        if spec.host_specs.is_empty() {
            return Err(MigrationError::Config(
                "部署规格中没有任何主机".to_string(),
            ));
        }

        let mgmt_port_group = spec.management_port_group()?.to_string();

        let sso_password = spec
            .psc_specs
            .first()
            .map(|p| p.admin_user_sso_password.clone())
            .ok_or_else(|| {
                MigrationError::Config("部署规格缺少 pscSpecs（SSO 密码）".to_string())
            })?;

        let subdomain = &spec.dns_spec.subdomain;

        // 逐主机解析上行链路分配，同时检查端口键是否跨主机复用
        let mut hosts = Vec::with_capacity(spec.host_specs.len());
        let mut seen_keys: HashMap<String, String> = HashMap::new();
        for host_spec in &spec.host_specs {
            let fqdn = join_fqdn(&host_spec.hostname, subdomain);
            let uplinks = settings
                .uplinks_for(&host_spec.hostname, &fqdn)
                .ok_or_else(|| {
                    MigrationError::Config(format!("主机 {} 缺少上行链路分配", fqdn))
                })?
                .to_vec();

            if uplinks.is_empty() || uplinks.len() > 2 {
                return Err(MigrationError::Config(format!(
                    "主机 {} 的上行链路分配必须为 1~2 条，实际 {} 条",
                    fqdn,
                    uplinks.len()
                )));
            }
            for uplink in &uplinks {
                if uplink.device.trim().is_empty() {
                    return Err(MigrationError::Config(format!(
                        "主机 {} 存在设备名为空的上行链路分配",
                        fqdn
                    )));
                }
                if uplink.port_key.trim().is_empty() {
                    return Err(MigrationError::Config(format!(
                        "主机 {} 的设备 {} 端口键为空",
                        fqdn, uplink.device
                    )));
                }
                if let Some(other) = seen_keys.insert(uplink.port_key.clone(), fqdn.clone()) {
                    return Err(MigrationError::Config(format!(
                        "上行端口键 {} 被 {} 和 {} 同时使用",
                        uplink.port_key, other, fqdn
                    )));
                }
            }

            hosts.push(HostEntry {
                endpoint: Endpoint::host(fqdn),
                credential: host_spec.credentials.clone(),
                uplinks,
            });
        }

        let vcenter_short = &spec.vcenter_spec.vcenter_hostname;
        let appliance_fqdn = join_fqdn(vcenter_short, subdomain);
        let appliance_vm_name = settings
            .appliance
            .vm_name
            .clone()
            .unwrap_or_else(|| vcenter_short.split('.').next().unwrap_or(vcenter_short).to_string());

        Ok(Self {
            appliance: Endpoint::management(appliance_fqdn),
            appliance_credential: Credential {
                username: SSO_ADMIN_USERNAME.to_string(),
                password: sso_password,
            },
            appliance_vm_name,
            mgmt_port_group,
            hosts,
            switch: settings.switch.clone(),
            wait: settings.wait.to_policy()?,
        })
    }

    /// 生成指定主机的割接计划
    pub fn plan_for(&self, host: &HostEntry) -> HostNetworkPlan {
        HostNetworkPlan {
            host: host.endpoint.host.clone(),
            standard_switch: self.switch.standard_switch.clone(),
            stale_port_group: self.switch.stale_port_group.clone(),
            distributed_switch: self.switch.distributed_switch.clone(),
            mgmt_port_group: self.mgmt_port_group.clone(),
            mgmt_vmk: self.switch.mgmt_vmk.clone(),
            uplinks: host.uplinks.clone(),
            switch_policy: StandardSwitchPolicy::default(),
        }
    }
}
