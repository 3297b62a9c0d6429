//! vSphere 网络配置数据模型
//!
//! 覆盖割接用到的几类对象：虚拟机网卡及其端口组绑定、
//! 标准交换机策略、以及一次性提交的主机网络配置变更集。

use serde::{Deserialize, Serialize};

/// 虚拟机网卡及其当前端口组绑定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmNic {
    /// 网卡设备标识
    pub key: String,

    /// 设备标签（如 "Network adapter 1"）
    pub label: String,

    /// 当前绑定的端口组名称（无端口组 backing 时为 None）
    pub port_group: Option<String>,
}

/// 变更集提交模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeMode {
    /// 增量修改既有配置
    Modify,
    /// 整体替换既有配置
    Replace,
}

/// 标准交换机安全策略
///
/// 割接要求三个开关全部关闭。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPolicy {
    /// 混杂模式
    pub allow_promiscuous: bool,

    /// 伪造发送
    pub forged_transmits: bool,

    /// MAC 地址变更
    pub mac_changes: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            allow_promiscuous: false,
            forged_transmits: false,
            mac_changes: false,
        }
    }
}

/// 网卡卸载策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffloadPolicy {
    /// 校验和卸载
    pub csum_offload: bool,

    /// TCP 分段卸载（TSO）
    pub tcp_segmentation: bool,
}

impl Default for OffloadPolicy {
    fn default() -> Self {
        Self {
            csum_offload: true,
            tcp_segmentation: true,
        }
    }
}

/// NIC Teaming 策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamingPolicy {
    /// 负载均衡算法
    pub policy: String,

    /// 链路变更时通知物理交换机
    pub notify_switches: bool,

    /// 信标探测故障检测
    pub check_beacon: bool,
}

impl Default for TeamingPolicy {
    fn default() -> Self {
        Self {
            policy: "loadbalance_srcid".to_string(),
            notify_switches: true,
            check_beacon: false,
        }
    }
}

/// 标准交换机端口与策略配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSwitchPolicy {
    /// 端口数量
    #[serde(default = "default_num_ports")]
    pub num_ports: u32,

    /// 安全策略
    #[serde(default)]
    pub security: SecurityPolicy,

    /// 卸载策略
    #[serde(default)]
    pub offload: OffloadPolicy,

    /// Teaming 策略
    #[serde(default)]
    pub teaming: TeamingPolicy,
}

impl Default for StandardSwitchPolicy {
    fn default() -> Self {
        Self {
            num_ports: default_num_ports(),
            security: SecurityPolicy::default(),
            offload: OffloadPolicy::default(),
            teaming: TeamingPolicy::default(),
        }
    }
}

fn default_num_ports() -> u32 {
    128
}

/// 标准交换机策略编辑
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualSwitchEdit {
    /// 交换机名称（如 "vSwitch0"）
    pub name: String,

    /// 目标策略
    pub policy: StandardSwitchPolicy,
}

/// VMkernel 适配器改绑
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VnicMove {
    /// 适配器设备名（如 "vmk0"）
    pub device: String,

    /// 目标分布式端口组
    pub port_group: String,
}

/// 物理网卡与分布式交换机上行链路端口的绑定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkBinding {
    /// 物理网卡设备名（如 "vmnic0"）
    pub device: String,

    /// 上行链路端口 key
    pub uplink_port_key: String,
}

/// 主机网络配置变更集
///
/// 一台主机割接所需的全部网络改动，作为单次原子提交发送；
/// 提交失败时主机上不残留部分改动由服务端保证。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfigChangeSet {
    /// 目标主机（FQDN）
    pub host: String,

    /// 提交模式
    pub change_mode: ChangeMode,

    /// 目标分布式交换机
    pub distributed_switch: String,

    /// 标准交换机策略编辑
    pub switch_edits: Vec<VirtualSwitchEdit>,

    /// 待移除的标准交换机端口组
    pub removed_port_groups: Vec<String>,

    /// VMkernel 适配器改绑
    pub vnic_moves: Vec<VnicMove>,

    /// 物理上行链路绑定（按给定顺序）
    pub uplink_bindings: Vec<UplinkBinding>,
}
