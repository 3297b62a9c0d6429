//! 单台主机的网络割接计划

use serde::{Deserialize, Serialize};
use vnm_vsphere::{
    ChangeMode, HostConfigChangeSet, StandardSwitchPolicy, UplinkBinding, VirtualSwitchEdit,
    VnicMove,
};

use crate::error::{MigrationError, Result};

/// 物理网卡与分布式交换机上行链路端口的分配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UplinkAssignment {
    /// 物理网卡设备名（如 "vmnic0"）
    pub device: String,

    /// 上行链路端口 key
    pub port_key: String,
}

/// 单台主机的网络割接计划
///
/// 在该主机对应的步骤内构造，构造后不再修改，
/// 仅通过 [`HostNetworkPlan::to_change_set`] 生成一次性提交的变更集。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostNetworkPlan {
    /// 目标主机（FQDN）
    pub host: String,

    /// 标准交换机名称（如 "vSwitch0"）
    pub standard_switch: String,

    /// 待移除的标准交换机管理端口组
    pub stale_port_group: String,

    /// 目标分布式交换机
    pub distributed_switch: String,

    /// 分布式交换机上的管理端口组
    pub mgmt_port_group: String,

    /// 待改绑的 VMkernel 适配器（如 "vmk0"）
    pub mgmt_vmk: String,

    /// 上行链路分配（按提交顺序）
    pub uplinks: Vec<UplinkAssignment>,

    /// 标准交换机目标策略
    pub switch_policy: StandardSwitchPolicy,
}

impl HostNetworkPlan {
    /// 校验计划完整性
    ///
    /// 每台主机需要 1-2 个上行链路分配，设备与端口 key 均不能为空，
    /// 同一计划内设备不能重复。
    pub fn validate(&self) -> Result<()> {
        if self.uplinks.is_empty() || self.uplinks.len() > 2 {
            return Err(MigrationError::Config(format!(
                "主机 {} 需要 1-2 个上行链路分配，实际 {} 个",
                self.host,
                self.uplinks.len()
            )));
        }

        for uplink in &self.uplinks {
            if uplink.device.trim().is_empty() || uplink.port_key.trim().is_empty() {
                return Err(MigrationError::Config(format!(
                    "主机 {} 存在空的上行链路分配: {:?}",
                    self.host, uplink
                )));
            }
        }

        if self.uplinks.len() == 2 && self.uplinks[0].device == self.uplinks[1].device {
            return Err(MigrationError::Config(format!(
                "主机 {} 的上行链路设备重复: {}",
                self.host, self.uplinks[0].device
            )));
        }

        Ok(())
    }

    /// 生成变更集（纯函数，不访问网络）
    ///
    /// 变更集固定包含：一项标准交换机策略编辑、一个待移除端口组、
    /// 一项 VMkernel 改绑、以及与分配一一对应且保持顺序的上行链路绑定，
    /// 提交模式为 modify。
    pub fn to_change_set(&self) -> HostConfigChangeSet {
        HostConfigChangeSet {
            host: self.host.clone(),
            change_mode: ChangeMode::Modify,
            distributed_switch: self.distributed_switch.clone(),
            switch_edits: vec![VirtualSwitchEdit {
                name: self.standard_switch.clone(),
                policy: self.switch_policy.clone(),
            }],
            removed_port_groups: vec![self.stale_port_group.clone()],
            vnic_moves: vec![VnicMove {
                device: self.mgmt_vmk.clone(),
                port_group: self.mgmt_port_group.clone(),
            }],
            uplink_bindings: self
                .uplinks
                .iter()
                .map(|uplink| UplinkBinding {
                    device: uplink.device.clone(),
                    uplink_port_key: uplink.port_key.clone(),
                })
                .collect(),
        }
    }
}
