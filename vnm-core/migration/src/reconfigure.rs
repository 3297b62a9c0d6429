//! 主机网络重配置

use tracing::{error, info};
use vnm_vsphere::{ManagementApi, Session};

use crate::error::{MigrationError, Result};
use crate::plan::HostNetworkPlan;

/// 主机网络重配置器
///
/// 把一台主机割接所需的全部网络改动合成单个变更集一次性提交：
/// 标准交换机策略编辑、残留管理端口组移除、VMkernel 改绑、
/// 上行链路绑定。不做分步提交，失败后也不回滚已提交的内容。
pub struct HostReconfigurator<'a, A: ManagementApi> {
    api: &'a A,
}

impl<'a, A: ManagementApi> HostReconfigurator<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// 校验计划并提交变更集
    ///
    /// 提交调用的任何失败都映射为 [`MigrationError::ConfigSubmit`] 并终止流程。
    pub async fn apply(&self, session: &Session, plan: &HostNetworkPlan) -> Result<()> {
        plan.validate()?;

        let uplinks: Vec<String> = plan
            .uplinks
            .iter()
            .map(|uplink| format!("{}->{}", uplink.device, uplink.port_key))
            .collect();
        info!(
            "主机割接: {} (vmk [{}] -> [{}], 上行链路 {:?})",
            plan.host, plan.mgmt_vmk, plan.mgmt_port_group, uplinks
        );

        let change_set = plan.to_change_set();
        self.api
            .submit_host_network_config(session, &change_set)
            .await
            .map_err(|e| {
                error!("主机 {} 变更集提交失败: {}", plan.host, e);
                MigrationError::ConfigSubmit {
                    host: plan.host.clone(),
                    reason: e.to_string(),
                }
            })?;

        info!("主机割接完成: {}", plan.host);
        Ok(())
    }
}
