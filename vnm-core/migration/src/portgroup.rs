//! 虚拟机端口组迁移

use tracing::{info, warn};
use vnm_vsphere::{ManagementApi, Session};

use crate::error::{MigrationError, Result};

/// 端口组迁移器
///
/// 把虚拟机上绑定在源端口组的全部网卡改绑到目标端口组，
/// 绑定在其他端口组的网卡保持不动。
pub struct PortGroupMigrator<'a, A: ManagementApi> {
    api: &'a A,
}

impl<'a, A: ManagementApi> PortGroupMigrator<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// 执行迁移，返回改绑的网卡数量
    ///
    /// 先查询虚拟机当前的网卡绑定，再逐块改绑命中的网卡；
    /// 没有任何网卡绑定在 `from` 时返回 [`MigrationError::BindingNotFound`]，
    /// 不做隐式重试。
    pub async fn migrate(
        &self,
        session: &Session,
        vm_name: &str,
        from: &str,
        to: &str,
    ) -> Result<usize> {
        info!("迁移端口组绑定: {} 从 [{}] 到 [{}]", vm_name, from, to);

        let nics = self.api.list_vm_nics(session, vm_name).await?;
        let matched: Vec<_> = nics
            .iter()
            .filter(|nic| nic.port_group.as_deref() == Some(from))
            .collect();

        if matched.is_empty() {
            warn!(
                "虚拟机 {} 没有绑定在端口组 [{}] 的网卡 (共 {} 块网卡)",
                vm_name,
                from,
                nics.len()
            );
            return Err(MigrationError::BindingNotFound {
                vm: vm_name.to_string(),
                port_group: from.to_string(),
            });
        }

        for nic in &matched {
            self.api
                .update_vm_nic_backing(session, vm_name, &nic.key, to)
                .await?;
            info!("网卡 {} ({}) 已改绑到 [{}]", nic.key, nic.label, to);
        }

        info!(
            "端口组迁移完成: {} 共改绑 {} 块网卡",
            vm_name,
            matched.len()
        );
        Ok(matched.len())
    }
}
