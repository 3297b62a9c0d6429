//! 管理 API 能力接口定义

use async_trait::async_trait;
use vnm_common::{Credential, Endpoint};

use crate::error::Result;
use crate::session::Session;
use crate::types::{HostConfigChangeSet, VmNic};

/// 远端管理 API 能力接口
///
/// 割接流程对 vCenter 与 ESXi 主机的全部访问都经过此接口；
/// 生产实现为 [`crate::VsphereClient`]，测试中以内存实现替换。
///
/// 会话由调用方显式持有：`connect` 返回 [`Session`]，
/// 之后的每次调用都必须带上它，用完交还 `disconnect`。
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// 建立认证会话
    ///
    /// 凭据错误返回 `AuthError`，端点无响应返回 `Unreachable`。
    async fn connect(&self, endpoint: &Endpoint, credential: &Credential) -> Result<Session>;

    /// 关闭会话
    ///
    /// 幂等：关闭已失效的会话不报错。
    async fn disconnect(&self, session: Session) -> Result<()>;

    /// 探测端点是否可达（TCP 层，不做认证）
    async fn is_reachable(&self, endpoint: &Endpoint) -> bool;

    /// 查询虚拟机的全部网卡及其端口组绑定
    async fn list_vm_nics(&self, session: &Session, vm_name: &str) -> Result<Vec<VmNic>>;

    /// 将虚拟机的单块网卡改绑到目标端口组
    async fn update_vm_nic_backing(
        &self,
        session: &Session,
        vm_name: &str,
        nic_key: &str,
        port_group: &str,
    ) -> Result<()>;

    /// 读取 vCenter 高级设置，不存在时返回 `None`
    async fn get_advanced_setting(&self, session: &Session, key: &str) -> Result<Option<String>>;

    /// 写入 vCenter 高级设置
    async fn set_advanced_setting(&self, session: &Session, key: &str, value: &str) -> Result<()>;

    /// 提交主机网络配置变更集（单次原子提交）
    async fn submit_host_network_config(
        &self,
        session: &Session,
        change_set: &HostConfigChangeSet,
    ) -> Result<()>;

    /// 重启虚拟机的客户机操作系统
    async fn reboot_guest(&self, session: &Session, vm_name: &str) -> Result<()>;
}
