//! vSphere 管理 API 模块
//!
//! 提供割接流程访问 vCenter 设备与 ESXi 主机所需的管理 API 能力。
//!
//! # 功能
//!
//! - **会话管理**: 建立/关闭认证会话，会话作为显式值传递
//! - **虚拟机网络** (`list_vm_nics` / `update_vm_nic_backing`): 查询与改绑网卡端口组
//! - **高级设置** (`get_advanced_setting` / `set_advanced_setting`): vCenter 高级参数读写
//! - **主机网络配置** (`submit_host_network_config`): 单次原子提交变更集
//! - **电源操作** (`reboot_guest`): 客户机重启
//! - **可达性探测** (`is_reachable`): TCP 层探测，无需认证
//!
//! # 示例
//!
//! ```ignore
//! use vnm_vsphere::{ManagementApi, VsphereClient, VsphereConfig};
//! use vnm_common::{Credential, Endpoint};
//!
//! let client = VsphereClient::new(VsphereConfig::default())?;
//! let endpoint = Endpoint::host("esxi-1.vcf.sddc.lab");
//! let credential = Credential::new("root", "password");
//!
//! let session = client.connect(&endpoint, &credential).await?;
//! let nics = client.list_vm_nics(&session, "vcenter-1.vcf.sddc.lab").await?;
//! client.disconnect(session).await?;
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod session;
pub mod types;

pub use api::ManagementApi;
pub use client::{VsphereClient, VsphereConfig};
pub use error::{Result, VsphereError};
pub use session::Session;

// 导出数据模型
pub use types::{
    ChangeMode, HostConfigChangeSet, OffloadPolicy, SecurityPolicy, StandardSwitchPolicy,
    TeamingPolicy, UplinkBinding, VirtualSwitchEdit, VmNic, VnicMove,
};
