//! VNM 割接流程
//!
//! 管理网络从标准交换机割接到分布式交换机的顺序编排：
//! - 会话生命周期管理（[`ConnectionManager`]）
//! - vCenter 虚拟机端口组迁移（[`PortGroupMigrator`]）
//! - 主机网络原子重配置（[`HostReconfigurator`]）
//! - 设备重启与就绪等待（[`RebootWaiter`]）
//! - 六步状态机编排（[`MigrationOrchestrator`]）
//! - 割接报告（[`MigrationReport`]）

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod portgroup;
pub mod reboot;
pub mod reconfigure;
pub mod report;
pub mod session_scope;

pub use config::{
    CutoverSettings, DeploySpec, HostEntry, MigrationConfig, SwitchSettings, WaitSettings,
    SSO_ADMIN_USERNAME,
};
pub use error::{MigrationError, Result};
pub use orchestrator::{
    MigrationOrchestrator, WorkflowState, ROLLBACK_SETTING_KEY, STEP_NAMES,
};
pub use plan::{HostNetworkPlan, UplinkAssignment};
pub use portgroup::PortGroupMigrator;
pub use reboot::{RebootWaiter, WaitPolicy};
pub use reconfigure::HostReconfigurator;
pub use report::{MigrationReport, StepRecord, StepStatus};
pub use session_scope::ConnectionManager;
