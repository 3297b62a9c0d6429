//! 割接编排
//!
//! 按固定顺序执行六步割接流程，每步完成后推进状态机。任何一步
//! 失败立即终止，不做回滚；剩余步骤在报告中记为跳过。步骤之间
//! 响应取消请求，单个变更集提交从不中断。

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use vnm_vsphere::ManagementApi;

use crate::config::{HostEntry, MigrationConfig};
use crate::error::{MigrationError, Result};
use crate::portgroup::PortGroupMigrator;
use crate::reboot::RebootWaiter;
use crate::reconfigure::HostReconfigurator;
use crate::report::{MigrationReport, StepRecord};
use crate::session_scope::ConnectionManager;

/// vCenter 网络配置回滚保护的高级设置键
pub const ROLLBACK_SETTING_KEY: &str = "config.vpxd.network.rollback";

/// 流程状态机
///
/// 只会单向推进，Done 和 Failed 为终止状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowState {
    /// 初始状态
    Start,
    /// vCenter 虚拟机已落到标准交换机临时端口组
    VCenterOnStandardSwitch,
    /// 网络回滚保护已关闭
    ConfigRollbackDisabled,
    /// vCenter 设备已完成重启
    ApplianceRebooted,
    /// 首台主机已割接到分布式交换机
    FirstHostMigrated,
    /// vCenter 虚拟机已回到分布式端口组
    ApplianceOnDistributedSwitch,
    /// 其余主机已全部割接
    RemainingHostsMigrated,
    /// 流程成功结束
    Done,
    /// 流程失败终止
    Failed,
}

impl WorkflowState {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Failed)
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 六个割接步骤的描述，报告与日志共用
pub const STEP_NAMES: [&str; 6] = [
    "迁移 vCenter 虚拟机到临时端口组",
    "关闭网络回滚保护",
    "重启 vCenter 设备",
    "割接首台主机",
    "迁移 vCenter 虚拟机回分布式端口组",
    "割接其余主机",
];

/// 割接编排器
pub struct MigrationOrchestrator<'a, A: ManagementApi> {
    api: &'a A,
    conn: ConnectionManager<'a, A>,
    config: MigrationConfig,
    cancel: CancellationToken,
    state: WorkflowState,
}

impl<'a, A: ManagementApi> MigrationOrchestrator<'a, A> {
    pub fn new(api: &'a A, config: MigrationConfig) -> Self {
        Self {
            api,
            conn: ConnectionManager::new(api),
            config,
            cancel: CancellationToken::new(),
            state: WorkflowState::Start,
        }
    }

    /// 挂接外部取消令牌（如 Ctrl-C 处理）
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 当前流程状态
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// 执行完整割接流程，总是产出一份报告
    pub async fn run(&mut self) -> MigrationReport {
        let mut report =
            MigrationReport::new("management-network-cutover", self.config.hosts.len());
        info!(
            "开始管理网络割接: {} 台主机, vCenter 设备 {}",
            self.config.hosts.len(),
            self.config.appliance.address()
        );

        match self.run_steps(&mut report).await {
            Ok(()) => {
                self.state = WorkflowState::Done;
                info!("管理网络割接完成");
            }
            Err(e) => {
                error!("管理网络割接失败: {}", e);
                report.error = Some(e.to_string());
                Self::mark_remaining_skipped(&mut report);
                self.state = WorkflowState::Failed;
            }
        }
        report.finalize(self.state);
        report
    }

    async fn run_steps(&mut self, report: &mut MigrationReport) -> Result<()> {
        let first_host = self
            .config
            .hosts
            .first()
            .cloned()
            .ok_or_else(|| MigrationError::Config("主机清单为空".to_string()))?;

        // 步骤 1: vCenter 虚拟机先挪到标准交换机的临时端口组，
        // 否则首台主机切换上行链路时设备会掉线
        let started = Instant::now();
        info!("执行步骤 1/6: {}", STEP_NAMES[0]);
        let result = self
            .guarded(
                STEP_NAMES[0],
                self.step_move_appliance(
                    &first_host,
                    &self.config.mgmt_port_group,
                    &self.config.switch.temp_port_group,
                ),
            )
            .await;
        self.record_step(
            report,
            0,
            WorkflowState::VCenterOnStandardSwitch,
            started,
            result,
        )?;

        // 步骤 2: 关闭 vpxd 的网络回滚保护，防止它把割接改动再改回去
        let started = Instant::now();
        info!("执行步骤 2/6: {}", STEP_NAMES[1]);
        let result = self.guarded(STEP_NAMES[1], self.step_disable_rollback()).await;
        self.record_step(
            report,
            1,
            WorkflowState::ConfigRollbackDisabled,
            started,
            result,
        )?;

        // 步骤 3: 重启设备使设置生效，等待完整重启周期
        let started = Instant::now();
        info!("执行步骤 3/6: {}", STEP_NAMES[2]);
        let result = self
            .guarded(STEP_NAMES[2], self.step_reboot_appliance(&first_host))
            .await;
        self.record_step(report, 2, WorkflowState::ApplianceRebooted, started, result)?;

        // 步骤 4: 割接承载 vCenter 虚拟机的首台主机
        let started = Instant::now();
        info!("执行步骤 4/6: {}", STEP_NAMES[3]);
        let result = self
            .guarded(STEP_NAMES[3], self.step_migrate_host(&first_host))
            .await;
        self.record_step(report, 3, WorkflowState::FirstHostMigrated, started, result)?;

        // 步骤 5: vCenter 虚拟机回到分布式交换机的管理端口组
        let started = Instant::now();
        info!("执行步骤 5/6: {}", STEP_NAMES[4]);
        let result = self
            .guarded(
                STEP_NAMES[4],
                self.step_move_appliance(
                    &first_host,
                    &self.config.switch.temp_port_group,
                    &self.config.mgmt_port_group,
                ),
            )
            .await;
        self.record_step(
            report,
            4,
            WorkflowState::ApplianceOnDistributedSwitch,
            started,
            result,
        )?;

        // 步骤 6: 逐台割接其余主机
        let started = Instant::now();
        info!("执行步骤 6/6: {}", STEP_NAMES[5]);
        let result = self.guarded(STEP_NAMES[5], self.step_migrate_remaining()).await;
        self.record_step(
            report,
            5,
            WorkflowState::RemainingHostsMigrated,
            started,
            result,
        )?;

        Ok(())
    }

    /// 步骤开始前的取消检查
    async fn guarded<T, F>(&self, step: &str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(MigrationError::Cancelled {
                step: step.to_string(),
            });
        }
        fut.await
    }

    fn record_step(
        &mut self,
        report: &mut MigrationReport,
        index: usize,
        next_state: WorkflowState,
        started: Instant,
        result: Result<String>,
    ) -> Result<()> {
        let description = STEP_NAMES[index];
        match result {
            Ok(detail) => {
                let mut record = StepRecord::success(index, description);
                record.duration_ms = started.elapsed().as_millis() as u64;
                record.output = Some(detail);
                report.add_step(record);
                self.state = next_state;
                info!(
                    "步骤 {}/{} 完成: {} (状态 -> {})",
                    index + 1,
                    STEP_NAMES.len(),
                    description,
                    self.state
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    "步骤 {}/{} 失败: {}: {}",
                    index + 1,
                    STEP_NAMES.len(),
                    description,
                    e
                );
                let mut record = StepRecord::failed(index, description, &e.to_string());
                record.duration_ms = started.elapsed().as_millis() as u64;
                report.add_step(record);
                self.state = WorkflowState::Failed;
                Err(e)
            }
        }
    }

    /// 失败后把未执行的步骤记为跳过
    fn mark_remaining_skipped(report: &mut MigrationReport) {
        for (index, description) in STEP_NAMES.iter().enumerate().skip(report.steps.len()) {
            report.add_step(StepRecord::skipped(index, description));
        }
    }

    // ============================================
    // 具体步骤
    // ============================================

    /// 经宿主机会话改绑 vCenter 虚拟机的网卡
    async fn step_move_appliance(
        &self,
        host: &HostEntry,
        from: &str,
        to: &str,
    ) -> Result<String> {
        let migrator = PortGroupMigrator::new(self.api);
        let vm_name = self.config.appliance_vm_name.as_str();
        let moved = self
            .conn
            .with_session(&host.endpoint, &host.credential, |session| async move {
                migrator.migrate(&session, vm_name, from, to).await
            })
            .await?;
        Ok(format!("改绑 {} 块网卡 [{}] -> [{}]", moved, from, to))
    }

    /// 关闭回滚保护并读回校验
    async fn step_disable_rollback(&self) -> Result<String> {
        let api = self.api;
        self.conn
            .with_session(
                &self.config.appliance,
                &self.config.appliance_credential,
                |session| async move {
                    api.set_advanced_setting(&session, ROLLBACK_SETTING_KEY, "false")
                        .await?;
                    let value = api.get_advanced_setting(&session, ROLLBACK_SETTING_KEY).await?;
                    if value.as_deref() != Some("false") {
                        return Err(MigrationError::VerificationFailed(format!(
                            "{} 读回值为 {:?}, 期望 \"false\"",
                            ROLLBACK_SETTING_KEY, value
                        )));
                    }
                    Ok(())
                },
            )
            .await?;
        Ok(format!("{} = false", ROLLBACK_SETTING_KEY))
    }

    /// 重启 vCenter 设备并等待服务恢复
    async fn step_reboot_appliance(&self, host: &HostEntry) -> Result<String> {
        let waiter = RebootWaiter::new(self.api, self.config.wait, self.cancel.clone());
        let waiter = &waiter;
        let vm_name = self.config.appliance_vm_name.as_str();
        self.conn
            .with_session(&host.endpoint, &host.credential, |session| async move {
                waiter.issue_reboot(&session, vm_name).await
            })
            .await?;
        waiter
            .wait_until_ready(&self.config.appliance, &self.config.appliance_credential)
            .await?;
        Ok(format!(
            "设备 {} 已完成重启并恢复服务",
            self.config.appliance.address()
        ))
    }

    /// 对单台主机提交割接变更集
    async fn step_migrate_host(&self, host: &HostEntry) -> Result<String> {
        let plan = self.config.plan_for(host);
        let reconfigurator = HostReconfigurator::new(self.api);
        let reconfigurator = &reconfigurator;
        let plan_ref = &plan;
        self.conn
            .with_session(&host.endpoint, &host.credential, |session| async move {
                reconfigurator.apply(&session, plan_ref).await
            })
            .await?;
        let uplinks: Vec<String> = plan
            .uplinks
            .iter()
            .map(|u| format!("{}->{}", u.device, u.port_key))
            .collect();
        Ok(format!(
            "主机 {} 割接完成 (上行链路 {})",
            plan.host,
            uplinks.join(", ")
        ))
    }

    /// 逐台割接除首台外的主机，主机之间响应取消
    async fn step_migrate_remaining(&self) -> Result<String> {
        let remaining = &self.config.hosts[1..];
        if remaining.is_empty() {
            info!("无其余主机需要割接");
            return Ok("无其余主机".to_string());
        }
        for (i, host) in remaining.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(MigrationError::Cancelled {
                    step: format!("割接主机 {}", host.endpoint.host),
                });
            }
            info!(
                "割接其余主机 {}/{}: {}",
                i + 1,
                remaining.len(),
                host.endpoint.host
            );
            self.step_migrate_host(host).await?;
        }
        Ok(format!("已割接 {} 台其余主机", remaining.len()))
    }
}
