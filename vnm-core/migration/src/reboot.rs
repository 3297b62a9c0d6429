//! 设备重启与就绪等待

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vnm_common::{Credential, Endpoint};
use vnm_vsphere::{ManagementApi, Session, VsphereError};

use crate::error::{MigrationError, Result};

/// 等待策略：指数退避 + 阶段总时限
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitPolicy {
    /// 首次重试间隔
    pub initial_delay: Duration,
    /// 重试间隔上限
    pub max_delay: Duration,
    /// 间隔退避倍率
    pub backoff_multiplier: f64,
    /// 单个等待阶段的总时限
    pub phase_deadline: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            phase_deadline: Duration::from_secs(1800),
        }
    }
}

impl WaitPolicy {
    /// 下一次重试间隔，不超过 max_delay
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.backoff_multiplier).min(self.max_delay)
    }
}

/// 设备重启等待器
///
/// 重启指令经宿主机会话下发给 vCenter 虚拟机，随后按三个阶段
/// 判定重启完成：设备先变为不可达（确认真的停机了），再恢复
/// 可达，最后管理服务能成功建立会话。每个阶段独立计时，超过
/// 时限即失败。
pub struct RebootWaiter<'a, A: ManagementApi> {
    api: &'a A,
    policy: WaitPolicy,
    cancel: CancellationToken,
}

impl<'a, A: ManagementApi> RebootWaiter<'a, A> {
    pub fn new(api: &'a A, policy: WaitPolicy, cancel: CancellationToken) -> Self {
        Self { api, policy, cancel }
    }

    /// 通过宿主机会话重启 vCenter 虚拟机的客户机系统
    pub async fn issue_reboot(&self, host_session: &Session, appliance_vm: &str) -> Result<()> {
        info!("重启 vCenter 虚拟机: {}", appliance_vm);
        self.api.reboot_guest(host_session, appliance_vm).await?;
        Ok(())
    }

    /// 等待设备完成一次完整的重启周期
    pub async fn wait_until_ready(
        &self,
        appliance: &Endpoint,
        credential: &Credential,
    ) -> Result<()> {
        let api = self.api;

        info!("等待设备 {} 停机", appliance.address());
        self.wait_for_phase("设备停机", || {
            let endpoint = appliance;
            async move { !api.is_reachable(endpoint).await }
        })
        .await?;

        info!("等待设备 {} 网络恢复", appliance.address());
        self.wait_for_phase("设备恢复", || {
            let endpoint = appliance;
            async move { api.is_reachable(endpoint).await }
        })
        .await?;

        info!("等待设备 {} 管理服务就绪", appliance.address());
        self.wait_for_service_ready(appliance, credential).await
    }

    /// 轮询探测直到条件满足、超时或被取消
    async fn wait_for_phase<F, Fut>(&self, phase: &str, mut probe: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let start = Instant::now();
        let mut delay = self.policy.initial_delay;
        loop {
            if self.cancel.is_cancelled() {
                return Err(MigrationError::Cancelled {
                    step: phase.to_string(),
                });
            }
            if probe().await {
                debug!("阶段 [{}] 完成，耗时 {:?}", phase, start.elapsed());
                return Ok(());
            }
            if start.elapsed() >= self.policy.phase_deadline {
                return Err(MigrationError::ReconfigurationTimeout {
                    phase: phase.to_string(),
                    waited_secs: start.elapsed().as_secs(),
                });
            }
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(MigrationError::Cancelled {
                        step: phase.to_string(),
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
            delay = self.policy.next_delay(delay);
        }
    }

    /// 会话能建立即视为管理服务就绪；认证失败不会随时间恢复，立即终止
    async fn wait_for_service_ready(
        &self,
        appliance: &Endpoint,
        credential: &Credential,
    ) -> Result<()> {
        let phase = "服务就绪";
        let start = Instant::now();
        let mut delay = self.policy.initial_delay;
        loop {
            if self.cancel.is_cancelled() {
                return Err(MigrationError::Cancelled {
                    step: phase.to_string(),
                });
            }
            match self.api.connect(appliance, credential).await {
                Ok(session) => {
                    if let Err(e) = self.api.disconnect(session).await {
                        warn!("就绪探测的会话关闭失败: {}", e);
                    }
                    info!("设备 {} 管理服务已就绪", appliance.address());
                    return Ok(());
                }
                Err(e @ VsphereError::AuthError(_)) => {
                    error!("设备认证失败，停止等待: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    debug!("管理服务尚未就绪: {}", e);
                }
            }
            if start.elapsed() >= self.policy.phase_deadline {
                return Err(MigrationError::ReconfigurationTimeout {
                    phase: phase.to_string(),
                    waited_secs: start.elapsed().as_secs(),
                });
            }
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(MigrationError::Cancelled {
                        step: phase.to_string(),
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
            delay = self.policy.next_delay(delay);
        }
    }
}
