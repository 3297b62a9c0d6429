//! 割接流程集成测试
//!
//! 用可编排的测试桩替代真实管理 API，验证六步流程的执行顺序、
//! 失败即停、会话配对和取消语义。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vnm_common::{Credential, Endpoint};
use vnm_migration::{
    HostEntry, MigrationConfig, MigrationError, MigrationOrchestrator, PortGroupMigrator,
    SwitchSettings, UplinkAssignment, WaitPolicy, WorkflowState, ROLLBACK_SETTING_KEY,
    SSO_ADMIN_USERNAME,
};
use vnm_vsphere::types::{HostConfigChangeSet, VmNic};
use vnm_vsphere::{ManagementApi, Session, VsphereError};

// ============================================
// 测试桩
// ============================================

/// 记录所有调用并可注入故障的管理 API 桩
#[derive(Default)]
struct FakeApi {
    /// 按发生顺序记录的调用日志
    log: Mutex<Vec<String>>,
    /// 每个端点成功建立的会话数
    opens: Mutex<HashMap<String, usize>>,
    /// 每个端点关闭的会话数
    closes: Mutex<HashMap<String, usize>>,
    /// 按虚拟机名记录的网卡状态
    nics: Mutex<HashMap<String, Vec<VmNic>>>,
    /// vCenter 高级设置存储
    settings: Mutex<HashMap<String, String>>,
    /// 已接受变更集的主机（按提交顺序）
    submitted: Mutex<Vec<String>>,
    /// 逐次探测的可达性结果，最后一个值保持不变
    reachability: Mutex<VecDeque<bool>>,
    /// 对指定主机拒绝建立会话
    fail_connect_for: Mutex<Option<String>>,
    /// 对指定主机拒绝变更集
    fail_submit_for: Mutex<Option<String>>,
    /// 拒绝改绑到指定端口组
    fail_rebind_to: Mutex<Option<String>>,
    /// 写入高级设置时静默丢弃（模拟设置未生效）
    ignore_setting_writes: AtomicBool,
    /// 写入高级设置时触发取消
    cancel_on_set: Mutex<Option<CancellationToken>>,
    token_seq: AtomicUsize,
}

impl FakeApi {
    /// vCenter 虚拟机单网卡、重启后立即恢复可达的初始环境
    fn for_cutover() -> Self {
        let api = Self::default();
        api.nics.lock().unwrap().insert(
            "vcenter-1".to_string(),
            vec![VmNic {
                key: "4000".to_string(),
                label: "Network adapter 1".to_string(),
                port_group: Some("SDDC-DPortGroup-Mgmt".to_string()),
            }],
        );
        api.reachability.lock().unwrap().extend([false, true]);
        api
    }

    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn log_snapshot(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManagementApi for FakeApi {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        _credential: &Credential,
    ) -> vnm_vsphere::Result<Session> {
        if let Some(host) = self.fail_connect_for.lock().unwrap().as_deref() {
            if endpoint.host == host {
                self.push(format!("connect-refused {}", endpoint.host));
                return Err(VsphereError::AuthError("凭据被拒绝".to_string()));
            }
        }
        let n = self.token_seq.fetch_add(1, Ordering::SeqCst);
        *self
            .opens
            .lock()
            .unwrap()
            .entry(endpoint.host.clone())
            .or_insert(0) += 1;
        self.push(format!("connect {}", endpoint.host));
        Ok(Session::new(format!("token-{}", n), endpoint.clone()))
    }

    async fn disconnect(&self, session: Session) -> vnm_vsphere::Result<()> {
        let host = session.endpoint().host.clone();
        *self.closes.lock().unwrap().entry(host.clone()).or_insert(0) += 1;
        self.push(format!("disconnect {}", host));
        Ok(())
    }

    async fn is_reachable(&self, _endpoint: &Endpoint) -> bool {
        let mut schedule = self.reachability.lock().unwrap();
        match schedule.len() {
            0 => false,
            1 => schedule[0],
            _ => schedule.pop_front().unwrap(),
        }
    }

    async fn list_vm_nics(
        &self,
        _session: &Session,
        vm_name: &str,
    ) -> vnm_vsphere::Result<Vec<VmNic>> {
        self.push(format!("list-nics {}", vm_name));
        Ok(self
            .nics
            .lock()
            .unwrap()
            .get(vm_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_vm_nic_backing(
        &self,
        _session: &Session,
        vm_name: &str,
        nic_key: &str,
        port_group: &str,
    ) -> vnm_vsphere::Result<()> {
        if let Some(target) = self.fail_rebind_to.lock().unwrap().as_deref() {
            if port_group == target {
                self.push(format!("rebind-refused {} -> [{}]", vm_name, port_group));
                return Err(VsphereError::ApiError(500, "设备繁忙".to_string()));
            }
        }
        self.push(format!("rebind {} {} -> [{}]", vm_name, nic_key, port_group));
        if let Some(nics) = self.nics.lock().unwrap().get_mut(vm_name) {
            for nic in nics.iter_mut() {
                if nic.key == nic_key {
                    nic.port_group = Some(port_group.to_string());
                }
            }
        }
        Ok(())
    }

    async fn get_advanced_setting(
        &self,
        _session: &Session,
        key: &str,
    ) -> vnm_vsphere::Result<Option<String>> {
        self.push(format!("get-setting {}", key));
        Ok(self.settings.lock().unwrap().get(key).cloned())
    }

    async fn set_advanced_setting(
        &self,
        _session: &Session,
        key: &str,
        value: &str,
    ) -> vnm_vsphere::Result<()> {
        self.push(format!("set-setting {}={}", key, value));
        if let Some(token) = self.cancel_on_set.lock().unwrap().as_ref() {
            token.cancel();
        }
        if !self.ignore_setting_writes.load(Ordering::SeqCst) {
            self.settings
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn submit_host_network_config(
        &self,
        _session: &Session,
        change_set: &HostConfigChangeSet,
    ) -> vnm_vsphere::Result<()> {
        if let Some(host) = self.fail_submit_for.lock().unwrap().as_deref() {
            if change_set.host == host {
                self.push(format!("submit-rejected {}", change_set.host));
                return Err(VsphereError::ConfigRejected(
                    "无效的上行链路端口".to_string(),
                ));
            }
        }
        self.push(format!(
            "submit {} (uplinks={})",
            change_set.host,
            change_set.uplink_bindings.len()
        ));
        self.submitted.lock().unwrap().push(change_set.host.clone());
        Ok(())
    }

    async fn reboot_guest(&self, _session: &Session, vm_name: &str) -> vnm_vsphere::Result<()> {
        self.push(format!("reboot {}", vm_name));
        Ok(())
    }
}

// ============================================
// 辅助
// ============================================

fn test_config(host_count: usize) -> MigrationConfig {
    let hosts = (1..=host_count)
        .map(|i| HostEntry {
            endpoint: Endpoint::host(format!("esxi-{}.vrack.local", i)),
            credential: Credential::new("root", "EvoSddc!2016"),
            uplinks: vec![
                UplinkAssignment {
                    device: "vmnic0".to_string(),
                    port_key: format!("{}", i * 8),
                },
                UplinkAssignment {
                    device: "vmnic1".to_string(),
                    port_key: format!("{}", i * 8 + 1),
                },
            ],
        })
        .collect();
    MigrationConfig {
        appliance: Endpoint::management("vcenter-1.vrack.local"),
        appliance_credential: Credential::new(SSO_ADMIN_USERNAME, "SsoAdmin!2016"),
        appliance_vm_name: "vcenter-1".to_string(),
        mgmt_port_group: "SDDC-DPortGroup-Mgmt".to_string(),
        hosts,
        switch: SwitchSettings::default(),
        wait: WaitPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            phase_deadline: Duration::from_millis(500),
        },
    }
}

fn pos(log: &[String], needle: &str) -> usize {
    log.iter()
        .position(|entry| entry.contains(needle))
        .unwrap_or_else(|| panic!("日志中找不到 [{}]: {:?}", needle, log))
}

/// 每个端点建立的会话数必须与关闭数一致
fn assert_sessions_paired(api: &FakeApi) {
    let opens = api.opens.lock().unwrap();
    let closes = api.closes.lock().unwrap();
    for (host, count) in opens.iter() {
        assert_eq!(
            Some(count),
            closes.get(host),
            "主机 {} 的会话未成对关闭",
            host
        );
    }
    for (host, count) in closes.iter() {
        assert_eq!(
            Some(count),
            opens.get(host),
            "主机 {} 的关闭多于建立",
            host
        );
    }
}

// ============================================
// 测试
// ============================================

#[tokio::test]
async fn test_full_cutover_across_four_hosts() {
    let api = FakeApi::for_cutover();
    let mut orchestrator = MigrationOrchestrator::new(&api, test_config(4));

    let report = orchestrator.run().await;

    assert!(report.is_success(), "割接应成功: {:?}", report.error);
    assert_eq!(report.final_state, WorkflowState::Done);
    assert_eq!(orchestrator.state(), WorkflowState::Done);
    assert_eq!(report.total_hosts, 4);
    assert_eq!(report.success_count, 6);
    assert_eq!(report.failed_count, 0);

    // 四台主机的变更集全部按顺序提交
    assert_eq!(
        *api.submitted.lock().unwrap(),
        vec![
            "esxi-1.vrack.local",
            "esxi-2.vrack.local",
            "esxi-3.vrack.local",
            "esxi-4.vrack.local"
        ]
    );

    // 回滚保护已写入
    assert_eq!(
        api.settings.lock().unwrap().get(ROLLBACK_SETTING_KEY).map(String::as_str),
        Some("false")
    );

    // vCenter 虚拟机网卡最终回到分布式管理端口组
    assert_eq!(
        api.nics.lock().unwrap()["vcenter-1"][0].port_group.as_deref(),
        Some("SDDC-DPortGroup-Mgmt")
    );

    // 步骤按固定顺序执行
    let log = api.log_snapshot();
    assert!(pos(&log, "rebind vcenter-1 4000 -> [VM Network]") < pos(&log, "set-setting"));
    assert!(pos(&log, "set-setting") < pos(&log, "reboot vcenter-1"));
    assert!(pos(&log, "reboot vcenter-1") < pos(&log, "submit esxi-1.vrack.local"));
    assert!(
        pos(&log, "submit esxi-1.vrack.local")
            < pos(&log, "rebind vcenter-1 4000 -> [SDDC-DPortGroup-Mgmt]")
    );
    assert!(
        pos(&log, "rebind vcenter-1 4000 -> [SDDC-DPortGroup-Mgmt]")
            < pos(&log, "submit esxi-2.vrack.local")
    );

    assert_sessions_paired(&api);
}

#[tokio::test]
async fn test_single_host_cutover_has_no_remaining_phase() {
    let api = FakeApi::for_cutover();
    let mut orchestrator = MigrationOrchestrator::new(&api, test_config(1));

    let report = orchestrator.run().await;

    assert!(report.is_success(), "割接应成功: {:?}", report.error);
    assert_eq!(*api.submitted.lock().unwrap(), vec!["esxi-1.vrack.local"]);
    assert_eq!(report.steps[5].output.as_deref(), Some("无其余主机"));
    assert_sessions_paired(&api);
}

#[tokio::test]
async fn test_repeat_port_group_migration_reports_missing_binding() {
    let api = FakeApi::for_cutover();
    let session = api
        .connect(
            &Endpoint::host("esxi-1.vrack.local"),
            &Credential::new("root", "EvoSddc!2016"),
        )
        .await
        .unwrap();
    let migrator = PortGroupMigrator::new(&api);

    let moved = migrator
        .migrate(&session, "vcenter-1", "SDDC-DPortGroup-Mgmt", "VM Network")
        .await
        .unwrap();
    assert_eq!(moved, 1);

    // 网卡已不在源端口组，重复迁移必须报错
    let err = migrator
        .migrate(&session, "vcenter-1", "SDDC-DPortGroup-Mgmt", "VM Network")
        .await
        .unwrap_err();
    match err {
        MigrationError::BindingNotFound { vm, port_group } => {
            assert_eq!(vm, "vcenter-1");
            assert_eq!(port_group, "SDDC-DPortGroup-Mgmt");
        }
        other => panic!("期望 BindingNotFound，实际 {:?}", other),
    }

    // 状态未被第二次调用改动
    assert_eq!(
        api.nics.lock().unwrap()["vcenter-1"][0].port_group.as_deref(),
        Some("VM Network")
    );
}

#[tokio::test]
async fn test_submit_failure_halts_pipeline() {
    let api = FakeApi::for_cutover();
    *api.fail_submit_for.lock().unwrap() = Some("esxi-1.vrack.local".to_string());
    let mut orchestrator = MigrationOrchestrator::new(&api, test_config(4));

    let report = orchestrator.run().await;

    assert!(!report.is_success());
    assert_eq!(report.final_state, WorkflowState::Failed);
    assert_eq!(orchestrator.state(), WorkflowState::Failed);
    assert_eq!(report.success_count, 3);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.skipped_count, 2);

    let error = report.error.as_deref().unwrap_or("");
    assert!(error.contains("esxi-1.vrack.local"), "{}", error);
    assert!(error.contains("网络配置提交失败"), "{}", error);

    // 失败后不得再有任何动作：没有回迁网卡，没有其余主机的提交
    let log = api.log_snapshot();
    assert!(!log
        .iter()
        .any(|e| e.contains("rebind vcenter-1 4000 -> [SDDC-DPortGroup-Mgmt]")));
    assert!(!log.iter().any(|e| e.contains("esxi-2.vrack.local")));
    assert!(api.submitted.lock().unwrap().is_empty());

    // 提交失败的那个会话也必须被关闭
    assert_sessions_paired(&api);
}

#[tokio::test]
async fn test_setting_verification_failure_stops_before_reboot() {
    let api = FakeApi::for_cutover();
    api.ignore_setting_writes.store(true, Ordering::SeqCst);
    let mut orchestrator = MigrationOrchestrator::new(&api, test_config(2));

    let report = orchestrator.run().await;

    assert_eq!(report.final_state, WorkflowState::Failed);
    assert_eq!(report.success_count, 1);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.skipped_count, 4);
    assert!(report.error.as_deref().unwrap_or("").contains("校验失败"));

    let log = api.log_snapshot();
    assert!(
        !log.iter().any(|e| e.starts_with("reboot")),
        "设置未生效时不得重启设备: {:?}",
        log
    );
    assert_sessions_paired(&api);
}

#[tokio::test]
async fn test_appliance_auth_failure_halts_after_first_step() {
    let api = FakeApi::for_cutover();
    *api.fail_connect_for.lock().unwrap() = Some("vcenter-1.vrack.local".to_string());
    let mut orchestrator = MigrationOrchestrator::new(&api, test_config(2));

    let report = orchestrator.run().await;

    assert_eq!(report.final_state, WorkflowState::Failed);
    assert_eq!(report.success_count, 1);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.skipped_count, 4);
    assert!(report.error.as_deref().unwrap_or("").contains("认证失败"));

    // 设备端没有建立过会话，主机端的会话全部成对
    assert!(!api.opens.lock().unwrap().contains_key("vcenter-1.vrack.local"));
    assert_sessions_paired(&api);
}

#[tokio::test]
async fn test_missing_appliance_binding_fails_first_step() {
    // 虚拟机清单为空，第一步找不到待迁移的网卡绑定
    let api = FakeApi::default();
    let mut orchestrator = MigrationOrchestrator::new(&api, test_config(2));

    let report = orchestrator.run().await;

    assert_eq!(report.final_state, WorkflowState::Failed);
    assert_eq!(report.success_count, 0);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.skipped_count, 5);
    assert!(report.error.as_deref().unwrap_or("").contains("vcenter-1"));

    // 第一步失败后不得碰高级设置，也不得有任何提交
    let log = api.log_snapshot();
    assert!(!log.iter().any(|e| e.starts_with("set-setting")), "{:?}", log);
    assert!(api.submitted.lock().unwrap().is_empty());
    assert_sessions_paired(&api);
}

#[tokio::test]
async fn test_reboot_wait_timeout_stops_before_host_cutover() {
    let api = FakeApi::for_cutover();
    // 设备始终可达，停机检测会一直等到阶段时限
    *api.reachability.lock().unwrap() = VecDeque::from([true]);
    let mut orchestrator = MigrationOrchestrator::new(&api, test_config(2));

    let report = orchestrator.run().await;

    assert_eq!(report.final_state, WorkflowState::Failed);
    assert_eq!(report.success_count, 2);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.skipped_count, 3);
    assert!(report.error.as_deref().unwrap_or("").contains("超时"));

    assert!(api.submitted.lock().unwrap().is_empty());
    assert_sessions_paired(&api);
}

#[tokio::test]
async fn test_rebind_failure_on_return_stops_remaining_hosts() {
    let api = FakeApi::for_cutover();
    // 第五步把 vCenter 虚拟机迁回分布式端口组时失败
    *api.fail_rebind_to.lock().unwrap() = Some("SDDC-DPortGroup-Mgmt".to_string());
    let mut orchestrator = MigrationOrchestrator::new(&api, test_config(3));

    let report = orchestrator.run().await;

    assert_eq!(report.final_state, WorkflowState::Failed);
    assert_eq!(report.success_count, 4);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.skipped_count, 1);

    // 首台主机已割接，其余主机不得再有任何动作
    assert_eq!(*api.submitted.lock().unwrap(), vec!["esxi-1.vrack.local"]);
    let log = api.log_snapshot();
    assert!(!log.iter().any(|e| e.contains("esxi-2.vrack.local")), "{:?}", log);
    assert_sessions_paired(&api);
}

#[tokio::test]
async fn test_second_host_submit_failure_leaves_remaining_untouched() {
    let api = FakeApi::for_cutover();
    *api.fail_submit_for.lock().unwrap() = Some("esxi-2.vrack.local".to_string());
    let mut orchestrator = MigrationOrchestrator::new(&api, test_config(4));

    let report = orchestrator.run().await;

    assert_eq!(report.final_state, WorkflowState::Failed);
    assert_eq!(report.success_count, 5);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.skipped_count, 0);

    let error = report.error.as_deref().unwrap_or("");
    assert!(error.contains("esxi-2.vrack.local"), "{}", error);

    // 首台主机的提交保留，后续主机一台都不碰
    assert_eq!(*api.submitted.lock().unwrap(), vec!["esxi-1.vrack.local"]);
    let log = api.log_snapshot();
    assert!(!log.iter().any(|e| e.contains("esxi-3.vrack.local")), "{:?}", log);
    assert!(!log.iter().any(|e| e.contains("esxi-4.vrack.local")), "{:?}", log);
    assert_sessions_paired(&api);
}

#[tokio::test]
async fn test_cancellation_takes_effect_between_steps() {
    let api = FakeApi::for_cutover();
    let cancel = CancellationToken::new();
    // 步骤 2 写设置时触发取消，流程应在步骤 3 开始前停下
    *api.cancel_on_set.lock().unwrap() = Some(cancel.clone());
    let mut orchestrator =
        MigrationOrchestrator::new(&api, test_config(2)).with_cancellation(cancel);

    let report = orchestrator.run().await;

    assert_eq!(report.final_state, WorkflowState::Failed);
    assert_eq!(report.success_count, 2);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.skipped_count, 3);
    assert!(report.error.as_deref().unwrap_or("").contains("取消"));

    let log = api.log_snapshot();
    assert!(
        !log.iter().any(|e| e.starts_with("reboot")),
        "取消后不得再下发重启: {:?}",
        log
    );
    assert!(api.submitted.lock().unwrap().is_empty());
    assert_sessions_paired(&api);
}
