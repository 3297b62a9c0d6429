//! 割接流程错误定义

use thiserror::Error;
use vnm_vsphere::VsphereError;

/// 割接流程错误类型
#[derive(Error, Debug)]
pub enum MigrationError {
    /// 虚拟机上没有任何网卡绑定在源端口组
    #[error("虚拟机 {vm} 没有绑定在端口组 [{port_group}] 的网卡")]
    BindingNotFound { vm: String, port_group: String },

    /// 主机接受了连接但拒绝或未能执行变更集
    #[error("主机 {host} 网络配置提交失败: {reason}")]
    ConfigSubmit { host: String, reason: String },

    /// 等待阶段超过截止时长
    #[error("等待阶段 [{phase}] 超时 (已等待 {waited_secs} 秒)")]
    ReconfigurationTimeout { phase: String, waited_secs: u64 },

    /// 操作员在步骤之间取消了流程
    #[error("流程在 [{step}] 前被取消")]
    Cancelled { step: String },

    /// 写后读校验不一致
    #[error("校验失败: {0}")]
    VerificationFailed(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("管理 API 错误: {0}")]
    Api(#[from] VsphereError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),
}

/// 割接流程结果类型
pub type Result<T> = std::result::Result<T, MigrationError>;
