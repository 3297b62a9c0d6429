//! VNM 通用类型定义
//!
//! 此 crate 包含 vSphere 客户端与割接编排核心之间共享的基础类型。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 端点角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointRole {
    /// vCenter 管理设备
    ManagementAppliance,
    /// ESXi 主机
    Host,
}

/// 远端管理端点（vCenter 设备或 ESXi 主机）
///
/// 在进程启动时由配置解析一次，之后不再变更。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// 主机名（FQDN）
    pub host: String,

    /// HTTPS 端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 端点角色
    pub role: EndpointRole,
}

fn default_port() -> u16 {
    443
}

impl Endpoint {
    /// 创建 vCenter 管理设备端点
    pub fn management(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            role: EndpointRole::ManagementAppliance,
        }
    }

    /// 创建 ESXi 主机端点
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            role: EndpointRole::Host,
        }
    }

    /// 返回 `host:port` 形式的套接字地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 返回 `https://host:port` 形式的基础 URL
    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// 登录凭据
///
/// 仅存于内存，`Debug` 输出不包含口令。
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    /// 用户名
    pub username: String,

    /// 口令
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"******")
            .finish()
    }
}

/// 将短主机名与 DNS 子域拼接为 FQDN
///
/// 已经带有该子域后缀的主机名原样返回。
pub fn join_fqdn(hostname: &str, subdomain: &str) -> String {
    let subdomain = subdomain.trim_matches('.');
    if subdomain.is_empty() || hostname.ends_with(&format!(".{}", subdomain)) {
        hostname.to_string()
    } else {
        format!("{}.{}", hostname, subdomain)
    }
}
