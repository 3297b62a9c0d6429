//! 会话类型定义
//!
//! 会话是显式传递的值对象：由 `ManagementApi::connect` 创建，
//! 作为参数传给每一次 API 调用，最终交还 `disconnect` 释放。
//! 任何组件都不在内部缓存会话令牌。

use std::fmt;
use vnm_common::Endpoint;

/// 一次已认证的管理 API 会话
///
/// 克隆代价低（令牌字符串 + 端点），`Debug` 输出不包含令牌。
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// 会话令牌（`vmware-api-session-id`）
    token: String,

    /// 会话所属端点
    endpoint: Endpoint,
}

impl Session {
    /// 创建会话（由 `ManagementApi` 实现调用）
    pub fn new(token: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            token: token.into(),
            endpoint,
        }
    }

    /// 会话令牌
    pub fn token(&self) -> &str {
        &self.token
    }

    /// 会话所属端点
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"******")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "会话@{}", self.endpoint)
    }
}
