//! 步骤级会话管理

use std::future::Future;

use tracing::{debug, warn};
use vnm_common::{Credential, Endpoint};
use vnm_vsphere::{ManagementApi, Session};

use crate::error::Result;

/// 连接管理器
///
/// 每个逻辑步骤通过 [`ConnectionManager::with_session`] 获取作用域内的
/// 会话：成功建立的会话在闭包结束后（无论成败）恰好被关闭一次，
/// 流程中同一时刻最多只有一个步骤会话存活。
pub struct ConnectionManager<'a, A: ManagementApi> {
    api: &'a A,
}

impl<'a, A: ManagementApi> ConnectionManager<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// 打开会话执行 `f`，结束后关闭会话
    ///
    /// 建立会话失败时直接返回错误（无需关闭）；
    /// 关闭失败只记录日志，不覆盖 `f` 的结果。
    pub async fn with_session<T, F, Fut>(
        &self,
        endpoint: &Endpoint,
        credential: &Credential,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = self.api.connect(endpoint, credential).await?;
        debug!("步骤会话已打开: {}", endpoint);

        let result = f(session.clone()).await;

        if let Err(e) = self.api.disconnect(session).await {
            warn!("关闭会话失败: {} - {}", endpoint, e);
        } else {
            debug!("步骤会话已关闭: {}", endpoint);
        }

        result
    }
}
