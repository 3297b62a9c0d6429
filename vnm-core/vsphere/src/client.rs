//! vSphere 管理 API 客户端实现
//!
//! 同一个客户端实例可以面向多个端点（vCenter 设备与各台 ESXi 主机）
//! 发起调用：目标由每次传入的 [`Session`] 决定，客户端自身不保存
//! 任何会话状态。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use vnm_common::{Credential, Endpoint};

use crate::api::ManagementApi;
use crate::error::{Result, VsphereError};
use crate::session::Session;
use crate::types::{HostConfigChangeSet, VmNic};

/// 会话令牌请求头
const SESSION_HEADER: &str = "vmware-api-session-id";

/// vSphere 客户端配置
#[derive(Debug, Clone)]
pub struct VsphereConfig {
    /// 连接超时（秒）
    pub connect_timeout: u64,

    /// 请求超时（秒）
    pub request_timeout: u64,

    /// 可达性探测超时（秒）
    pub probe_timeout: u64,

    /// 是否验证 SSL 证书（自签名环境置 false）
    pub verify_ssl: bool,
}

impl Default for VsphereConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 10,
            request_timeout: 60,
            probe_timeout: 5,
            verify_ssl: false,
        }
    }
}

/// vSphere 管理 API 客户端
pub struct VsphereClient {
    /// HTTP 客户端
    http_client: Client,

    /// 配置
    config: VsphereConfig,
}

impl VsphereClient {
    /// 创建新的 vSphere 客户端
    pub fn new(config: VsphereConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| VsphereError::HttpError(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    // ============================================
    // 请求辅助
    // ============================================

    /// 发送请求并解析 JSON 响应
    async fn request<T: Serialize, R: DeserializeOwned>(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        body: Option<T>,
    ) -> Result<R> {
        let response = self.send(session, method, path, body).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| VsphereError::ParseError(e.to_string()))
    }

    /// 发送请求并丢弃响应体
    async fn execute<T: Serialize>(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        body: Option<T>,
    ) -> Result<()> {
        self.send(session, method, path, body).await?;
        Ok(())
    }

    async fn send<T: Serialize>(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        body: Option<T>,
    ) -> Result<Response> {
        let url = format!("{}{}", session.endpoint().base_url(), path);
        debug!("vSphere API 请求: {} {}", method, url);

        let mut request = self
            .http_client
            .request(method, &url)
            .header(SESSION_HEADER, session.token());

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(map_send_error)?;
        check_status(response).await
    }

    /// 带查询参数的 GET 请求（参数自动进行 URL 编码）
    async fn get_with_query<R: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<R> {
        let url = format!("{}{}", session.endpoint().base_url(), path);
        debug!("vSphere API 请求: GET {} {:?}", url, query);

        let response = self
            .http_client
            .get(&url)
            .header(SESSION_HEADER, session.token())
            .query(query)
            .send()
            .await
            .map_err(map_send_error)?;

        let response = check_status(response).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| VsphereError::ParseError(e.to_string()))
    }

    /// 按名称查找虚拟机标识
    async fn find_vm_id(&self, session: &Session, vm_name: &str) -> Result<String> {
        let vms: Vec<VmSummary> = self
            .get_with_query(session, "/api/vcenter/vm", &[("names", vm_name)])
            .await?;

        vms.into_iter()
            .next()
            .map(|vm| vm.vm)
            .ok_or_else(|| VsphereError::NotFound(format!("虚拟机不存在: {}", vm_name)))
    }

    /// 按名称查找网络（标准或分布式端口组）
    async fn find_network(&self, session: &Session, name: &str) -> Result<NetworkSummary> {
        let networks: Vec<NetworkSummary> = self
            .get_with_query(session, "/api/vcenter/network", &[("names", name)])
            .await?;

        networks
            .into_iter()
            .next()
            .ok_or_else(|| VsphereError::NotFound(format!("端口组不存在: {}", name)))
    }
}

#[async_trait]
impl ManagementApi for VsphereClient {
    async fn connect(&self, endpoint: &Endpoint, credential: &Credential) -> Result<Session> {
        info!("建立管理会话: {} (用户 {})", endpoint, credential.username);

        let url = format!("{}/api/session", endpoint.base_url());
        let response = self
            .http_client
            .post(&url)
            .basic_auth(&credential.username, Some(&credential.password))
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(VsphereError::AuthError(format!(
                "{} 拒绝了用户 {} 的凭据",
                endpoint, credential.username
            )));
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误响应".to_string());
            return Err(VsphereError::ApiError(status.as_u16(), text));
        }

        let token: String = response
            .json()
            .await
            .map_err(|e| VsphereError::ParseError(e.to_string()))?;

        info!("会话已建立: {}", endpoint);
        Ok(Session::new(token, endpoint.clone()))
    }

    async fn disconnect(&self, session: Session) -> Result<()> {
        debug!("关闭管理会话: {}", session.endpoint());

        // 服务端可能已主动失效该会话，删除失败不视为错误
        let url = format!("{}/api/session", session.endpoint().base_url());
        let _ = self
            .http_client
            .delete(&url)
            .header(SESSION_HEADER, session.token())
            .send()
            .await;

        Ok(())
    }

    async fn is_reachable(&self, endpoint: &Endpoint) -> bool {
        let addr = endpoint.address();
        matches!(
            tokio::time::timeout(
                Duration::from_secs(self.config.probe_timeout),
                tokio::net::TcpStream::connect(&addr),
            )
            .await,
            Ok(Ok(_))
        )
    }

    async fn list_vm_nics(&self, session: &Session, vm_name: &str) -> Result<Vec<VmNic>> {
        let vm_id = self.find_vm_id(session, vm_name).await?;

        let summaries: Vec<NicSummary> = self
            .request(
                session,
                Method::GET,
                &format!("/api/vcenter/vm/{}/hardware/ethernet", vm_id),
                None::<()>,
            )
            .await?;

        let mut nics = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let detail: NicDetail = self
                .request(
                    session,
                    Method::GET,
                    &format!("/api/vcenter/vm/{}/hardware/ethernet/{}", vm_id, summary.nic),
                    None::<()>,
                )
                .await?;

            nics.push(VmNic {
                key: summary.nic,
                label: detail.label,
                port_group: detail.backing.network_name,
            });
        }

        debug!("虚拟机 {} 共 {} 块网卡", vm_name, nics.len());
        Ok(nics)
    }

    async fn update_vm_nic_backing(
        &self,
        session: &Session,
        vm_name: &str,
        nic_key: &str,
        port_group: &str,
    ) -> Result<()> {
        info!("改绑网卡: {} 的 {} -> {}", vm_name, nic_key, port_group);

        let vm_id = self.find_vm_id(session, vm_name).await?;
        let network = self.find_network(session, port_group).await?;

        let body = serde_json::json!({
            "backing": {
                "type": network.network_type,
                "network": network.network,
            }
        });

        self.execute(
            session,
            Method::PATCH,
            &format!("/api/vcenter/vm/{}/hardware/ethernet/{}", vm_id, nic_key),
            Some(body),
        )
        .await
    }

    async fn get_advanced_setting(&self, session: &Session, key: &str) -> Result<Option<String>> {
        let result: Result<SettingValue> = self
            .request(
                session,
                Method::GET,
                &format!("/api/vcenter/settings/{}", key),
                None::<()>,
            )
            .await;

        match result {
            Ok(setting) => Ok(Some(setting.value)),
            Err(VsphereError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_advanced_setting(&self, session: &Session, key: &str, value: &str) -> Result<()> {
        info!("写入高级设置: {} = {}", key, value);

        let body = serde_json::json!({ "value": value });
        self.execute(
            session,
            Method::PUT,
            &format!("/api/vcenter/settings/{}", key),
            Some(body),
        )
        .await
    }

    async fn submit_host_network_config(
        &self,
        session: &Session,
        change_set: &HostConfigChangeSet,
    ) -> Result<()> {
        info!(
            "提交主机网络配置变更集: {} ({} 项交换机编辑, 移除 {} 个端口组, {} 个上行链路绑定)",
            change_set.host,
            change_set.switch_edits.len(),
            change_set.removed_port_groups.len(),
            change_set.uplink_bindings.len()
        );

        let url = format!(
            "{}/api/host/network-config",
            session.endpoint().base_url()
        );
        let response = self
            .http_client
            .post(&url)
            .header(SESSION_HEADER, session.token())
            .json(change_set)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(VsphereError::InvalidSession(
                "会话已失效或未认证".to_string(),
            ));
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误响应".to_string());
            warn!("主机 {} 拒绝了变更集: {} - {}", change_set.host, status, text);
            return Err(VsphereError::ConfigRejected(format!(
                "{}: {}",
                status.as_u16(),
                text
            )));
        }

        info!("主机网络配置提交成功: {}", change_set.host);
        Ok(())
    }

    async fn reboot_guest(&self, session: &Session, vm_name: &str) -> Result<()> {
        info!("下发客户机重启: {}", vm_name);

        let vm_id = self.find_vm_id(session, vm_name).await?;
        self.execute(
            session,
            Method::POST,
            &format!("/api/vcenter/vm/{}/guest/power?action=reboot", vm_id),
            None::<()>,
        )
        .await
    }
}

/// 统一的响应状态检查
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
        return Err(VsphereError::InvalidSession(
            "会话已失效或未认证".to_string(),
        ));
    }
    if status == StatusCode::NOT_FOUND {
        let text = response.text().await.unwrap_or_default();
        return Err(VsphereError::NotFound(text));
    }
    if !status.is_success() {
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "无法读取错误响应".to_string());
        warn!("API 请求失败: {} - {}", status, text);
        return Err(VsphereError::ApiError(status.as_u16(), text));
    }

    Ok(response)
}

/// 将 reqwest 发送错误映射为客户端错误
fn map_send_error(e: reqwest::Error) -> VsphereError {
    if e.is_timeout() {
        VsphereError::Timeout(e.to_string())
    } else if e.is_connect() {
        VsphereError::Unreachable(e.to_string())
    } else {
        VsphereError::HttpError(e.to_string())
    }
}

// ============================================
// REST 响应结构（仅客户端内部使用）
// ============================================

#[derive(Debug, serde::Deserialize)]
struct VmSummary {
    vm: String,
}

#[derive(Debug, serde::Deserialize)]
struct NetworkSummary {
    network: String,
    #[serde(rename = "type")]
    network_type: String,
}

#[derive(Debug, serde::Deserialize)]
struct NicSummary {
    nic: String,
}

#[derive(Debug, serde::Deserialize)]
struct NicDetail {
    label: String,
    backing: NicBacking,
}

#[derive(Debug, serde::Deserialize)]
struct NicBacking {
    network_name: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct SettingValue {
    value: String,
}
