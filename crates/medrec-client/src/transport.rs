//! HTTP传输客户端
//!
//! 把平台HTTP原语封装成对远端记录接口的调用，统一解析
//! `{success, data?, message?}`响应信封并映射到类型化错误。

use std::sync::Arc;

use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use medrec_core::{MedrecError, Result};

use crate::config::ClientConfig;

/// 凭证提供者
///
/// token部署下返回已签发的bearer token；会话cookie部署下返回None。
/// 共享请求路径不得假设token一定存在。
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// 不携带凭证的提供者（登录前或纯cookie部署）
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// 接口统一响应信封
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiEnvelope {
    /// success为false时转为接口错误
    ///
    /// 消息优先取服务端下发的，缺失时用调用方的操作默认文案。
    pub fn require_success(self, default_message: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(MedrecError::Api(
                self.message.unwrap_or_else(|| default_message.to_string()),
            ))
        }
    }

    /// 取data字段，缺失同样视为接口错误
    pub fn into_data(self, default_message: &str) -> Result<Value> {
        let envelope = self.require_success(default_message)?;
        envelope
            .data
            .ok_or_else(|| MedrecError::Api(default_message.to_string()))
    }
}

/// HTTP传输客户端
///
/// 持有进程内共享的reqwest客户端。cookie jar常开以支持会话cookie
/// 部署；凭证提供者给出token时再额外附加Authorization头。
/// 除HTTP调用本身外无任何副作用，也从不自动重试。
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = config.api.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| MedrecError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// 共享的底层HTTP客户端（上传客户端复用同一个连接池和cookie jar）
    pub fn http(&self) -> Client {
        self.http.clone()
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// 发起一次JSON请求并解析统一信封
    ///
    /// 错误映射：无响应 → Network；非2xx → Transport（消息取响应体的
    /// message字段，取不到用通用文案）；2xx但响应体不是合法JSON → Api。
    pub async fn request(
        &self,
        endpoint: &str,
        method: Method,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiEnvelope> {
        let url = self.url(endpoint);
        debug!("{} {} query={:?}", method, url, query);

        let mut request = self.http.request(method.clone(), &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.credentials.bearer_token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MedrecError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MedrecError::Network(e.to_string()))?;

        if !status.is_success() {
            warn!("{} {} failed with status {}", method, url, status);
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .and_then(|m| m.as_str())
                        .map(|m| m.to_string())
                })
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            return Err(MedrecError::Transport {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str::<ApiEnvelope>(&text)
            .map_err(|_| MedrecError::Api("Invalid response from server".to_string()))
    }

    pub async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<ApiEnvelope> {
        self.request(endpoint, Method::GET, query, None).await
    }

    pub async fn post(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        body: &Value,
    ) -> Result<ApiEnvelope> {
        self.request(endpoint, Method::POST, query, Some(body)).await
    }

    pub async fn put(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        body: &Value,
    ) -> Result<ApiEnvelope> {
        self.request(endpoint, Method::PUT, query, Some(body)).await
    }

    pub async fn delete(&self, endpoint: &str, query: &[(&str, String)]) -> Result<ApiEnvelope> {
        self.request(endpoint, Method::DELETE, query, None).await
    }
}
