//! 会话存储
//!
//! 进程级认证状态的唯一持有者：登录标记、缓存的用户对象、可选的
//! bearer token都只经由这里读写，底层落在本地键值存储。其余组件
//! 一律通过`is_authenticated()`查询，不关心部署用的是服务端会话
//! cookie还是客户端持有的token。

use std::sync::RwLock;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use medrec_core::{Result, UserProfile};

use crate::config::endpoints;
use crate::storage::LocalStore;
use crate::transport::{ApiClient, CredentialProvider};

/// 存储键
mod keys {
    pub const AUTHENTICATED: &str = "isAuthenticated";
    pub const USER: &str = "user";
    pub const TOKEN: &str = "token";
}

/// 认证部署模式
///
/// 同一套代码要同时服务两类部署：服务端签发bearer token的，以及
/// 纯会话cookie、客户端只缓存布尔标记的。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    SessionCookie,
    BearerToken,
}

#[derive(Debug, Default)]
struct SessionState {
    authenticated: bool,
    token: Option<String>,
    user: Option<UserProfile>,
}

/// 会话存储
pub struct SessionStore {
    store: LocalStore,
    state: RwLock<SessionState>,
}

impl SessionStore {
    /// 打开会话存储，启动时读取上次持久化的状态
    pub fn open(store: LocalStore) -> Self {
        let state = SessionState {
            authenticated: store.get_bool(keys::AUTHENTICATED),
            token: store
                .get(keys::TOKEN)
                .and_then(|v| v.as_str().map(|s| s.to_string())),
            user: store.get(keys::USER).map(|v| UserProfile::from_value(&v)),
        };
        if state.authenticated {
            info!("Restored authenticated session from local store");
        }
        Self {
            store,
            state: RwLock::new(state),
        }
    }

    /// 登录
    ///
    /// 失败时把服务端的拒绝消息原样抛给调用方，从不自动重试。
    pub async fn login(&self, api: &ApiClient, email: &str, password: &str) -> Result<UserProfile> {
        let body = json!({ "email": email, "password": password });
        let envelope = api.post(endpoints::AUTH, &[], &body).await?;
        let data = envelope.into_data("Authentication failed")?;
        self.apply_login_success(&data)
    }

    /// 登录成功响应落地：缓存用户、置认证标记、保存token（若签发）
    fn apply_login_success(&self, data: &Value) -> Result<UserProfile> {
        let user_value = data.get("user").cloned().unwrap_or_else(|| data.clone());
        let user = UserProfile::from_value(&user_value);
        let token = data
            .get("token")
            .and_then(|t| t.as_str())
            .map(|t| t.to_string());

        self.store.set_bool(keys::AUTHENTICATED, true)?;
        self.store.set(keys::USER, user_value)?;
        match &token {
            Some(token) => self.store.set(keys::TOKEN, json!(token))?,
            None => self.store.remove(keys::TOKEN)?,
        }

        if let Ok(mut state) = self.state.write() {
            state.authenticated = true;
            state.token = token;
            state.user = Some(user.clone());
        }
        info!("User logged in: {}", user.email);
        Ok(user)
    }

    /// 登出
    ///
    /// 先清本地状态，再尽力通知服务端销毁会话；通知失败只记日志。
    pub async fn logout(&self, api: &ApiClient) {
        self.clear();
        if let Err(e) = api.request(endpoints::LOGOUT, Method::POST, &[], None).await {
            warn!("Logout endpoint call failed: {}", e);
        }
        info!("User logged out");
    }

    fn clear(&self) {
        for key in [keys::AUTHENTICATED, keys::USER, keys::TOKEN] {
            if let Err(e) = self.store.remove(key) {
                warn!("Failed to clear session key {}: {}", key, e);
            }
        }
        if let Ok(mut state) = self.state.write() {
            *state = SessionState::default();
        }
    }

    /// 应用内判断登录态的唯一事实来源
    pub fn is_authenticated(&self) -> bool {
        self.state
            .read()
            .map(|state| state.authenticated)
            .unwrap_or(false)
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.state.read().ok()?.user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().ok()?.token.clone()
    }
}

impl CredentialProvider for SessionStore {
    fn bearer_token(&self) -> Option<String> {
        self.token()
    }
}
