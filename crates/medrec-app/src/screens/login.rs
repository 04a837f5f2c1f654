//! 登录屏幕

use std::sync::Arc;

use medrec_client::{ApiClient, SessionStore};
use medrec_core::{MedrecError, Result, UserProfile};

use crate::screens::ScreenError;

/// 登录屏幕
pub struct LoginScreen {
    session: Arc<SessionStore>,
    pub email: String,
    pub password: String,
    pub loading: bool,
    pub error: Option<ScreenError>,
}

impl LoginScreen {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self {
            session,
            email: String::new(),
            password: String::new(),
            loading: false,
            error: None,
        }
    }

    /// 提交登录
    ///
    /// 服务端的拒绝消息原样进入错误状态；loading标记挡住双重提交。
    pub async fn submit(&mut self, api: &ApiClient) -> Result<UserProfile> {
        if self.loading {
            return Err(MedrecError::Validation(
                "Login already in progress".to_string(),
            ));
        }
        self.error = None;
        if self.email.trim().is_empty() || self.password.is_empty() {
            let error = MedrecError::Validation("Email and password are required".to_string());
            self.error = Some(ScreenError::from(&error));
            return Err(error);
        }

        self.loading = true;
        let outcome = self.session.login(api, self.email.trim(), &self.password).await;
        self.loading = false;
        match outcome {
            Ok(user) => {
                self.password.clear();
                Ok(user)
            }
            Err(error) => {
                self.error = Some(ScreenError::from(&error));
                Err(error)
            }
        }
    }
}
