//! 用户资料服务

use reqwest::Method;
use serde_json::json;

use medrec_core::{MedrecError, Result, UserProfile};

use crate::config::endpoints;
use crate::transport::ApiClient;
use crate::upload::{CancelToken, ImageFile, ProgressFn, UploadClient};

/// 用户资料服务
pub struct UserService {
    api: ApiClient,
    upload: UploadClient,
}

impl UserService {
    pub fn new(api: ApiClient, upload: UploadClient) -> Self {
        Self { api, upload }
    }

    /// 拉取当前用户资料
    pub async fn profile(&self) -> Result<UserProfile> {
        let envelope = self
            .api
            .get(endpoints::USERS, &[("action", "profile".to_string())])
            .await?;
        let data = envelope.into_data("Failed to fetch profile")?;
        // 有的部署把用户对象包在user字段里
        let user_value = data.get("user").unwrap_or(&data);
        Ok(UserProfile::from_value(user_value))
    }

    /// 更新当前用户资料
    pub async fn update_profile(&self, profile: &UserProfile) -> Result<()> {
        let body = json!({
            "name": profile.name,
            "email": profile.email,
        });
        self.api
            .request(
                endpoints::USERS,
                Method::PUT,
                &[("action", "update".to_string())],
                Some(&body),
            )
            .await?
            .require_success("Failed to update profile")?;
        Ok(())
    }

    /// 修改密码
    ///
    /// 新密码与确认不一致时在本地直接失败，不发起网络调用。
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        if new_password != confirm_password {
            return Err(MedrecError::Validation(
                "New password and confirmation do not match".to_string(),
            ));
        }
        let body = json!({
            "current_password": current_password,
            "new_password": new_password,
            "confirm_password": confirm_password,
        });
        self.api
            .request(
                endpoints::USERS,
                Method::PUT,
                &[("action", "change_password".to_string())],
                Some(&body),
            )
            .await?
            .require_success("Failed to change password")?;
        Ok(())
    }

    /// 上传头像，返回服务端存储的URL
    pub async fn upload_profile_image(
        &self,
        file: ImageFile,
        max_bytes: u64,
        on_progress: Option<ProgressFn>,
        cancel: CancelToken,
    ) -> Result<String> {
        let url = format!("{}?action=upload_profile", self.api.url(endpoints::USERS));
        self.upload
            .upload(&url, "profile_image", file, max_bytes, on_progress, cancel)
            .await
    }
}
