//! 用户资料屏幕
//!
//! 资料加载/保存、修改密码、上传头像。头像上传沿用编辑流程的
//! 大小上限；保存失败时屏幕上的草稿原样保留。

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use medrec_client::{CancelToken, ImageFile, ProgressFn, UserService};
use medrec_core::{Result, UserProfile};

use crate::screens::ScreenError;

/// 用户资料屏幕
pub struct ProfileScreen {
    users: UserService,
    max_image_bytes: u64,
    pub loading: bool,
    pub error: Option<ScreenError>,
    pub success_message: Option<String>,
    pub profile: Option<UserProfile>,
    upload_progress: Arc<AtomicU8>,
    active_upload: Option<CancelToken>,
}

impl ProfileScreen {
    pub fn new(users: UserService, max_image_bytes: u64) -> Self {
        Self {
            users,
            max_image_bytes,
            loading: false,
            error: None,
            success_message: None,
            profile: None,
            upload_progress: Arc::new(AtomicU8::new(0)),
            active_upload: None,
        }
    }

    /// 加载当前用户资料
    pub async fn load(&mut self) {
        self.loading = true;
        self.error = None;
        match self.users.profile().await {
            Ok(profile) => {
                self.profile = Some(profile);
            }
            Err(error) => {
                self.error = Some(ScreenError::from(&error));
            }
        }
        self.loading = false;
    }

    /// 重试入口
    pub async fn retry(&mut self) {
        self.load().await;
    }

    /// 保存资料修改
    pub async fn save(&mut self, profile: UserProfile) -> Result<()> {
        self.error = None;
        self.success_message = None;
        match self.users.update_profile(&profile).await {
            Ok(()) => {
                self.profile = Some(profile);
                self.success_message = Some("Profile updated successfully".to_string());
                Ok(())
            }
            Err(error) => {
                self.error = Some(ScreenError::from(&error));
                Err(error)
            }
        }
    }

    /// 修改密码
    pub async fn change_password(
        &mut self,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<()> {
        self.error = None;
        self.success_message = None;
        match self.users.change_password(current, new, confirm).await {
            Ok(()) => {
                self.success_message = Some("Password changed successfully".to_string());
                Ok(())
            }
            Err(error) => {
                self.error = Some(ScreenError::from(&error));
                Err(error)
            }
        }
    }

    pub fn upload_progress(&self) -> u8 {
        self.upload_progress.load(Ordering::SeqCst)
    }

    /// 离开屏幕时取消在途的头像上传
    pub fn cancel_pending_upload(&mut self) {
        if let Some(token) = self.active_upload.take() {
            token.cancel();
        }
    }

    /// 上传头像，成功后把返回的URL并入本地缓存的资料
    pub async fn upload_avatar(&mut self, file: ImageFile) -> Result<String> {
        self.error = None;
        self.cancel_pending_upload();
        let token = CancelToken::new();
        self.active_upload = Some(token.clone());
        let progress_cell = self.upload_progress.clone();
        let on_progress: ProgressFn =
            Arc::new(move |percent| progress_cell.store(percent, Ordering::SeqCst));

        let outcome = self
            .users
            .upload_profile_image(file, self.max_image_bytes, Some(on_progress), token)
            .await;
        self.active_upload = None;
        self.upload_progress.store(0, Ordering::SeqCst);

        match outcome {
            Ok(url) => {
                if let Some(profile) = &mut self.profile {
                    profile.profile_image = Some(url.clone());
                }
                Ok(url)
            }
            Err(error) => {
                self.error = Some(ScreenError::from(&error));
                Err(error)
            }
        }
    }
}
