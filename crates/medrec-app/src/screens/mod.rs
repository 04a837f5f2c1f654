//! 屏幕模块
//!
//! 列表、详情、编辑、新建、登录、资料、总览各屏幕的视图控制器。

pub mod create;
pub mod dashboard;
pub mod detail;
pub mod edit;
pub mod form;
pub mod list;
pub mod login;
pub mod profile;

use medrec_core::MedrecError;

/// 屏幕内联错误状态
///
/// `retryable`决定是否渲染"重试"入口：网络/传输层失败重试有意义，
/// 校验失败只能修改输入。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenError {
    pub message: String,
    pub retryable: bool,
}

impl From<&MedrecError> for ScreenError {
    fn from(error: &MedrecError) -> Self {
        Self {
            message: error.to_string(),
            retryable: error.retryable(),
        }
    }
}
