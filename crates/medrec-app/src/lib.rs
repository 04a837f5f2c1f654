//! # MedRec App
//!
//! 视图控制器层。每个屏幕独占自己的本地状态（搜索词、过滤器、
//! 表单字段、加载/错误标记），经由客户端层与远端接口交互，
//! 失败在屏幕边界捕获并转成内联错误状态，从不向上传播panic。

pub mod logging;
pub mod screens;

pub use screens::create::CreateScreen;
pub use screens::dashboard::{DashboardScreen, DashboardStats};
pub use screens::detail::DetailScreen;
pub use screens::edit::EditScreen;
pub use screens::form::RecordForm;
pub use screens::list::ListScreen;
pub use screens::login::LoginScreen;
pub use screens::profile::ProfileScreen;
pub use screens::ScreenError;
