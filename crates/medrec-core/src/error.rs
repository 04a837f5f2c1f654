//! 错误定义模块

use thiserror::Error;

/// 客户端统一错误类型
#[derive(Error, Debug)]
pub enum MedrecError {
    #[error("校验错误: {0}")]
    Validation(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("请求失败 (HTTP {status}): {message}")]
    Transport { status: u16, message: String },

    #[error("接口错误: {0}")]
    Api(String),

    #[error("上传错误: {0}")]
    Upload(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Config(String),
}

impl MedrecError {
    /// 该错误是否适合向用户提供"重试"入口
    ///
    /// 网络层和传输层失败重试有意义；校验失败只能修改输入。
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            MedrecError::Network(_)
                | MedrecError::Transport { .. }
                | MedrecError::Api(_)
                | MedrecError::Upload(_)
        )
    }
}

/// 客户端统一结果类型
pub type Result<T> = std::result::Result<T, MedrecError>;
