//! 配置管理
//!
//! 提供客户端的分层配置：配置文件 + MEDREC前缀环境变量覆盖，
//! 每个配置段都有可用的默认值。

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use medrec_core::{MedrecError, Result};

use crate::session::AuthMode;

/// 接口端点路径
pub mod endpoints {
    pub const AUTH: &str = "/auth.php";
    pub const LOGOUT: &str = "/logout.php";
    pub const CT_SCANS: &str = "/ct_scans_api.php";
    pub const XRAYS: &str = "/xrays_api.php";
    pub const USERS: &str = "/users_api.php";
}

/// 客户端完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 接口配置
    pub api: ApiConfig,
    /// 本地存储配置
    pub storage: StorageConfig,
    /// 上传配置
    pub upload: UploadConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// 远端接口基地址
    pub base_url: String,
    /// 认证部署模式，只决定login持久化什么；共享请求路径对两种模式都成立
    pub auth_mode: AuthMode,
    /// 请求超时，None表示不设超时
    pub request_timeout: Option<Duration>,
}

/// 本地存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 数据目录
    pub data_dir: String,
    /// 会话存储文件名
    pub session_file: String,
}

impl StorageConfig {
    pub fn session_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.session_file)
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 编辑流程的图片大小上限（字节）
    pub edit_max_bytes: u64,
    /// 新建流程的图片大小上限（字节）
    pub create_max_bytes: u64,
    /// 流式上传的分块大小（字节）
    pub chunk_size: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
}

impl ClientConfig {
    /// 加载配置
    ///
    /// 以默认值为底，叠加可选的配置文件，再叠加MEDREC前缀的环境变量。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = Config::try_from(&ClientConfig::default())
            .map_err(|e| MedrecError::Config(e.to_string()))?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(Environment::with_prefix("MEDREC").separator("_"))
            .build()
            .map_err(|e| MedrecError::Config(e.to_string()))?;

        let config: ClientConfig = settings
            .try_deserialize()
            .map_err(|e| MedrecError::Config(e.to_string()))?;

        info!(
            "Configuration loaded, api base url: {}",
            config.api.base_url
        );
        Ok(config)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            auth_mode: AuthMode::SessionCookie,
            request_timeout: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            session_file: "session.json".to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            edit_max_bytes: 5 * 1024 * 1024,    // 5MB
            create_max_bytes: 10 * 1024 * 1024, // 10MB
            chunk_size: 64 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_upload_ceilings() {
        let config = ClientConfig::default();
        assert_eq!(config.upload.edit_max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.upload.create_max_bytes, 10 * 1024 * 1024);
        assert!(config.upload.chunk_size > 0);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ClientConfig::load(None).unwrap();
        assert_eq!(config.api.auth_mode, AuthMode::SessionCookie);
        assert!(config.api.request_timeout.is_none());
    }

    #[test]
    fn test_session_path_joins_dir_and_file() {
        let storage = StorageConfig::default();
        let path = storage.session_path();
        assert!(path.ends_with("session.json"));
    }
}
