//! 日志初始化

use medrec_client::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅器
///
/// RUST_LOG环境变量优先，其次使用配置的级别；重复初始化被忽略。
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
