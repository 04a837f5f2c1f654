//! 影像记录客户端演示程序
//!
//! 展示核心流程：
//! - 登录并恢复会话
//! - 按过滤器拉取CT记录列表
//! - 记录归一化与提交载荷
//!
//! 需要可访问的记录接口部署，基地址在配置文件的api.base_url里指定。

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use medrec_app::{ListScreen, LoginScreen};
use medrec_client::{
    ApiClient, ClientConfig, LocalStore, RecordService, SessionStore, UploadClient,
};
use medrec_core::{normalize::denormalize, ListFilter, Modality, Severity};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("🚀 启动影像记录客户端演示");

    let config = ClientConfig::load(None)?;
    let session = Arc::new(SessionStore::open(LocalStore::open(
        config.storage.session_path(),
    )));
    let api = ApiClient::new(&config, session.clone())?;
    let upload = UploadClient::new(api.http(), session.clone(), config.upload.chunk_size);
    let ct_service = Arc::new(RecordService::new(api.clone(), upload, Modality::Ct));

    // 登录演示
    if !session.is_authenticated() {
        let mut login = LoginScreen::new(session.clone());
        login.email = std::env::var("MEDREC_DEMO_EMAIL").unwrap_or_default();
        login.password = std::env::var("MEDREC_DEMO_PASSWORD").unwrap_or_default();
        match login.submit(&api).await {
            Ok(user) => info!("✅ 登录成功: {}", user.email),
            Err(e) => {
                warn!("❌ 登录失败: {}", e);
                if let Some(error) = &login.error {
                    warn!("   屏幕错误状态: {}", error.message);
                }
                return Ok(());
            }
        }
    } else {
        info!("✅ 复用本地已持久化的会话");
    }

    // 列表屏幕演示
    demo_ct_list(ct_service.clone()).await;

    // 归一化演示
    demo_payload_shapes(ct_service).await;

    info!("✅ 演示完成");
    Ok(())
}

/// CT列表屏幕演示：挂载、过滤、重试
async fn demo_ct_list(service: Arc<RecordService>) {
    info!("\n📋 CT记录列表演示");

    let screen = ListScreen::new(service);
    screen.mount().await;
    let state = screen.snapshot().await;
    if let Some(error) = &state.error {
        warn!("❌ 列表拉取失败: {}", error.message);
        if error.retryable {
            info!("   按原请求重试一次");
            screen.retry().await;
        }
        return;
    }
    info!("   共 {} 条记录", state.records.len());

    // 只看危急记录
    screen.set_severity(Some(Severity::Critical)).await;
    let state = screen.snapshot().await;
    info!("   危急记录 {} 条", state.records.len());
}

/// 归一化/反归一化演示
async fn demo_payload_shapes(service: Arc<RecordService>) {
    use medrec_client::RecordGateway;

    info!("\n🔄 提交载荷形态演示");
    match service.list(&ListFilter::default()).await {
        Ok(records) => {
            if let Some(record) = records.first() {
                let payload = denormalize(record);
                info!("   记录 {} 的提交载荷字段数: {}", record.id, payload.as_object().map(|o| o.len()).unwrap_or(0));
            }
        }
        Err(e) => warn!("❌ 拉取失败: {}", e),
    }
}
