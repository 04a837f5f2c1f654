//! 记录详情屏幕

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use medrec_client::RecordGateway;
use medrec_core::ImagingRecord;

use crate::screens::ScreenError;

/// 详情屏幕状态快照
#[derive(Debug, Clone, Default)]
pub struct DetailState {
    pub loading: bool,
    pub error: Option<ScreenError>,
    pub record: Option<ImagingRecord>,
    pub record_id: String,
}

/// 记录详情屏幕
pub struct DetailScreen {
    gateway: Arc<dyn RecordGateway>,
    state: Mutex<DetailState>,
}

impl DetailScreen {
    pub fn new(gateway: Arc<dyn RecordGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(DetailState::default()),
        }
    }

    /// 按ID加载记录
    pub async fn load(&self, id: &str) {
        {
            let mut state = self.state.lock().await;
            state.record_id = id.to_string();
            state.loading = true;
            state.error = None;
        }
        debug!("Loading {} record {}", self.gateway.modality().as_str(), id);

        let outcome = self.gateway.fetch(id).await;
        let mut state = self.state.lock().await;
        state.loading = false;
        match outcome {
            Ok(record) => {
                state.record = Some(record);
            }
            Err(error) => {
                state.error = Some(ScreenError::from(&error));
            }
        }
    }

    /// 重试入口：按同一ID重新加载
    pub async fn retry(&self) {
        let id = self.state.lock().await.record_id.clone();
        if !id.is_empty() {
            self.load(&id).await;
        }
    }

    /// 编辑保存后的本地回填：下一次拉取前先展示已保存的内容
    pub async fn apply_saved(&self, record: ImagingRecord) {
        let mut state = self.state.lock().await;
        state.record = Some(record);
    }

    pub async fn snapshot(&self) -> DetailState {
        self.state.lock().await.clone()
    }
}
