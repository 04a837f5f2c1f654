//! 记录列表屏幕
//!
//! 挂载即按当前过滤器拉取；拉取失败渲染"重试"入口，重试按原样
//! 重新发起同一请求。同屏多次拉取之间用单调递增的请求序号做过期
//! 响应守卫：慢的旧响应到达时如果已有更新的请求发出，直接丢弃，
//! 避免旧结果覆盖新结果。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use medrec_client::RecordGateway;
use medrec_core::{ImagingRecord, ListFilter, Severity};

use crate::screens::ScreenError;

/// 列表屏幕状态快照
#[derive(Debug, Clone, Default)]
pub struct ListState {
    pub loading: bool,
    pub error: Option<ScreenError>,
    pub records: Vec<ImagingRecord>,
    pub filter: ListFilter,
}

/// 记录列表屏幕
pub struct ListScreen {
    gateway: Arc<dyn RecordGateway>,
    state: Mutex<ListState>,
    latest_request: AtomicU64,
}

impl ListScreen {
    pub fn new(gateway: Arc<dyn RecordGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(ListState::default()),
            latest_request: AtomicU64::new(0),
        }
    }

    /// 挂载即拉取
    pub async fn mount(&self) {
        self.refresh().await;
    }

    /// 修改搜索词并重新拉取
    pub async fn set_search(&self, search: impl Into<String>) {
        {
            let mut state = self.state.lock().await;
            state.filter.search = search.into();
        }
        self.refresh().await;
    }

    /// 修改严重程度过滤并重新拉取，None即"all"
    pub async fn set_severity(&self, severity: Option<Severity>) {
        {
            let mut state = self.state.lock().await;
            state.filter.severity = severity;
        }
        self.refresh().await;
    }

    /// 重试入口：按当前过滤器原样重新发起同一请求
    pub async fn retry(&self) {
        self.refresh().await;
    }

    /// 按当前过滤器拉取一次
    pub async fn refresh(&self) {
        let request_id = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        let filter = {
            let mut state = self.state.lock().await;
            state.loading = true;
            state.error = None;
            state.filter.clone()
        };
        debug!(
            "List fetch {} for {} issued",
            request_id,
            self.gateway.modality().as_str()
        );

        let outcome = self.gateway.list(&filter).await;

        // 过期响应守卫：期间有更新的请求发出，本次结果作废
        if self.latest_request.load(Ordering::SeqCst) != request_id {
            warn!(
                "Discarding stale {} list response (request {})",
                self.gateway.modality().as_str(),
                request_id
            );
            return;
        }

        let mut state = self.state.lock().await;
        state.loading = false;
        match outcome {
            Ok(records) => {
                state.records = records;
            }
            Err(error) => {
                state.error = Some(ScreenError::from(&error));
            }
        }
    }

    /// 渲染用的状态快照
    pub async fn snapshot(&self) -> ListState {
        self.state.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medrec_client::{CancelToken, ImageFile, ProgressFn};
    use medrec_core::{MedrecError, Modality, Result};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// 假网关：按调用顺序返回预置的（延迟，结果）脚本
    struct ScriptedGateway {
        calls: AtomicUsize,
        script: Vec<(u64, Result<Vec<ImagingRecord>>)>,
    }

    impl ScriptedGateway {
        fn new(script: Vec<(u64, Result<Vec<ImagingRecord>>)>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                script,
            }
        }
    }

    fn named_record(name: &str) -> ImagingRecord {
        let mut record = ImagingRecord::blank(Modality::Ct);
        record.patient_name = name.to_string();
        record
    }

    fn clone_outcome(outcome: &Result<Vec<ImagingRecord>>) -> Result<Vec<ImagingRecord>> {
        match outcome {
            Ok(records) => Ok(records.clone()),
            Err(e) => Err(MedrecError::Api(e.to_string())),
        }
    }

    #[async_trait]
    impl RecordGateway for ScriptedGateway {
        fn modality(&self) -> Modality {
            Modality::Ct
        }

        async fn list(&self, _filter: &ListFilter) -> Result<Vec<ImagingRecord>> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay_ms, outcome) = &self.script[index.min(self.script.len() - 1)];
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
            clone_outcome(outcome)
        }

        async fn fetch(&self, _id: &str) -> Result<ImagingRecord> {
            unimplemented!()
        }

        async fn create(&self, _record: &ImagingRecord) -> Result<()> {
            unimplemented!()
        }

        async fn update(&self, _id: &str, _record: &ImagingRecord) -> Result<()> {
            unimplemented!()
        }

        async fn delete(&self, _id: &str) -> Result<()> {
            unimplemented!()
        }

        async fn upload_image(
            &self,
            _file: ImageFile,
            _max_bytes: u64,
            _on_progress: Option<ProgressFn>,
            _cancel: CancelToken,
        ) -> Result<String> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_mount_loads_records() {
        let gateway = Arc::new(ScriptedGateway::new(vec![(
            0,
            Ok(vec![named_record("Jane Doe")]),
        )]));
        let screen = ListScreen::new(gateway);
        screen.mount().await;

        let state = screen.snapshot().await;
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert_eq!(state.records.len(), 1);
        assert_eq!(state.records[0].patient_name, "Jane Doe");
    }

    #[tokio::test]
    async fn test_failed_fetch_sets_retryable_error() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            (0, Err(MedrecError::Api("Failed to fetch CT scans".to_string()))),
            (0, Ok(vec![named_record("Jane Doe")])),
        ]));
        let screen = ListScreen::new(gateway);
        screen.mount().await;

        let state = screen.snapshot().await;
        let error = state.error.unwrap();
        assert!(error.retryable);
        assert!(error.message.contains("Failed to fetch CT scans"));

        // 重试按原样重新发起同一请求并成功
        screen.retry().await;
        let state = screen.snapshot().await;
        assert!(state.error.is_none());
        assert_eq!(state.records.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        // 第一次请求慢且返回旧数据，第二次快且返回新数据
        let gateway = Arc::new(ScriptedGateway::new(vec![
            (80, Ok(vec![named_record("stale")])),
            (10, Ok(vec![named_record("fresh")])),
        ]));
        let screen = ListScreen::new(gateway);

        tokio::join!(screen.refresh(), screen.refresh());

        // 两个响应都已到达，界面只反映后发请求的结果
        let state = screen.snapshot().await;
        assert_eq!(state.records.len(), 1);
        assert_eq!(state.records[0].patient_name, "fresh");
    }

    #[tokio::test]
    async fn test_filter_change_reissues_fetch() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            (0, Ok(vec![named_record("all")])),
            (0, Ok(vec![named_record("critical only")])),
        ]));
        let screen = ListScreen::new(gateway.clone());
        screen.mount().await;
        screen.set_severity(Some(Severity::Critical)).await;

        let state = screen.snapshot().await;
        assert_eq!(state.filter.severity, Some(Severity::Critical));
        assert_eq!(state.records[0].patient_name, "critical only");
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }
}
