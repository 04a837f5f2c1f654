//! 总览屏幕
//!
//! 只读聚合：把两类记录列表汇成计数与近期记录切片。图表渲染不在
//! 这一层，这里只产出数据。

use std::sync::Arc;

use tokio::sync::Mutex;

use medrec_client::RecordGateway;
use medrec_core::{ImagingRecord, ListFilter, Severity};

use crate::screens::ScreenError;

/// 总览统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_ct: usize,
    pub total_xray: usize,
    pub critical: usize,
    pub urgent: usize,
    pub pending_review: usize,
}

/// 总览屏幕状态快照
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub loading: bool,
    pub error: Option<ScreenError>,
    pub stats: DashboardStats,
    pub recent: Vec<ImagingRecord>,
}

/// 总览屏幕
pub struct DashboardScreen {
    ct: Arc<dyn RecordGateway>,
    xray: Arc<dyn RecordGateway>,
    state: Mutex<DashboardState>,
}

impl DashboardScreen {
    /// 近期记录切片的条数
    const RECENT_LIMIT: usize = 5;

    pub fn new(ct: Arc<dyn RecordGateway>, xray: Arc<dyn RecordGateway>) -> Self {
        Self {
            ct,
            xray,
            state: Mutex::new(DashboardState::default()),
        }
    }

    /// 拉取两类列表并聚合
    pub async fn refresh(&self) {
        {
            let mut state = self.state.lock().await;
            state.loading = true;
            state.error = None;
        }

        let filter = ListFilter::default();
        let (ct_outcome, xray_outcome) =
            tokio::join!(self.ct.list(&filter), self.xray.list(&filter));

        let mut state = self.state.lock().await;
        state.loading = false;
        match (ct_outcome, xray_outcome) {
            (Ok(ct_records), Ok(xray_records)) => {
                state.stats = Self::aggregate(&ct_records, &xray_records);
                state.recent = Self::recent(ct_records, xray_records);
            }
            (Err(error), _) | (_, Err(error)) => {
                state.error = Some(ScreenError::from(&error));
            }
        }
    }

    /// 重试入口
    pub async fn retry(&self) {
        self.refresh().await;
    }

    fn aggregate(ct: &[ImagingRecord], xray: &[ImagingRecord]) -> DashboardStats {
        let all = ct.iter().chain(xray.iter());
        let mut stats = DashboardStats {
            total_ct: ct.len(),
            total_xray: xray.len(),
            ..DashboardStats::default()
        };
        for record in all {
            match record.severity {
                Severity::Critical => stats.critical += 1,
                Severity::Urgent => stats.urgent += 1,
                _ => {}
            }
            if record.status == medrec_core::RecordStatus::Pending {
                stats.pending_review += 1;
            }
        }
        stats
    }

    /// 按检查日期倒序取前几条
    fn recent(ct: Vec<ImagingRecord>, xray: Vec<ImagingRecord>) -> Vec<ImagingRecord> {
        let mut all: Vec<ImagingRecord> = ct.into_iter().chain(xray).collect();
        all.sort_by(|a, b| b.scan_date.cmp(&a.scan_date));
        all.truncate(Self::RECENT_LIMIT);
        all
    }

    pub async fn snapshot(&self) -> DashboardState {
        self.state.lock().await.clone()
    }
}
