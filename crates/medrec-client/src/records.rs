//! 影像记录服务
//!
//! 按检查类型（CT / X光）封装记录接口的增删改查与图片上传，
//! 原始JSON在此边界归一化为内存记录，提交载荷在此边界反归一化。

use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use medrec_core::normalize::{denormalize, normalize};
use medrec_core::{ImagingRecord, ListFilter, MedrecError, Modality, Result};

use crate::config::endpoints;
use crate::transport::ApiClient;
use crate::upload::{CancelToken, ImageFile, ProgressFn, UploadClient};

/// 记录网关
///
/// 视图控制器消费的统一入口；测试用内存假实现替换。
#[async_trait]
pub trait RecordGateway: Send + Sync {
    /// 该网关服务的检查类型
    fn modality(&self) -> Modality;

    /// 按过滤器拉取记录列表
    async fn list(&self, filter: &ListFilter) -> Result<Vec<ImagingRecord>>;

    /// 按ID拉取单条记录
    async fn fetch(&self, id: &str) -> Result<ImagingRecord>;

    /// 创建记录
    async fn create(&self, record: &ImagingRecord) -> Result<()>;

    /// 整体替换一条记录
    async fn update(&self, id: &str, record: &ImagingRecord) -> Result<()>;

    /// 删除记录（接口能力，界面流程未接入）
    async fn delete(&self, id: &str) -> Result<()>;

    /// 上传记录图片，返回服务端存储的URL
    async fn upload_image(
        &self,
        file: ImageFile,
        max_bytes: u64,
        on_progress: Option<ProgressFn>,
        cancel: CancelToken,
    ) -> Result<String>;
}

/// 基于远端接口的记录服务
pub struct RecordService {
    api: ApiClient,
    upload: UploadClient,
    modality: Modality,
}

impl RecordService {
    pub fn new(api: ApiClient, upload: UploadClient, modality: Modality) -> Self {
        Self {
            api,
            upload,
            modality,
        }
    }

    fn endpoint(&self) -> &'static str {
        match self.modality {
            Modality::Ct => endpoints::CT_SCANS,
            Modality::Xray => endpoints::XRAYS,
        }
    }

    /// 错误文案里的资源名
    fn noun(&self) -> &'static str {
        match self.modality {
            Modality::Ct => "CT scan",
            Modality::Xray => "X-ray",
        }
    }
}

#[async_trait]
impl RecordGateway for RecordService {
    fn modality(&self) -> Modality {
        self.modality
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<ImagingRecord>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if !filter.search.is_empty() {
            query.push(("search", filter.search.clone()));
        }
        // None即"all"，不下发severity参数
        if let Some(severity) = filter.severity {
            query.push(("severity", severity.as_str().to_string()));
        }

        let envelope = self.api.get(self.endpoint(), &query).await?;
        let data = envelope.into_data(&format!("Failed to fetch {}s", self.noun()))?;
        let items = data.as_array().cloned().unwrap_or_default();
        debug!("Fetched {} {} records", items.len(), self.modality.as_str());
        Ok(items
            .iter()
            .map(|raw| normalize(raw, self.modality))
            .collect())
    }

    async fn fetch(&self, id: &str) -> Result<ImagingRecord> {
        let envelope = self
            .api
            .get(self.endpoint(), &[("id", id.to_string())])
            .await?;
        let data = envelope.into_data(&format!("Failed to fetch {}", self.noun()))?;
        Ok(normalize(&data, self.modality))
    }

    async fn create(&self, record: &ImagingRecord) -> Result<()> {
        let payload = denormalize(record);
        self.api
            .post(self.endpoint(), &[], &payload)
            .await?
            .require_success(&format!("Failed to create {}", self.noun()))?;
        Ok(())
    }

    async fn update(&self, id: &str, record: &ImagingRecord) -> Result<()> {
        if id.is_empty() {
            return Err(MedrecError::Validation(
                "Record id is required for update".to_string(),
            ));
        }
        let payload = denormalize(record);
        self.api
            .request(
                self.endpoint(),
                Method::PUT,
                &[("id", id.to_string())],
                Some(&payload),
            )
            .await?
            .require_success(&format!("Failed to update {}", self.noun()))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.api
            .delete(self.endpoint(), &[("id", id.to_string())])
            .await?
            .require_success(&format!("Failed to delete {}", self.noun()))?;
        Ok(())
    }

    async fn upload_image(
        &self,
        file: ImageFile,
        max_bytes: u64,
        on_progress: Option<ProgressFn>,
        cancel: CancelToken,
    ) -> Result<String> {
        let url = format!("{}?action=upload", self.api.url(self.endpoint()));
        self.upload
            .upload(&url, "image", file, max_bytes, on_progress, cancel)
            .await
    }
}
