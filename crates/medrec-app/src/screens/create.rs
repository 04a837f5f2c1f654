//! 新建记录屏幕
//!
//! 表单从对应检查类型的空白记录取默认值（所见类型"Normal"、CT骨折
//! "No"、严重程度Stable、状态Pending）。提交前先做本地必填校验；
//! 选了图片则上传严格先于创建调用，上传失败整个提交中止，创建
//! 不会发出；未选图片时载荷里的图片URL是空字符串，创建恰好发出一次。

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::info;

use medrec_client::{CancelToken, ImageFile, ProgressFn, RecordGateway};
use medrec_core::normalize::parse_scan_date;
use medrec_core::{ImagingRecord, MedrecError, Result};

use crate::screens::form::RecordForm;
use crate::screens::ScreenError;

/// 新建记录屏幕
pub struct CreateScreen {
    gateway: Arc<dyn RecordGateway>,
    /// 新建流程的图片大小上限（字节）
    max_image_bytes: u64,
    pub form: RecordForm,
    pub submitting: bool,
    pub error: Option<ScreenError>,
    pub success_message: Option<String>,
    upload_progress: Arc<AtomicU8>,
    active_upload: Option<CancelToken>,
}

impl CreateScreen {
    pub fn new(gateway: Arc<dyn RecordGateway>, max_image_bytes: u64) -> Self {
        let form = RecordForm::from_record(&ImagingRecord::blank(gateway.modality()));
        Self {
            gateway,
            max_image_bytes,
            form,
            submitting: false,
            error: None,
            success_message: None,
            upload_progress: Arc::new(AtomicU8::new(0)),
            active_upload: None,
        }
    }

    pub fn upload_progress(&self) -> u8 {
        self.upload_progress.load(Ordering::SeqCst)
    }

    /// 离开屏幕或替换文件时取消在途上传
    pub fn cancel_pending_upload(&mut self) {
        if let Some(token) = self.active_upload.take() {
            token.cancel();
        }
    }

    fn noun(&self) -> &'static str {
        match self.gateway.modality() {
            medrec_core::Modality::Ct => "CT scan",
            medrec_core::Modality::Xray => "X-ray",
        }
    }

    /// 本地必填校验：姓名、患者ID、年龄>0、检查日期
    fn validate(&self) -> Result<()> {
        if self.form.patient_name.trim().is_empty() {
            return Err(MedrecError::Validation("Patient name is required".to_string()));
        }
        if self.form.patient_id.trim().is_empty() {
            return Err(MedrecError::Validation("Patient ID is required".to_string()));
        }
        let age = self.form.age.trim().parse::<i64>().unwrap_or(0);
        if age <= 0 {
            return Err(MedrecError::Validation("Valid age is required".to_string()));
        }
        if parse_scan_date(&self.form.scan_date).is_none() {
            return Err(MedrecError::Validation("Scan date is required".to_string()));
        }
        Ok(())
    }

    /// 提交新记录
    ///
    /// 成功后把表单重置回默认值并设置成功提示。
    pub async fn submit(&mut self, image: Option<ImageFile>) -> Result<()> {
        self.error = None;
        self.success_message = None;
        if let Err(error) = self.validate() {
            self.error = Some(ScreenError::from(&error));
            return Err(error);
        }
        self.submitting = true;

        let mut image_url: Option<String> = None;
        if let Some(file) = image {
            self.cancel_pending_upload();
            let token = CancelToken::new();
            self.active_upload = Some(token.clone());
            let progress_cell = self.upload_progress.clone();
            let on_progress: ProgressFn =
                Arc::new(move |percent| progress_cell.store(percent, Ordering::SeqCst));

            let uploaded = self
                .gateway
                .upload_image(file, self.max_image_bytes, Some(on_progress), token)
                .await;
            self.active_upload = None;
            self.upload_progress.store(0, Ordering::SeqCst);

            match uploaded {
                Ok(url) => {
                    image_url = Some(url);
                }
                Err(error) => {
                    // 上传失败：创建调用不会发出
                    self.submitting = false;
                    self.error = Some(ScreenError {
                        message: format!("Image upload failed: {}", error),
                        retryable: error.retryable(),
                    });
                    return Err(error);
                }
            }
        }

        // 未选图片时image_url为None，载荷里的imageUrl会是空字符串
        let mut blank = ImagingRecord::blank(self.gateway.modality());
        blank.scan_date = parse_scan_date(&self.form.scan_date);
        let record = self.form.merge_into(&blank, image_url);

        match self.gateway.create(&record).await {
            Ok(()) => {
                info!("Created new {} record for {}", self.noun(), record.patient_id);
                self.submitting = false;
                self.success_message = Some(format!("{} created successfully", self.noun()));
                self.form = RecordForm::from_record(&ImagingRecord::blank(self.gateway.modality()));
                Ok(())
            }
            Err(error) => {
                // 创建失败：表单内容原样保留
                self.submitting = false;
                self.error = Some(ScreenError::from(&error));
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medrec_core::normalize::denormalize;
    use medrec_core::{ListFilter, Modality};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct CountingGateway {
        modality: Modality,
        upload_calls: AtomicUsize,
        create_calls: AtomicUsize,
        upload_outcome: std::result::Result<String, String>,
        last_create: Mutex<Option<ImagingRecord>>,
    }

    impl CountingGateway {
        fn new(modality: Modality, upload_outcome: std::result::Result<String, String>) -> Self {
            Self {
                modality,
                upload_calls: AtomicUsize::new(0),
                create_calls: AtomicUsize::new(0),
                upload_outcome,
                last_create: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl RecordGateway for CountingGateway {
        fn modality(&self) -> Modality {
            self.modality
        }

        async fn list(&self, _filter: &ListFilter) -> Result<Vec<ImagingRecord>> {
            Ok(Vec::new())
        }

        async fn fetch(&self, _id: &str) -> Result<ImagingRecord> {
            unimplemented!()
        }

        async fn create(&self, record: &ImagingRecord) -> Result<()> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_create.lock().unwrap() = Some(record.clone());
            Ok(())
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
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            match &self.upload_outcome {
                Ok(url) => Ok(url.clone()),
                Err(message) => Err(MedrecError::Upload(message.clone())),
            }
        }
    }

    fn filled_screen(gateway: Arc<CountingGateway>) -> CreateScreen {
        let mut screen = CreateScreen::new(gateway, 10 * 1024 * 1024);
        screen.form.patient_name = "Jane Doe".to_string();
        screen.form.patient_id = "P100".to_string();
        screen.form.age = "34".to_string();
        screen.form.scan_date = "2025-01-01T10:00".to_string();
        screen
    }

    #[tokio::test]
    async fn test_create_without_image_sends_empty_url_once() {
        let gateway = Arc::new(CountingGateway::new(Modality::Ct, Ok("unused".to_string())));
        let mut screen = filled_screen(gateway.clone());

        screen.submit(None).await.unwrap();

        // 创建恰好一次，之前没有任何上传调用
        assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.upload_calls.load(Ordering::SeqCst), 0);

        let record = gateway.last_create.lock().unwrap().clone().unwrap();
        let payload = denormalize(&record);
        assert_eq!(payload["imageUrl"], json!(""));
        assert_eq!(payload["patientName"], json!("Jane Doe"));
        assert_eq!(payload["scanDate"], json!("2025-01-01 10:00:00"));

        // 成功后表单重置回默认值
        assert!(screen.form.patient_name.is_empty());
        assert_eq!(screen.form.findings_type, "Normal");
        assert!(screen.success_message.is_some());
    }

    #[tokio::test]
    async fn test_upload_failure_prevents_create() {
        let gateway = Arc::new(CountingGateway::new(
            Modality::Ct,
            Err("Upload failed with status 500".to_string()),
        ));
        let mut screen = filled_screen(gateway.clone());

        let image = ImageFile::new("scan.png", "image/png", vec![0u8; 64]);
        let err = screen.submit(Some(image)).await.unwrap_err();
        assert!(matches!(err, MedrecError::Upload(_)));
        assert_eq!(gateway.upload_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 0);
        assert!(screen
            .error
            .as_ref()
            .unwrap()
            .message
            .contains("Upload failed with status 500"));
        // 失败后表单不重置
        assert_eq!(screen.form.patient_name, "Jane Doe");
    }

    #[tokio::test]
    async fn test_missing_mandatory_fields_block_submission() {
        let gateway = Arc::new(CountingGateway::new(Modality::Ct, Ok("unused".to_string())));
        let mut screen = CreateScreen::new(gateway.clone(), 10 * 1024 * 1024);
        screen.form.patient_name = "Jane Doe".to_string();
        // 缺患者ID、年龄、日期

        let err = screen.submit(None).await.unwrap_err();
        assert!(matches!(err, MedrecError::Validation(_)));
        assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_uploaded_url_lands_in_create_payload() {
        let gateway = Arc::new(CountingGateway::new(
            Modality::Xray,
            Ok("uploads/fresh.png".to_string()),
        ));
        let mut screen = filled_screen(gateway.clone());

        let image = ImageFile::new("scan.png", "image/png", vec![0u8; 64]);
        screen.submit(Some(image)).await.unwrap();

        assert_eq!(gateway.upload_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 1);
        let record = gateway.last_create.lock().unwrap().clone().unwrap();
        assert_eq!(record.image_url.as_deref(), Some("uploads/fresh.png"));
    }
}
