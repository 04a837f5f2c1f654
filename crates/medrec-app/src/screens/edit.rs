//! 记录编辑屏幕
//!
//! 表单由归一化记录初始化；保存时若选了新图，上传严格先于更新：
//! 更新载荷依赖上传返回的URL，二者绝不并发。上传失败则整个提交
//! 中止：更新调用不会发出，已持久化的记录和未保存的表单都原样保留。

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use medrec_client::{CancelToken, ImageFile, ProgressFn, RecordGateway};
use medrec_core::{ImagingRecord, MedrecError, Result};

use crate::screens::form::RecordForm;
use crate::screens::ScreenError;

/// 记录编辑屏幕
pub struct EditScreen {
    gateway: Arc<dyn RecordGateway>,
    /// 编辑流程的图片大小上限（字节）
    max_image_bytes: u64,
    original: ImagingRecord,
    pub form: RecordForm,
    pub saving: bool,
    pub error: Option<ScreenError>,
    upload_progress: Arc<AtomicU8>,
    active_upload: Option<CancelToken>,
}

impl EditScreen {
    pub fn new(gateway: Arc<dyn RecordGateway>, record: ImagingRecord, max_image_bytes: u64) -> Self {
        let form = RecordForm::from_record(&record);
        Self {
            gateway,
            max_image_bytes,
            original: record,
            form,
            saving: false,
            error: None,
            upload_progress: Arc::new(AtomicU8::new(0)),
            active_upload: None,
        }
    }

    /// 当前上传进度百分比（渲染用）
    pub fn upload_progress(&self) -> u8 {
        self.upload_progress.load(Ordering::SeqCst)
    }

    /// 离开屏幕或替换文件时取消在途上传
    ///
    /// 被取消的上传不会再把结果写回本屏幕的状态。
    pub fn cancel_pending_upload(&mut self) {
        if let Some(token) = self.active_upload.take() {
            token.cancel();
            debug!("Pending upload cancelled");
        }
    }

    /// 本地必填校验，不通过则不发起任何网络调用
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
        Ok(())
    }

    /// 保存修改
    ///
    /// 成功时返回合并后的记录（上传的URL已并入，未选新图时沿用原
    /// 记录的URL），并把它作为下一次编辑的基准。
    pub async fn submit(&mut self, new_image: Option<ImageFile>) -> Result<ImagingRecord> {
        self.error = None;
        if let Err(error) = self.validate() {
            self.error = Some(ScreenError::from(&error));
            return Err(error);
        }
        self.saving = true;

        let mut image_url = self.original.image_url.clone();
        if let Some(file) = new_image {
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
                    // 上传失败：中止提交，更新调用不会发出
                    self.saving = false;
                    self.error = Some(ScreenError {
                        message: format!("Failed to upload image: {}", error),
                        retryable: error.retryable(),
                    });
                    return Err(error);
                }
            }
        }

        let updated = self.form.merge_into(&self.original, image_url);
        match self.gateway.update(&self.original.id, &updated).await {
            Ok(()) => {
                info!(
                    "Record {} updated ({})",
                    updated.id,
                    self.gateway.modality().as_str()
                );
                self.saving = false;
                self.original = updated.clone();
                Ok(updated)
            }
            Err(error) => {
                // 更新失败：表单内容原样保留，供用户修正后重新提交
                self.saving = false;
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
    use medrec_core::{Findings, ListFilter, Modality};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// 假网关：统计上传/更新调用次数，可让上传按脚本失败
    struct CountingGateway {
        modality: Modality,
        upload_calls: AtomicUsize,
        update_calls: AtomicUsize,
        upload_outcome: Mutex<std::result::Result<String, String>>,
        last_update: Mutex<Option<ImagingRecord>>,
    }

    impl CountingGateway {
        fn new(modality: Modality, upload_outcome: std::result::Result<String, String>) -> Self {
            Self {
                modality,
                upload_calls: AtomicUsize::new(0),
                update_calls: AtomicUsize::new(0),
                upload_outcome: Mutex::new(upload_outcome),
                last_update: Mutex::new(None),
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

        async fn create(&self, _record: &ImagingRecord) -> Result<()> {
            unimplemented!()
        }

        async fn update(&self, _id: &str, record: &ImagingRecord) -> Result<()> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_update.lock().unwrap() = Some(record.clone());
            Ok(())
        }

        async fn delete(&self, _id: &str) -> Result<()> {
            unimplemented!()
        }

        async fn upload_image(
            &self,
            _file: ImageFile,
            _max_bytes: u64,
            on_progress: Option<ProgressFn>,
            _cancel: CancelToken,
        ) -> Result<String> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            match &*self.upload_outcome.lock().unwrap() {
                Ok(url) => {
                    if let Some(progress) = on_progress {
                        for percent in [10, 45, 80, 100] {
                            progress(percent);
                        }
                    }
                    Ok(url.clone())
                }
                Err(message) => Err(MedrecError::Upload(message.clone())),
            }
        }
    }

    fn xray_record() -> ImagingRecord {
        let mut record = ImagingRecord::blank(Modality::Xray);
        record.id = "x9".to_string();
        record.patient_name = "John Roe".to_string();
        record.patient_id = "P200".to_string();
        record.age = 58;
        record.image_url = Some("uploads/old.png".to_string());
        record
    }

    fn png(bytes: usize) -> ImageFile {
        ImageFile::new("scan.png", "image/png", vec![0u8; bytes])
    }

    #[tokio::test]
    async fn test_save_without_new_image_keeps_old_url() {
        let gateway = Arc::new(CountingGateway::new(
            Modality::Xray,
            Ok("unused".to_string()),
        ));
        let mut screen = EditScreen::new(gateway.clone(), xray_record(), 5 * 1024 * 1024);

        let saved = screen.submit(None).await.unwrap();
        assert_eq!(saved.image_url.as_deref(), Some("uploads/old.png"));
        assert_eq!(gateway.upload_calls.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.update_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upload_strictly_precedes_update_and_url_is_merged() {
        let gateway = Arc::new(CountingGateway::new(
            Modality::Xray,
            Ok("uploads/new.png".to_string()),
        ));
        let mut screen = EditScreen::new(gateway.clone(), xray_record(), 5 * 1024 * 1024);

        let saved = screen.submit(Some(png(128))).await.unwrap();
        assert_eq!(saved.image_url.as_deref(), Some("uploads/new.png"));
        assert_eq!(gateway.upload_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.update_calls.load(Ordering::SeqCst), 1);
        let sent = gateway.last_update.lock().unwrap().clone().unwrap();
        assert_eq!(sent.image_url.as_deref(), Some("uploads/new.png"));
    }

    #[tokio::test]
    async fn test_failed_upload_aborts_submission() {
        let gateway = Arc::new(CountingGateway::new(
            Modality::Xray,
            Err("network".to_string()),
        ));
        let mut screen = EditScreen::new(gateway.clone(), xray_record(), 5 * 1024 * 1024);

        let err = screen.submit(Some(png(128))).await.unwrap_err();
        assert!(matches!(err, MedrecError::Upload(_)));
        // 更新调用从未发出
        assert_eq!(gateway.update_calls.load(Ordering::SeqCst), 0);
        // 错误状态包含上传自身的消息
        let error = screen.error.clone().unwrap();
        assert!(error.message.contains("network"));
        // 未保存的表单内容原样保留
        assert_eq!(screen.form.patient_name, "John Roe");
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_calls() {
        let gateway = Arc::new(CountingGateway::new(
            Modality::Xray,
            Ok("unused".to_string()),
        ));
        let mut screen = EditScreen::new(gateway.clone(), xray_record(), 5 * 1024 * 1024);
        screen.form.age = "0".to_string();

        let err = screen.submit(Some(png(128))).await.unwrap_err();
        assert!(matches!(err, MedrecError::Validation(_)));
        assert!(!screen.error.as_ref().unwrap().retryable);
        assert_eq!(gateway.upload_calls.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.update_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ct_unexposed_fields_survive_save() {
        let gateway = Arc::new(CountingGateway::new(Modality::Ct, Ok("u".to_string())));
        let mut record = ImagingRecord::blank(Modality::Ct);
        record.id = "12".to_string();
        record.patient_name = "Jane Doe".to_string();
        record.patient_id = "P100".to_string();
        record.age = 34;
        if let Findings::Ct(f) = &mut record.findings {
            f.fracture = "Linear".to_string();
            f.complications = vec!["Edema".to_string()];
        }
        let mut screen = EditScreen::new(gateway.clone(), record, 5 * 1024 * 1024);
        // 编辑表单不暴露骨折与并发症
        screen.form.fracture = String::new();

        let saved = screen.submit(None).await.unwrap();
        let findings = saved.findings.as_ct().unwrap();
        assert_eq!(findings.fracture, "Linear");
        assert_eq!(findings.complications, vec!["Edema".to_string()]);
    }
}
