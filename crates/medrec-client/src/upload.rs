//! 图片上传客户端
//!
//! multipart流式上传：请求体按块推送，块推进时回调上传进度百分比，
//! 支持显式取消在途请求。进度与取消契约独立于底层HTTP实现。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{stream, Stream};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use medrec_core::{MedrecError, Result};

use crate::transport::CredentialProvider;

/// 上传进度回调，参数为0..=100的百分比，单调不减，成功时最后一次为100
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// 上传取消句柄
///
/// 屏幕被切走或重新选择文件时调用`cancel()`，让在途请求体流提前
/// 终止，避免过期上传的结果写回已脱离的界面状态。
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// 待上传的图片文件
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// 把文件切成块的请求体流
///
/// 每个块被底层客户端拉走时推进已发送字节数并回调百分比；
/// 取消后下一个块直接产出错误，请求体中断。
fn chunked_body(
    bytes: Vec<u8>,
    chunk_size: usize,
    on_progress: Option<ProgressFn>,
    cancel: CancelToken,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> {
    let total = bytes.len();
    let chunks: Vec<Vec<u8>> = bytes.chunks(chunk_size.max(1)).map(|c| c.to_vec()).collect();
    let mut sent = 0usize;
    stream::iter(chunks.into_iter().map(move |chunk| {
        if cancel.is_cancelled() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "upload cancelled",
            ));
        }
        sent += chunk.len();
        if let Some(progress) = &on_progress {
            let percent = ((sent as f64 / total as f64) * 100.0).round() as u8;
            progress(percent);
        }
        Ok(chunk)
    }))
}

/// 按观察到的三种响应形态提取URL，优先级：
/// `{success,data:{url}}` → `{success,url}` → 裸`{url}`
fn extract_url(payload: &Value) -> Option<String> {
    payload
        .get("data")
        .and_then(|data| data.get("url"))
        .and_then(|url| url.as_str())
        .or_else(|| payload.get("url").and_then(|url| url.as_str()))
        .map(|url| url.to_string())
}

/// 上传客户端
///
/// 与传输客户端共享同一个reqwest实例（连接池与cookie jar一致）。
#[derive(Clone)]
pub struct UploadClient {
    http: Client,
    credentials: Arc<dyn CredentialProvider>,
    chunk_size: usize,
}

impl UploadClient {
    pub fn new(http: Client, credentials: Arc<dyn CredentialProvider>, chunk_size: usize) -> Self {
        Self {
            http,
            credentials,
            chunk_size,
        }
    }

    /// 前置校验：必须是图片、不超过调用方选择的上限
    ///
    /// 违反时在任何网络调用发生之前直接失败。
    fn validate(file: &ImageFile, max_bytes: u64) -> Result<()> {
        if !file.content_type.starts_with("image/") {
            return Err(MedrecError::Validation(
                "Please select a valid image file".to_string(),
            ));
        }
        if file.size() > max_bytes {
            return Err(MedrecError::Validation(format!(
                "Image size should be less than {}MB",
                max_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }

    /// 上传一张图片，成功时返回服务端存储的资源URL
    pub async fn upload(
        &self,
        url: &str,
        field: &str,
        file: ImageFile,
        max_bytes: u64,
        on_progress: Option<ProgressFn>,
        cancel: CancelToken,
    ) -> Result<String> {
        Self::validate(&file, max_bytes)?;

        let upload_id = Uuid::new_v4();
        info!(
            "Upload {} started: {} ({} bytes)",
            upload_id,
            file.file_name,
            file.size()
        );

        let total = file.size();
        let body = if file.bytes.is_empty() {
            // 空文件没有可推进的块，单次回调100
            if let Some(progress) = &on_progress {
                progress(100);
            }
            Body::from(Vec::new())
        } else {
            Body::wrap_stream(chunked_body(
                file.bytes,
                self.chunk_size,
                on_progress,
                cancel.clone(),
            ))
        };

        let part = Part::stream_with_length(body, total)
            .file_name(file.file_name)
            .mime_str(&file.content_type)
            .map_err(|e| MedrecError::Upload(e.to_string()))?;
        let form = Form::new().part(field.to_string(), part);

        let mut request = self.http.post(url).multipart(form);
        if let Some(token) = self.credentials.bearer_token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if cancel.is_cancelled() {
                debug!("Upload {} cancelled", upload_id);
                MedrecError::Upload("Upload cancelled".to_string())
            } else {
                MedrecError::Network(format!("Network error during upload: {e}"))
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            warn!("Upload {} failed with status {}", upload_id, status);
            return Err(MedrecError::Upload(format!(
                "Upload failed with status {}",
                status.as_u16()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|_| MedrecError::Upload("Invalid response from server".to_string()))?;

        if payload.get("success").and_then(|v| v.as_bool()) == Some(false) {
            let message = payload
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Upload failed")
                .to_string();
            return Err(MedrecError::Upload(message));
        }

        let resolved = extract_url(&payload).ok_or_else(|| {
            MedrecError::Upload("Upload succeeded but no URL was returned".to_string())
        })?;
        info!("Upload {} finished: {}", upload_id, resolved);
        Ok(resolved)
    }
}
