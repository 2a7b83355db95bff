//! Client-side media upload: validate a picked file, fetch one-time upload
//! credentials, send the file straight to the CDN and report progress.

use crate::config::ImageKitSettings;
use crate::models::{FileType, SelectedFile, UploadCredentials, UploadResponse};
use crate::services::imagekit_client::{HttpUploadAuth, ImageKitClient};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI16, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Largest file the widget accepts: 100 MiB.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid file type. Please upload a video.")]
    WrongType,

    #[error("File size exceeds {}MB limit.", .limit / (1024 * 1024))]
    TooLarge { size: u64, limit: u64 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Upload aborted")]
    Abort,

    #[error("Invalid upload request: {0}")]
    InvalidRequest(String),

    #[error("Upload server error: {0}")]
    Server(String),

    #[error("Network error during upload: {0}")]
    Network(String),

    #[error("Failed to obtain upload credentials: {0}")]
    Auth(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadWidgetError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Check a file before any network call.
///
/// Only videos are type-checked; the picker's `accept` filter is the image
/// guard. A wrong type is reported before an oversized file.
pub fn validate(
    file: &SelectedFile,
    file_type: Option<FileType>,
    max_file_size: u64,
) -> Result<(), ValidationError> {
    if file_type == Some(FileType::Video) && !file.mime_type.starts_with("video/") {
        return Err(ValidationError::WrongType);
    }
    if file.size() > max_file_size {
        return Err(ValidationError::TooLarge {
            size: file.size(),
            limit: max_file_size,
        });
    }
    Ok(())
}

/// Everything the CDN needs for one signed upload.
#[derive(Debug)]
pub struct UploadParams {
    pub file: SelectedFile,
    pub file_name: String,
    pub public_key: String,
    pub signature: String,
    pub expire: i64,
    pub token: String,
}

/// Called with `(bytes_sent, total_bytes)` while the body is streamed.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Source of per-upload credentials.
#[async_trait]
pub trait UploadAuthSource: Send + Sync {
    async fn get_upload_auth(&self) -> Result<UploadCredentials, UploadError>;
}

/// Direct-to-CDN upload.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        params: UploadParams,
        progress: ProgressFn,
    ) -> Result<UploadResponse, UploadError>;
}

/// Caller callbacks for one widget.
pub trait UploadObserver: Send + Sync {
    fn on_success(&self, response: &UploadResponse);

    /// Whole percentages, non-decreasing within one upload.
    fn on_progress(&self, _percent: u8) {}

    fn on_error(&self, _error: &UploadWidgetError) {}
}

/// `round(loaded / total * 100)`, or `None` when the total is unknown.
pub fn progress_percent(loaded: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = (loaded as f64 / total as f64 * 100.0).round();
    Some(percent.clamp(0.0, 100.0) as u8)
}

/// Turns byte counts into percent callbacks, dropping anything that would go backwards.
struct ProgressTracker {
    observer: Arc<dyn UploadObserver>,
    /// Last reported percent, `-1` before the first report.
    last: AtomicI16,
}

impl ProgressTracker {
    fn new(observer: Arc<dyn UploadObserver>) -> Self {
        Self {
            observer,
            last: AtomicI16::new(-1),
        }
    }

    fn update(&self, loaded: u64, total: u64) {
        if let Some(percent) = progress_percent(loaded, total) {
            let previous = self.last.fetch_max(i16::from(percent), Ordering::SeqCst);
            if i16::from(percent) > previous {
                self.observer.on_progress(percent);
            }
        }
    }
}

/// Counts one attempt as in flight until dropped.
struct UploadingGuard<'a>(&'a AtomicUsize);

impl<'a> UploadingGuard<'a> {
    fn start(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for UploadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct UploadWidget {
    auth: Arc<dyn UploadAuthSource>,
    uploader: Arc<dyn Uploader>,
    public_key: String,
    file_type: Option<FileType>,
    max_file_size: u64,
    in_flight: AtomicUsize,
    error: Mutex<Option<String>>,
    /// Parent of every running attempt's token.
    cancel: Mutex<CancellationToken>,
}

impl UploadWidget {
    pub fn new(
        auth: Arc<dyn UploadAuthSource>,
        uploader: Arc<dyn Uploader>,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            uploader,
            public_key: public_key.into(),
            file_type: None,
            max_file_size: MAX_FILE_SIZE,
            in_flight: AtomicUsize::new(0),
            error: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Widget wired to the configured credential endpoint and ImageKit.
    pub fn from_settings(settings: &ImageKitSettings) -> Self {
        let client = reqwest::Client::new();
        Self::new(
            Arc::new(HttpUploadAuth::new(client.clone(), &settings.auth_url)),
            Arc::new(ImageKitClient::new(client, &settings.upload_url)),
            settings.public_key.clone(),
        )
        .with_max_file_size(settings.max_file_size)
    }

    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type = Some(file_type);
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn file_type(&self) -> Option<FileType> {
        self.file_type
    }

    /// Picker filter matching the widget's file type.
    pub fn accept(&self) -> &'static str {
        self.file_type.unwrap_or(FileType::Image).accept()
    }

    /// True while at least one attempt is in flight.
    pub fn is_uploading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Message of the last failed attempt, cleared when a new upload starts.
    pub fn error(&self) -> Option<String> {
        self.error.lock().clone()
    }

    /// Cancel every in-flight upload. Each fails with [`UploadError::Abort`];
    /// later attempts are unaffected.
    pub fn abort(&self) {
        let cancelled = std::mem::replace(&mut *self.cancel.lock(), CancellationToken::new());
        cancelled.cancel();
    }

    /// Validate and upload `file`.
    ///
    /// A file that fails validation is rejected before any network call.
    /// Failures are logged, reported to `observer.on_error` and returned.
    pub async fn select_file(
        &self,
        file: SelectedFile,
        observer: Arc<dyn UploadObserver>,
    ) -> Result<UploadResponse, UploadWidgetError> {
        if let Err(e) = validate(&file, self.file_type, self.max_file_size) {
            tracing::warn!(file_name = %file.name, size = file.size(), error = %e, "File rejected");
            return Err(self.fail(e.into(), observer.as_ref()));
        }

        let token = self.cancel.lock().child_token();
        let _uploading = UploadingGuard::start(&self.in_flight);
        *self.error.lock() = None;

        let file_name = file.name.clone();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(UploadError::Abort),
            result = self.attempt(file, observer.clone()) => result,
        };

        match result {
            Ok(response) => {
                tracing::info!(
                    file_name = %file_name,
                    file_id = %response.file_id,
                    "File uploaded successfully"
                );
                observer.on_success(&response);
                Ok(response)
            }
            Err(e) => {
                tracing::error!(file_name = %file_name, error = %e, "Upload failed");
                Err(self.fail(e.into(), observer.as_ref()))
            }
        }
    }

    async fn attempt(
        &self,
        file: SelectedFile,
        observer: Arc<dyn UploadObserver>,
    ) -> Result<UploadResponse, UploadError> {
        let credentials = self.auth.get_upload_auth().await?;

        let tracker = ProgressTracker::new(observer);
        let progress: ProgressFn = Arc::new(move |loaded: u64, total: u64| tracker.update(loaded, total));

        let params = UploadParams {
            file_name: file.name.clone(),
            file,
            public_key: self.public_key.clone(),
            signature: credentials.signature,
            expire: credentials.expire,
            token: credentials.token,
        };

        self.uploader.upload(params, progress).await
    }

    fn fail(&self, error: UploadWidgetError, observer: &dyn UploadObserver) -> UploadWidgetError {
        *self.error.lock() = Some(error.to_string());
        observer.on_error(&error);
        error
    }
}
