//! Client configuration.
//!
//! Every knob the controller and the HTTP service read lives in
//! [`ClientConfig`], built via [`ClientConfigBuilder`]. Defaults: 2 s poll
//! interval, 500 ms pause between selecting a file and uploading it, 50 MiB
//! `.pdf` uploads.

use crate::error::ClientError;
use crate::file::FileRules;
use crate::progress::SessionObserver;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Service origin used when none is configured (the service's default bind).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Interval between status checks while a task is processing.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Pause between accepting a file and starting the upload.
pub const DEFAULT_SUBMIT_DELAY: Duration = Duration::from_millis(500);

/// Upload ceiling: 50 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// The only document type the service accepts. Matched as an exact suffix.
pub const ACCEPTED_EXTENSION: &str = ".pdf";

/// Prepended to the original file name to name the translated document.
pub const ARTIFACT_PREFIX: &str = "translated_";

/// Lower bound for the poll interval; anything shorter hammers the service.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for an [`crate::controller::UploadController`] and its
/// [`crate::service::HttpService`].
///
/// # Example
/// ```rust
/// use pdf_translate_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:8000")
///     .poll_interval(Duration::from_secs(1))
///     .build()
///     .unwrap();
/// assert_eq!(config.poll_interval, Duration::from_secs(1));
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Origin of the translation service, without a trailing slash.
    pub base_url: String,

    /// Status-check interval. Default: 2000 ms.
    pub poll_interval: Duration,

    /// Delay between `FileSelected` and `Uploading`. Default: 500 ms.
    ///
    /// Gives a UI one frame to show the selected file before the progress
    /// view replaces it.
    pub submit_delay: Duration,

    /// Largest accepted upload in bytes. Default: 50 MiB.
    pub max_upload_bytes: u64,

    /// Required file-name suffix. Default: `.pdf` (case-sensitive).
    pub accepted_extension: String,

    /// Prefix for the downloaded document's name. Default: `translated_`.
    pub artifact_prefix: String,

    /// Timeout for upload and status requests in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Timeout for the artifact download in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional event sink for phase/progress/error notifications.
    pub observer: Option<Arc<dyn SessionObserver>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            submit_delay: DEFAULT_SUBMIT_DELAY,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            accepted_extension: ACCEPTED_EXTENSION.to_string(),
            artifact_prefix: ARTIFACT_PREFIX.to_string(),
            request_timeout_secs: 30,
            download_timeout_secs: 120,
            observer: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .field("submit_delay", &self.submit_delay)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("accepted_extension", &self.accepted_extension)
            .field("artifact_prefix", &self.artifact_prefix)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn SessionObserver>"))
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// The validator rules derived from this config.
    pub fn file_rules(&self) -> FileRules {
        FileRules {
            accepted_extension: self.accepted_extension.clone(),
            max_bytes: self.max_upload_bytes,
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn submit_delay(mut self, delay: Duration) -> Self {
        self.config.submit_delay = delay;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn accepted_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.accepted_extension = ext.into();
        self
    }

    pub fn artifact_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.artifact_prefix = prefix.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.base_url).map_err(|e| {
            ClientError::InvalidConfig(format!("base URL '{}' is not valid: {}", c.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidConfig(format!(
                "base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.accepted_extension.is_empty() {
            return Err(ClientError::InvalidConfig(
                "accepted extension must not be empty".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(ClientError::InvalidConfig(
                "max upload size must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}
