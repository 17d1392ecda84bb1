//! reqwest-backed [`TranslationService`].
//!
//! Endpoint URLs are built by appending path segments to the configured base
//! URL, so a base with a path prefix (`https://host/translate`) works and task
//! ids are percent-encoded rather than spliced into the path verbatim.

use super::types::{ErrorBody, HealthReport, StatusSnapshot, Submission, TaskId};
use super::TranslationService;
use crate::config::ClientConfig;
use crate::error::{ClientError, ServiceError};
use crate::file::SelectedFile;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// MIME type sent with the uploaded file part.
const PDF_MIME: &str = "application/pdf";

/// HTTP client for the translation service.
#[derive(Debug, Clone)]
pub struct HttpService {
    client: Client,
    base: Url,
    download_timeout: Duration,
}

impl HttpService {
    /// Build a client from the config's base URL and timeouts.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            ClientError::InvalidConfig(format!("base URL '{}' is not valid: {}", config.base_url, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidConfig(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base,
            download_timeout: Duration::from_secs(config.download_timeout_secs),
        })
    }

    /// The base URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidUrl {
                url: self.base.to_string(),
                reason: "cannot be a base".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl TranslationService for HttpService {
    async fn submit(&self, file: &SelectedFile) -> Result<Submission, ServiceError> {
        let url = self.endpoint(&["api", "upload"])?;
        let endpoint = url.path().to_string();
        info!("Uploading '{}' ({} bytes) to {}", file.name, file.size(), url);

        let part = Part::stream_with_length(reqwest::Body::from(file.content.clone()), file.size())
            .file_name(file.name.clone())
            .mime_str(PDF_MIME)
            .map_err(|e| transport(&endpoint, e))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;

        let submission: Submission = read_json(&endpoint, response).await?;
        info!("Upload accepted, task id {}", submission.task_id);
        Ok(submission)
    }

    async fn poll_status(&self, task_id: &TaskId) -> Result<StatusSnapshot, ServiceError> {
        let url = self.endpoint(&["api", "status", task_id.as_str()])?;
        let endpoint = url.path().to_string();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;

        let snapshot: StatusSnapshot = read_json(&endpoint, response).await?;
        if snapshot.status.is_terminal() {
            info!("Task {} finished: {:?}", task_id, snapshot.status);
        } else {
            debug!(
                "Task {}: {:?} {}% {:?}",
                task_id,
                snapshot.status,
                snapshot.percent(),
                snapshot.message
            );
        }
        Ok(snapshot)
    }

    async fn fetch_result(&self, task_id: &TaskId) -> Result<Bytes, ServiceError> {
        let url = self.endpoint(&["api", "download", task_id.as_str()])?;
        let endpoint = url.path().to_string();
        info!("Downloading result of task {}", task_id);

        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;
        let response = ensure_success(&endpoint, response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport(&endpoint, e))?;
        info!("Downloaded {} bytes for task {}", bytes.len(), task_id);
        Ok(bytes)
    }

    async fn health(&self) -> Result<HealthReport, ServiceError> {
        let url = self.endpoint(&["api", "health"])?;
        let endpoint = url.path().to_string();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;
        read_json(&endpoint, response).await
    }
}

fn transport(endpoint: &str, e: reqwest::Error) -> ServiceError {
    ServiceError::Transport {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
        timed_out: e.is_timeout(),
    }
}

/// Turn a non-success response into [`ServiceError::Status`], pulling the
/// `detail` field out of the body when there is one.
async fn ensure_success(endpoint: &str, response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = match response.bytes().await {
        Ok(body) => serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_detail),
        Err(_) => None,
    };
    Err(ServiceError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        detail,
    })
}

async fn read_json<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, ServiceError> {
    let response = ensure_success(endpoint, response).await?;
    let body = response
        .bytes()
        .await
        .map_err(|e| transport(endpoint, e))?;
    serde_json::from_slice(&body).map_err(|e| ServiceError::Decode {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}
