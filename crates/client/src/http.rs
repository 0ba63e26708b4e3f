//! HTTP access to the analysis backend
//!
//! - `GET  /api/chart/{taskId}/{chartName}`: chart image bytes
//! - `HEAD /api/chart/{taskId}/{chartName}`: existence and metadata
//! - `GET  /api/task/{taskId}`: task status
//! - `GET  /api/results/{taskId}`: analysis results document

use crate::charts::ChartMetadata;
use bytes::Bytes;
use forcedash_core::{ChartName, Error, Result, TaskId, TaskSnapshot, TaskStatusEnvelope};
use reqwest::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Undecoded chart body as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChart {
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// Source of chart images
#[async_trait::async_trait]
pub trait ChartSource: Send + Sync {
    /// Fetch one chart; `force` asks intermediaries to revalidate
    async fn fetch_chart(&self, task: &TaskId, name: &ChartName, force: bool) -> Result<RawChart>;

    async fn chart_metadata(&self, task: &TaskId, name: &ChartName) -> Result<ChartMetadata>;

    /// Whether the chart exists; any failure reads as absent
    async fn chart_exists(&self, task: &TaskId, name: &ChartName) -> bool {
        self.chart_metadata(task, name).await.is_ok()
    }
}

/// Source of task status snapshots
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    async fn task_status(&self, task: &TaskId) -> Result<TaskSnapshot>;
}

/// Source of analysis results documents
#[async_trait::async_trait]
pub trait ResultsSource: Send + Sync {
    async fn task_results(&self, task: &TaskId) -> Result<serde_json::Value>;
}

/// reqwest-backed client for every backend endpoint
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: Url,
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client; `timeout` bounds every request end to end
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::configuration(format!("invalid base URL '{base_url}': {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("forcedash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            client,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for an API path
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::precondition(format!("cannot build URL for '{path}': {e}")))
    }

    pub fn chart_url(&self, task: &TaskId, name: &ChartName) -> Result<Url> {
        self.endpoint(&format!("/api/chart/{task}/{name}"))
    }

    fn request_error(&self, endpoint: &str, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::timeout(endpoint, self.timeout)
        } else {
            Error::transport(endpoint, err.to_string())
        }
    }

    async fn send(&self, endpoint: &str, request: reqwest::RequestBuilder) -> Result<Response> {
        trace!(endpoint, "sending request");
        let response = request
            .send()
            .await
            .map_err(|e| self.request_error(endpoint, e))?;
        check_status(endpoint, response).await
    }

    async fn body(&self, endpoint: &str, response: Response) -> Result<Bytes> {
        response
            .bytes()
            .await
            .map_err(|e| self.request_error(endpoint, e))
    }
}

/// Turn a non-2xx response into the matching error
async fn check_status(endpoint: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = if status == StatusCode::NOT_FOUND {
        String::new()
    } else {
        // the body is only diagnostic; keep it short
        let text = response.text().await.unwrap_or_default();
        text.chars().take(200).collect()
    };
    debug!(endpoint, status = status.as_u16(), "request failed");
    Err(Error::http(endpoint, status.as_u16(), message))
}

fn header_string(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[async_trait::async_trait]
impl ChartSource for HttpClient {
    async fn fetch_chart(&self, task: &TaskId, name: &ChartName, force: bool) -> Result<RawChart> {
        let url = self.chart_url(task, name)?;
        let endpoint = url.path().to_string();

        let mut request = self.client.get(url);
        if force {
            request = request.header(CACHE_CONTROL, "no-cache");
        }
        let response = self.send(&endpoint, request).await?;
        let content_type = header_string(&response, CONTENT_TYPE);
        let data = self.body(&endpoint, response).await?;

        debug!(endpoint = %endpoint, bytes = data.len(), "fetched chart");
        Ok(RawChart { data, content_type })
    }

    async fn chart_metadata(&self, task: &TaskId, name: &ChartName) -> Result<ChartMetadata> {
        let url = self.chart_url(task, name)?;
        let endpoint = url.path().to_string();
        let response = self.send(&endpoint, self.client.head(url.clone())).await?;

        Ok(ChartMetadata {
            name: name.to_string(),
            size: header_string(&response, CONTENT_LENGTH).and_then(|v| v.parse().ok()),
            content_type: header_string(&response, CONTENT_TYPE),
            last_modified: header_string(&response, LAST_MODIFIED),
            url: url.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl StatusSource for HttpClient {
    async fn task_status(&self, task: &TaskId) -> Result<TaskSnapshot> {
        let url = self.endpoint(&format!("/api/task/{task}"))?;
        let endpoint = url.path().to_string();
        let response = self.send(&endpoint, self.client.get(url)).await?;
        let body = self.body(&endpoint, response).await?;

        let envelope: TaskStatusEnvelope = serde_json::from_slice(&body)?;
        Ok(envelope.into_snapshot())
    }
}

#[async_trait::async_trait]
impl ResultsSource for HttpClient {
    async fn task_results(&self, task: &TaskId) -> Result<serde_json::Value> {
        let url = self.endpoint(&format!("/api/results/{task}"))?;
        let endpoint = url.path().to_string();
        let response = self.send(&endpoint, self.client.get(url)).await?;
        let body = self.body(&endpoint, response).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
