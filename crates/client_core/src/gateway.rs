use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{TaskId, TaskStatus},
    error::{ApiError, ErrorBody},
    protocol::{Task, TaskDraft, TaskStats},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    config::{normalize_base_url, ClientSettings},
    metrics::{MetricsBuffer, RequestMetric},
    validation::{validate_draft, validate_id},
};

pub const TASKS_PATH: &str = "/tasks";
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Every failure comes back as an [`ApiError`]; implementations must not let
/// transport errors escape in any other shape.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Task>, ApiError>;
    async fn get_by_id(&self, id: TaskId) -> Result<Task, ApiError>;
    async fn create(&self, draft: &TaskDraft) -> Result<Task, ApiError>;
    async fn update(&self, id: TaskId, draft: &TaskDraft) -> Result<Task, ApiError>;
    async fn remove(&self, id: TaskId) -> Result<(), ApiError>;
    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, ApiError>;

    async fn get_stats(&self) -> Result<TaskStats, ApiError> {
        aggregate_stats(self).await
    }
}

/// A failed per-status request counts as zero. A failed full listing fails the
/// whole aggregation.
pub async fn aggregate_stats<G>(gateway: &G) -> Result<TaskStats, ApiError>
where
    G: TaskGateway + ?Sized,
{
    let (all, pending, completed, cancelled) = futures::join!(
        gateway.list_all(),
        gateway.list_by_status(TaskStatus::Pending),
        gateway.list_by_status(TaskStatus::Completed),
        gateway.list_by_status(TaskStatus::Cancelled),
    );

    let all = all.inspect_err(|err| warn!(error = %err, "failed to load task statistics"))?;

    Ok(TaskStats {
        total: all.len(),
        pending: count_or_zero(TaskStatus::Pending, pending),
        completed: count_or_zero(TaskStatus::Completed, completed),
        cancelled: count_or_zero(TaskStatus::Cancelled, cancelled),
    })
}

fn count_or_zero(status: TaskStatus, result: Result<Vec<Task>, ApiError>) -> usize {
    match result {
        Ok(tasks) => tasks.len(),
        Err(err) => {
            warn!(status = %status, error = %err, "status count unavailable; reporting zero");
            0
        }
    }
}

pub struct HttpTaskGateway {
    http: Client,
    base_url: String,
    metrics: Mutex<MetricsBuffer>,
}

impl HttpTaskGateway {
    pub fn new(settings: &ClientSettings) -> anyhow::Result<Self> {
        let base_url = normalize_base_url(&settings.base_url)?;
        let http = Client::builder()
            .timeout(settings.timeout())
            .build()
            .context("failed to build task service http client")?;
        Ok(Self {
            http,
            base_url,
            metrics: Mutex::new(MetricsBuffer::default()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn metrics(&self) -> Vec<RequestMetric> {
        self.metrics.lock().await.snapshot()
    }

    pub async fn average_response_time(&self) -> Duration {
        Duration::from_millis(self.metrics.lock().await.average_response_ms())
    }

    pub async fn error_rate(&self) -> u32 {
        self.metrics.lock().await.error_rate()
    }

    pub async fn clear_metrics(&self) {
        self.metrics.lock().await.clear();
    }

    pub async fn ping(&self) -> bool {
        let request = self
            .http
            .get(self.url(TASKS_PATH))
            .timeout(PING_TIMEOUT);
        match self.dispatch(Method::GET, TASKS_PATH, request).await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "task service connectivity check failed");
                false
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.http.get(self.url(path));
        let (status, body) = self.dispatch(Method::GET, path, request).await?;
        decode(status, &body)
    }

    async fn send_draft(
        &self,
        method: Method,
        path: &str,
        draft: &TaskDraft,
    ) -> Result<Task, ApiError> {
        let request = self
            .http
            .request(method.clone(), self.url(path))
            .json(draft);
        let (status, body) = self.dispatch(method, path, request).await?;
        decode(status, &body)
    }

    /// Every call is recorded, with status `0` when no response arrived.
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        request: RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), ApiError> {
        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                let status = err.status().map(|s| s.as_u16()).unwrap_or(0);
                self.record(&method, path, started.elapsed(), status).await;
                warn!(method = %method, path, error = %err, "task api request failed");
                return Err(error_from_transport(&err));
            }
        };

        let status = response.status();
        let body = response.bytes().await;
        let elapsed = started.elapsed();
        self.record(&method, path, elapsed, status.as_u16()).await;

        let body = match body {
            Ok(body) => body.to_vec(),
            Err(err) => {
                warn!(
                    method = %method,
                    path,
                    status = status.as_u16(),
                    error = %err,
                    "task api response body unreadable"
                );
                return Err(ApiError::server(
                    status.as_u16(),
                    format!("failed to read response from task service: {err}"),
                )
                .with_code("INVALID_RESPONSE"));
            }
        };

        if status.is_success() {
            info!(
                method = %method,
                path,
                status = status.as_u16(),
                elapsed_ms = elapsed.as_millis() as u64,
                "task api request completed"
            );
            Ok((status, body))
        } else {
            let err = error_from_response(status, &body);
            warn!(
                method = %method,
                path,
                status = status.as_u16(),
                error = %err,
                "task api request rejected"
            );
            Err(err)
        }
    }

    async fn record(&self, method: &Method, path: &str, duration: Duration, status: u16) {
        self.metrics.lock().await.record(RequestMetric {
            method: method.as_str().to_string(),
            path: path.to_string(),
            duration,
            status,
            timestamp: Utc::now(),
        });
    }
}

#[async_trait]
impl TaskGateway for HttpTaskGateway {
    async fn list_all(&self) -> Result<Vec<Task>, ApiError> {
        self.get_json(TASKS_PATH).await
    }

    async fn get_by_id(&self, id: TaskId) -> Result<Task, ApiError> {
        let id = validate_id(id)?;
        self.get_json(&task_path(id)).await
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        let draft = validate_draft(draft)?;
        self.send_draft(Method::POST, TASKS_PATH, &draft).await
    }

    async fn update(&self, id: TaskId, draft: &TaskDraft) -> Result<Task, ApiError> {
        let id = validate_id(id)?;
        let draft = validate_draft(draft)?;
        self.send_draft(Method::PUT, &task_path(id), &draft).await
    }

    async fn remove(&self, id: TaskId) -> Result<(), ApiError> {
        let id = validate_id(id)?;
        let path = task_path(id);
        let request = self.http.delete(self.url(&path));
        self.dispatch(Method::DELETE, &path, request).await?;
        Ok(())
    }

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, ApiError> {
        self.get_json(&format!("{TASKS_PATH}/status/{}", status.as_str()))
            .await
    }
}

fn task_path(id: TaskId) -> String {
    format!("{TASKS_PATH}/{}", id.0)
}

fn decode<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| {
        ApiError::server(
            status.as_u16(),
            format!("unexpected response from task service: {err}"),
        )
        .with_code("INVALID_RESPONSE")
    })
}

fn error_from_response(status: StatusCode, body: &[u8]) -> ApiError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => ApiError::from_body(status.as_u16(), parsed),
        Err(_) => ApiError::server(
            status.as_u16(),
            format!("request failed with status code {}", status.as_u16()),
        ),
    }
}

fn error_from_transport(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::network("connection error: the task service did not respond in time")
            .with_code("TIMEOUT")
    } else if err.is_connect() {
        ApiError::network("connection error: unable to reach the task service")
            .with_code("CONNECTION_REFUSED")
    } else {
        ApiError::network(format!("connection error: {err}")).with_code("NETWORK_ERROR")
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
