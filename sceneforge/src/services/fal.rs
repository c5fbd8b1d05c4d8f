//! Hosted image-to-3D mesh generation via the FAL queue API.

use crate::core::ImagePayload;
use crate::errors::ServiceError;
use crate::services::{expect_success, MeshGenerator};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://queue.fal.run";
const DEFAULT_MODEL: &str = "fal-ai/hunyuan3d/v2";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Client for a FAL-hosted image-to-3D model.
///
/// Requests go through FAL's queue: submit the source image, poll the
/// request status, then fetch the finished mesh's URL. The poll loop runs
/// until the queue reports completion; bound it with the pipeline's
/// per-call timeout.
#[derive(Debug, Clone)]
pub struct FalMeshClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    poll_interval: Duration,
}

impl FalMeshClient {
    /// Creates a client for the default mesh model.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the queue endpoint (for proxies and test servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the status poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    async fn submit(&self, image: &ImagePayload) -> Result<QueueSubmission, ServiceError> {
        let url = format!("{}/{}", self.base_url, self.model);
        let body = MeshRequest {
            input_image_url: image.to_data_uri(),
        };

        let response = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;
        let response = expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }

    async fn wait_until_done(&self, submission: &QueueSubmission) -> Result<(), ServiceError> {
        let status_url = submission.status_url.clone().unwrap_or_else(|| {
            format!(
                "{}/{}/requests/{}/status",
                self.base_url, self.model, submission.request_id
            )
        });

        loop {
            let response = self
                .http
                .get(&status_url)
                .header("Authorization", self.auth_header())
                .send()
                .await?;
            let response = expect_success(response).await?;
            let status: QueueStatus = response
                .json()
                .await
                .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

            match status.status.as_str() {
                "COMPLETED" => return Ok(()),
                "IN_QUEUE" | "IN_PROGRESS" => {
                    debug!(request_id = %submission.request_id, status = %status.status, "mesh request pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
                other => {
                    return Err(ServiceError::InvalidResponse(format!(
                        "unexpected queue status {other}"
                    )))
                }
            }
        }
    }

    async fn fetch_result(&self, submission: &QueueSubmission) -> Result<String, ServiceError> {
        let response_url = submission.response_url.clone().unwrap_or_else(|| {
            format!(
                "{}/{}/requests/{}",
                self.base_url, self.model, submission.request_id
            )
        });

        let response = self
            .http
            .get(&response_url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        let response = expect_success(response).await?;
        let result: MeshResult = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        result
            .model_mesh
            .map(|asset| asset.url)
            .ok_or_else(|| ServiceError::InvalidResponse("no mesh file in response".to_string()))
    }
}

#[async_trait]
impl MeshGenerator for FalMeshClient {
    async fn generate_mesh(
        &self,
        image: &ImagePayload,
        hint: &str,
    ) -> Result<String, ServiceError> {
        debug!(object = hint, bytes = image.len(), "submitting mesh request");
        let submission = self.submit(image).await?;
        self.wait_until_done(&submission).await?;
        self.fetch_result(&submission).await
    }
}

#[derive(Debug, Serialize)]
struct MeshRequest {
    input_image_url: String,
}

#[derive(Debug, Deserialize)]
struct QueueSubmission {
    request_id: String,
    #[serde(default)]
    status_url: Option<String>,
    #[serde(default)]
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct MeshResult {
    #[serde(default)]
    model_mesh: Option<MeshAsset>,
}

#[derive(Debug, Deserialize)]
struct MeshAsset {
    url: String,
}
