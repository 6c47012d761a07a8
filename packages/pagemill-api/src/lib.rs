//! REST client for the Pagemill job backend.
//!
//! Implements the `pagemill-core` API traits over reqwest. Responses use a
//! `{data: T}` envelope; a not-found status maps to [`ApiError::NotFound`]
//! (a valid "no job yet" answer), everything else non-success maps to
//! [`ApiError::Api`] with the raw body as the message.
//!
//! # Example
//!
//! ```rust,ignore
//! use pagemill_api::PagemillClient;
//! use pagemill_core::{CreateJobRequest, TaskName};
//!
//! let client = PagemillClient::new("https://api.pagemill.dev".into(), Some(token));
//!
//! let job = client
//!     .create_job(&TaskName::CrawlSources, CreateJobRequest::new(project_id))
//!     .await?;
//! println!("started {}", job.id);
//! ```

pub mod sse;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use pagemill_core::api::{ApiError, ApiResult, JobsApi, SourcesApi, VersionsApi};
use pagemill_core::types::{
    ContentVersion, CreateJobRequest, HierarchyEdge, Job, JobId, Link, Project, ProjectId, Source,
    SourceId, TaskName, VersionId,
};

/// Wrapper for backend API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Clone)]
pub struct PagemillClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl PagemillClient {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> ApiResult<T> {
        let resp = self
            .request(builder)
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        decode_response(resp).await
    }

    async fn send_empty(&self, builder: reqwest::RequestBuilder) -> ApiResult<()> {
        let resp = self
            .request(builder)
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(())
    }
}

/// Map a response to its enveloped payload, or the appropriate error.
async fn decode_response<T: DeserializeOwned>(resp: reqwest::Response) -> ApiResult<T> {
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    let body = resp
        .text()
        .await
        .map_err(|err| ApiError::Transport(err.to_string()))?;
    let envelope: ApiResponse<T> = serde_json::from_str(&body)?;
    Ok(envelope.data)
}

#[async_trait]
impl JobsApi for PagemillClient {
    async fn create_job(&self, task: &TaskName, req: CreateJobRequest) -> ApiResult<Job> {
        tracing::info!(task = %task, project_id = %req.project_id, "Creating job");
        let url = self.url(&format!("/jobs/{}", task.as_str()));
        self.send(self.client.post(&url).json(&req)).await
    }

    async fn cancel_job(&self, id: JobId) -> ApiResult<Job> {
        tracing::info!(job_id = %id, "Requesting job cancellation");
        let url = self.url(&format!("/jobs/{}/cancel", id.0));
        self.send(self.client.post(&url)).await
    }

    async fn list_jobs(&self, project_id: ProjectId, limit: u32) -> ApiResult<Vec<Job>> {
        let url = self.url("/jobs");
        self.send(
            self.client
                .get(&url)
                .query(&[("project_id", project_id.to_string())])
                .query(&[("limit", limit)]),
        )
        .await
    }

    async fn latest_job(&self, project_id: ProjectId, task: &TaskName) -> ApiResult<Job> {
        let url = self.url("/jobs/latest");
        self.send(self.client.get(&url).query(&[
            ("project_id", project_id.to_string()),
            ("task_name", task.as_str().to_string()),
        ]))
        .await
    }

    async fn get_project(&self, project_id: ProjectId) -> ApiResult<Project> {
        let url = self.url(&format!("/projects/{}", project_id.0));
        self.send(self.client.get(&url)).await
    }
}

#[async_trait]
impl SourcesApi for PagemillClient {
    async fn list_sources(&self, project_id: ProjectId) -> ApiResult<Vec<Source>> {
        let url = self.url(&format!("/projects/{}/sources", project_id.0));
        self.send(self.client.get(&url)).await
    }

    async fn source_hierarchy(&self, project_id: ProjectId) -> ApiResult<Vec<HierarchyEdge>> {
        let url = self.url(&format!("/projects/{}/sources/hierarchy", project_id.0));
        self.send(self.client.get(&url)).await
    }

    async fn list_links(&self, project_id: ProjectId) -> ApiResult<Vec<Link>> {
        let url = self.url(&format!("/projects/{}/links", project_id.0));
        self.send(self.client.get(&url)).await
    }
}

#[async_trait]
impl VersionsApi for PagemillClient {
    async fn list_versions(&self, source_id: SourceId) -> ApiResult<Vec<ContentVersion>> {
        let url = self.url(&format!("/sources/{}/versions", source_id.0));
        self.send(self.client.get(&url)).await
    }

    async fn save_version(&self, source_id: SourceId, content: &str) -> ApiResult<ContentVersion> {
        let url = self.url(&format!("/sources/{}/versions", source_id.0));
        self.send(
            self.client
                .post(&url)
                .json(&serde_json::json!({ "content": content })),
        )
        .await
    }

    async fn restore_version(
        &self,
        source_id: SourceId,
        version_id: VersionId,
    ) -> ApiResult<ContentVersion> {
        let url = self.url(&format!(
            "/sources/{}/versions/{}/restore",
            source_id.0, version_id.0
        ));
        self.send(self.client.post(&url)).await
    }

    async fn delete_version(&self, source_id: SourceId, version_id: VersionId) -> ApiResult<()> {
        let url = self.url(&format!("/sources/{}/versions/{}", source_id.0, version_id.0));
        self.send_empty(self.client.delete(&url)).await
    }

    async fn clear_versions_except_latest(&self, source_id: SourceId) -> ApiResult<()> {
        let url = self.url(&format!(
            "/sources/{}/versions/clear_except_latest",
            source_id.0
        ));
        self.send_empty(self.client.post(&url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = PagemillClient::new("https://api.pagemill.dev/".into(), None);
        assert_eq!(
            client.url("/jobs/latest"),
            "https://api.pagemill.dev/jobs/latest"
        );
    }

    #[test]
    fn envelope_unwraps_data() {
        let body = r#"{"data": {"id": "018f0d37-7a5e-7bbd-a1b2-3c4d5e6f7081", "content": "hello", "created_at": "2025-03-01T12:00:00Z"}}"#;
        let envelope: ApiResponse<ContentVersion> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.content, "hello");
    }
}
