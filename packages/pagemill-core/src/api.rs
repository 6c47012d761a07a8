//! Interfaces to the job backend.
//!
//! The core never talks HTTP directly. Everything server-side is consumed
//! through these traits; `pagemill-api` provides the reqwest implementation
//! and tests use the in-memory fake from [`crate::testing`].

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::types::{
    ContentVersion, CreateJobRequest, HierarchyEdge, Job, JobId, Link, Project, ProjectId, Source,
    SourceId, TaskName, VersionId,
};

/// Errors crossing the API boundary.
///
/// `NotFound` is load-bearing: the latest-job endpoint reports "no job exists
/// yet" this way, and it must be mapped to absence, never retried.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested record does not exist. A valid answer, not a failure.
    #[error("not found")]
    NotFound,

    /// Network-level failure (connection refused, timeout, stream cut).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Transport and server errors are worth a bounded retry; `NotFound` and
    /// malformed bodies are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Api { .. })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Job creation, cancellation, and query endpoints.
#[async_trait]
pub trait JobsApi: Send + Sync {
    /// `POST /jobs/{task}` — start a new job; returns the created record.
    async fn create_job(&self, task: &TaskName, req: CreateJobRequest) -> ApiResult<Job>;

    /// `POST /jobs/{id}/cancel` — request cooperative cancellation; the
    /// returned record reports `cancelling`.
    async fn cancel_job(&self, id: JobId) -> ApiResult<Job>;

    /// `GET /jobs?project_id=&limit=` — list known jobs for a project.
    async fn list_jobs(&self, project_id: ProjectId, limit: u32) -> ApiResult<Vec<Job>>;

    /// `GET /jobs/latest?project_id=&task_name=` — most recent job of a
    /// category, or `ApiError::NotFound` when none exists.
    async fn latest_job(&self, project_id: ProjectId, task: &TaskName) -> ApiResult<Job>;

    /// `GET /projects/{id}` — current project record, including status.
    async fn get_project(&self, project_id: ProjectId) -> ApiResult<Project>;
}

/// Source and link read endpoints.
#[async_trait]
pub trait SourcesApi: Send + Sync {
    /// `GET /projects/{id}/sources` — flat source list.
    async fn list_sources(&self, project_id: ProjectId) -> ApiResult<Vec<Source>>;

    /// `GET /projects/{id}/sources/hierarchy` — parent/child edges.
    async fn source_hierarchy(&self, project_id: ProjectId) -> ApiResult<Vec<HierarchyEdge>>;

    /// `GET /projects/{id}/links` — read-only mirror of link records.
    async fn list_links(&self, project_id: ProjectId) -> ApiResult<Vec<Link>>;
}

/// Version-history endpoints, scoped per source.
#[async_trait]
pub trait VersionsApi: Send + Sync {
    /// Newest-first version list.
    async fn list_versions(&self, source_id: SourceId) -> ApiResult<Vec<ContentVersion>>;

    /// Persist content as a new version at the head of the timeline.
    async fn save_version(&self, source_id: SourceId, content: &str) -> ApiResult<ContentVersion>;

    /// Restore a historical version; returns the restored content.
    async fn restore_version(&self, source_id: SourceId, version_id: VersionId)
        -> ApiResult<ContentVersion>;

    async fn delete_version(&self, source_id: SourceId, version_id: VersionId) -> ApiResult<()>;

    /// Drop all history except the most recent entry.
    async fn clear_versions_except_latest(&self, source_id: SourceId) -> ApiResult<()>;
}

/// A live stream of job updates for one project. Each item is a full job
/// record as pushed by the server.
pub type JobUpdateStream = BoxStream<'static, ApiResult<Job>>;

/// Long-lived server-to-client event channel, one per project.
///
/// Best-effort: delivery is not guaranteed and the core must stay correct if
/// this stream never yields a single event (pull is the backstop).
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn subscribe(&self, project_id: ProjectId) -> ApiResult<JobUpdateStream>;
}
