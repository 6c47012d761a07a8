//! Job tracking facade: the write path into the registry.
//!
//! Ties the REST surface to the registry so every job-creation response and
//! every pull lands in the same cache the push subscriber feeds. Also the
//! pull backstop: `refresh_project_jobs` re-lists a project's jobs and clears
//! its stale flag, which is all the correctness the core needs even if push
//! never delivers.

use std::sync::Arc;

use crate::api::JobsApi;
use crate::error::{CoreError, Result};
use crate::registry::JobRegistry;
use crate::types::{CreateJobRequest, Job, JobId, ProjectId, TaskName};

/// Default page size when pulling a project's job list.
const DEFAULT_LIST_LIMIT: u32 = 100;

pub struct JobTracker {
    api: Arc<dyn JobsApi>,
    registry: Arc<JobRegistry>,
}

impl JobTracker {
    pub fn new(api: Arc<dyn JobsApi>, registry: Arc<JobRegistry>) -> Self {
        Self { api, registry }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Create a job and fold the server's record into the registry.
    pub async fn create(&self, task: &TaskName, req: CreateJobRequest) -> Result<Job> {
        let job = self.api.create_job(task, req).await?;
        tracing::info!(job_id = %job.id, task = %task, "Job created");
        self.registry.upsert(job.clone());
        self.registry.invalidate(job.project_id);
        Ok(job)
    }

    /// Request cooperative cancellation.
    ///
    /// Idempotent at the interface: while a job is already `cancelling` (or
    /// terminal) no second request is sent; the cached record is returned.
    /// The client never forces a terminal state locally — it keeps observing
    /// until the server reports `canceled` or a raced `completed`.
    pub async fn cancel(&self, id: JobId) -> Result<Job> {
        if let Some(cached) = self.registry.get(id) {
            if !cached.can_cancel() {
                tracing::debug!(job_id = %id, status = ?cached.status, "Cancel skipped");
                return Ok(cached);
            }
        }
        let job = self.api.cancel_job(id).await?;
        tracing::info!(job_id = %job.id, status = ?job.status, "Cancel requested");
        self.registry.upsert(job.clone());
        self.registry.invalidate(job.project_id);
        Ok(job)
    }

    /// Pull a project's job list from the server and refresh the cache.
    /// Clears the project's stale flag on success.
    pub async fn refresh_project_jobs(&self, project_id: ProjectId) -> Result<Vec<Job>> {
        let jobs = self
            .api
            .list_jobs(project_id, DEFAULT_LIST_LIMIT)
            .await
            .map_err(CoreError::Api)?;
        for job in &jobs {
            self.registry.upsert(job.clone());
        }
        self.registry.mark_fresh(project_id);
        tracing::debug!(%project_id, count = jobs.len(), "Project jobs refreshed");
        Ok(jobs)
    }

    /// Cached jobs for a project, pulling first if the cache is stale.
    pub async fn project_jobs(&self, project_id: ProjectId) -> Result<Vec<Job>> {
        if self.registry.is_stale(project_id) {
            self.refresh_project_jobs(project_id).await?;
        }
        Ok(self.registry.jobs_for_project(project_id))
    }
}
