//! In-memory API fake for tests and embedding-app harnesses.

use chrono::Utc;
use dashmap::DashMap;

use async_trait::async_trait;

use crate::api::{ApiError, ApiResult, JobsApi, SourcesApi, VersionsApi};
use crate::types::{
    ContentVersion, CreateJobRequest, HierarchyEdge, Job, JobId, JobStatus, Link, Project,
    ProjectId, Source, SourceId, TaskName, VersionId,
};

/// Implements the API traits over dashmaps, mimicking the server's observable
/// contract: `{latest job}` not-found semantics, cancel → `cancelling`,
/// newest-first version timelines.
#[derive(Default)]
pub struct InMemoryApi {
    jobs: DashMap<JobId, Job>,
    projects: DashMap<ProjectId, Project>,
    sources: DashMap<ProjectId, Vec<Source>>,
    edges: DashMap<ProjectId, Vec<HierarchyEdge>>,
    links: DashMap<ProjectId, Vec<Link>>,
    versions: DashMap<SourceId, Vec<ContentVersion>>,
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a job record directly, as if the server already had it.
    pub fn seed_job(&self, job: Job) {
        self.jobs.insert(job.id, job);
    }

    pub fn seed_project(&self, project: Project) {
        self.projects.insert(project.id, project);
    }

    pub fn seed_sources(&self, project_id: ProjectId, sources: Vec<Source>) {
        self.sources.insert(project_id, sources);
    }

    pub fn seed_edges(&self, project_id: ProjectId, edges: Vec<HierarchyEdge>) {
        self.edges.insert(project_id, edges);
    }

    /// Drive a job through a server-side transition, as a push or poll would
    /// later observe it.
    pub fn transition_job(&self, id: JobId, status: JobStatus) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.status = status;
            job.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl JobsApi for InMemoryApi {
    async fn create_job(&self, task: &TaskName, req: CreateJobRequest) -> ApiResult<Job> {
        let now = Utc::now();
        let job = Job {
            id: JobId::new(),
            project_id: req.project_id,
            task_name: task.clone(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            progress: None,
            result: None,
            error_message: None,
        };
        self.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn cancel_job(&self, id: JobId) -> ApiResult<Job> {
        let mut job = self.jobs.get_mut(&id).ok_or(ApiError::NotFound)?;
        if job.can_cancel() {
            job.status = JobStatus::Cancelling;
            job.updated_at = Utc::now();
        }
        Ok(job.clone())
    }

    async fn list_jobs(&self, project_id: ProjectId, limit: u32) -> ApiResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().project_id == project_id)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit as usize);
        Ok(jobs)
    }

    async fn latest_job(&self, project_id: ProjectId, task: &TaskName) -> ApiResult<Job> {
        self.jobs
            .iter()
            .filter(|entry| {
                entry.value().project_id == project_id && entry.value().task_name == *task
            })
            .max_by(|a, b| {
                a.value()
                    .created_at
                    .cmp(&b.value().created_at)
                    .then(a.value().id.cmp(&b.value().id))
            })
            .map(|entry| entry.value().clone())
            .ok_or(ApiError::NotFound)
    }

    async fn get_project(&self, project_id: ProjectId) -> ApiResult<Project> {
        self.projects
            .get(&project_id)
            .map(|entry| entry.value().clone())
            .ok_or(ApiError::NotFound)
    }
}

#[async_trait]
impl SourcesApi for InMemoryApi {
    async fn list_sources(&self, project_id: ProjectId) -> ApiResult<Vec<Source>> {
        Ok(self
            .sources
            .get(&project_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn source_hierarchy(&self, project_id: ProjectId) -> ApiResult<Vec<HierarchyEdge>> {
        Ok(self
            .edges
            .get(&project_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn list_links(&self, project_id: ProjectId) -> ApiResult<Vec<Link>> {
        Ok(self
            .links
            .get(&project_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl VersionsApi for InMemoryApi {
    async fn list_versions(&self, source_id: SourceId) -> ApiResult<Vec<ContentVersion>> {
        Ok(self
            .versions
            .get(&source_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn save_version(&self, source_id: SourceId, content: &str) -> ApiResult<ContentVersion> {
        let version = ContentVersion {
            id: VersionId::new(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.versions
            .entry(source_id)
            .or_default()
            .insert(0, version.clone());
        Ok(version)
    }

    async fn restore_version(
        &self,
        source_id: SourceId,
        version_id: VersionId,
    ) -> ApiResult<ContentVersion> {
        self.versions
            .get(&source_id)
            .and_then(|entry| {
                entry
                    .value()
                    .iter()
                    .find(|version| version.id == version_id)
                    .cloned()
            })
            .ok_or(ApiError::NotFound)
    }

    async fn delete_version(&self, source_id: SourceId, version_id: VersionId) -> ApiResult<()> {
        let mut versions = self.versions.get_mut(&source_id).ok_or(ApiError::NotFound)?;
        versions.retain(|version| version.id != version_id);
        Ok(())
    }

    async fn clear_versions_except_latest(&self, source_id: SourceId) -> ApiResult<()> {
        if let Some(mut versions) = self.versions.get_mut(&source_id) {
            versions.truncate(1);
        }
        Ok(())
    }
}
