//! Latest-job resolution for a (project, task category) pair.
//!
//! "No job yet" is an answer, not an error: the server's not-found response
//! maps to `Ok(None)`. Genuine transport failures get a small bounded retry
//! before surfacing. The resolver holds no cache of its own — consumers call
//! it on mount and on every registry invalidation, and each call goes back to
//! the server, so a completion observed via push can never be shadowed by a
//! stale answer.

use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiError, JobsApi};
use crate::error::CoreError;
use crate::types::{Job, ProjectId, TaskName};

/// Attempts per resolve call, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// Delay between attempts.
const RETRY_DELAY: Duration = Duration::from_millis(250);

pub struct LatestJobResolver {
    api: Arc<dyn JobsApi>,
}

impl LatestJobResolver {
    pub fn new(api: Arc<dyn JobsApi>) -> Self {
        Self { api }
    }

    /// Most recent job of `task` for the project, or `None` when the server
    /// reports that no such job exists.
    pub async fn resolve(
        &self,
        project_id: ProjectId,
        task: &TaskName,
    ) -> Result<Option<Job>, CoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.api.latest_job(project_id, task).await {
                Ok(job) => return Ok(Some(job)),
                Err(ApiError::NotFound) => return Ok(None),
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    tracing::debug!(
                        %project_id,
                        task = %task,
                        attempt,
                        error = %err,
                        "Latest-job query failed, retrying"
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(err) if attempt >= MAX_ATTEMPTS => {
                    tracing::warn!(%project_id, task = %task, error = %err, "Latest-job query gave up");
                    return Err(CoreError::RetriesExhausted {
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) => return Err(CoreError::Api(err)),
            }
        }
    }
}

/// Pick the job with the maximum `created_at` from locally known records.
///
/// Ties are not expected but resolve deterministically by the larger job id.
pub fn latest_of<'a, I>(jobs: I) -> Option<&'a Job>
where
    I: IntoIterator<Item = &'a Job>,
{
    jobs.into_iter()
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::api::{ApiResult, JobsApi};
    use crate::types::{CreateJobRequest, JobId, JobStatus, Project};

    struct FlakyApi {
        calls: AtomicU32,
        failures_before_success: u32,
        terminal: Option<ApiError>,
    }

    impl FlakyApi {
        fn failing(times: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures_before_success: times,
                terminal: None,
            }
        }

        fn not_found() -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures_before_success: 0,
                terminal: Some(ApiError::NotFound),
            }
        }

        fn sample_job(project_id: ProjectId, task: &TaskName) -> Job {
            Job {
                id: JobId::new(),
                project_id,
                task_name: task.clone(),
                status: JobStatus::Completed,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                progress: None,
                result: None,
                error_message: None,
            }
        }
    }

    #[async_trait]
    impl JobsApi for FlakyApi {
        async fn create_job(&self, _: &TaskName, _: CreateJobRequest) -> ApiResult<Job> {
            unimplemented!("not exercised")
        }
        async fn cancel_job(&self, _: JobId) -> ApiResult<Job> {
            unimplemented!("not exercised")
        }
        async fn list_jobs(&self, _: ProjectId, _: u32) -> ApiResult<Vec<Job>> {
            unimplemented!("not exercised")
        }
        async fn latest_job(&self, project_id: ProjectId, task: &TaskName) -> ApiResult<Job> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ApiError::NotFound) = self.terminal {
                return Err(ApiError::NotFound);
            }
            if call < self.failures_before_success {
                Err(ApiError::Transport("connection refused".into()))
            } else {
                Ok(Self::sample_job(project_id, task))
            }
        }
        async fn get_project(&self, _: ProjectId) -> ApiResult<Project> {
            unimplemented!("not exercised")
        }
    }

    #[tokio::test]
    async fn not_found_is_absence_not_error() {
        let resolver = LatestJobResolver::new(Arc::new(FlakyApi::not_found()));
        let result = resolver
            .resolve(ProjectId::new(), &TaskName::CrawlSources)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let api = Arc::new(FlakyApi::failing(2));
        let resolver = LatestJobResolver::new(api.clone());
        let result = resolver
            .resolve(ProjectId::new(), &TaskName::CrawlSources)
            .await
            .unwrap();
        assert!(result.is_some());
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let api = Arc::new(FlakyApi::failing(10));
        let resolver = LatestJobResolver::new(api.clone());
        let err = resolver
            .resolve(ProjectId::new(), &TaskName::CrawlSources)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn latest_of_picks_max_created_at() {
        let project = ProjectId::new();
        let base = Utc::now();
        let mut jobs = Vec::new();
        for offset in [0i64, 60, 30] {
            let mut job = FlakyApi::sample_job(project, &TaskName::CrawlSources);
            job.created_at = base + ChronoDuration::seconds(offset);
            jobs.push(job);
        }

        let latest = latest_of(jobs.iter()).unwrap();
        assert_eq!(latest.created_at, base + ChronoDuration::seconds(60));
        assert!(latest_of(std::iter::empty::<&Job>()).is_none());
    }

    #[test]
    fn latest_of_breaks_ties_deterministically() {
        let project = ProjectId::new();
        let now = Utc::now();
        let mut a = FlakyApi::sample_job(project, &TaskName::CrawlSources);
        let mut b = FlakyApi::sample_job(project, &TaskName::CrawlSources);
        a.created_at = now;
        b.created_at = now;

        let expected = a.id.max(b.id);
        let forward = latest_of([&a, &b]).unwrap().id;
        let reverse = latest_of([&b, &a]).unwrap().id;
        assert_eq!(forward, expected);
        assert_eq!(reverse, expected);
    }
}
