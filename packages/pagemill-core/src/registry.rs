//! Client-side materialized cache of job records.
//!
//! The registry is the single source of truth the rest of the core reads
//! from. Two producers feed it — push events and on-demand pulls — and the
//! server is the sole author of job records, so conflict resolution is full
//! replacement keyed by id. One guard applies: a record strictly older than
//! the cached one (by `updated_at`) is ignored, so a delayed pull can never
//! roll a job's visible state backwards past a fresher push.
//!
//! # Guarantees
//!
//! - **Upserts are atomic**: one dashmap entry write per call.
//! - **Nothing is deleted**: records age out with the process, not by policy.
//! - **At-most-once fan-out**: registry events use a broadcast channel; slow
//!   subscribers may lag and miss events (same contract as the job lists
//!   themselves — consumers re-pull on mount).

use std::collections::HashSet;
use std::sync::Mutex;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::types::{Job, JobId, ProjectId};

/// Default capacity for the registry event channel.
const EVENT_CAPACITY: usize = 1024;

/// What an upsert did with the offered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First time this job id was seen.
    Inserted,
    /// Replaced the cached record wholesale.
    Replaced,
    /// Offered record was older than the cached one and was dropped.
    StaleIgnored,
}

/// Notifications emitted by the registry.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A job record was inserted or replaced.
    JobUpserted { job: Job },
    /// Cached project-level aggregates (job lists, project status) must be
    /// re-fetched before the next read.
    ProjectInvalidated { project_id: ProjectId },
}

/// Process-wide job cache with a narrow mutation surface.
///
/// All mutation goes through [`upsert`](JobRegistry::upsert) and
/// [`invalidate`](JobRegistry::invalidate); there are no ambient write sites.
pub struct JobRegistry {
    jobs: DashMap<JobId, Job>,
    stale_projects: Mutex<HashSet<ProjectId>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl JobRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            jobs: DashMap::new(),
            stale_projects: Mutex::new(HashSet::new()),
            events,
        }
    }

    /// Insert or replace a job record.
    ///
    /// Replacement is full-record: the server is authoritative and no
    /// client-side field merge happens. Records older than the cached one by
    /// `updated_at` are ignored, which makes the push/pull race safe even if
    /// deliveries arrive out of order.
    pub fn upsert(&self, job: Job) -> UpsertOutcome {
        let outcome = match self.jobs.entry(job.id) {
            Entry::Occupied(mut entry) => {
                if job.updated_at < entry.get().updated_at {
                    tracing::debug!(
                        job_id = %job.id,
                        cached = %entry.get().updated_at,
                        offered = %job.updated_at,
                        "Ignoring stale job record"
                    );
                    return UpsertOutcome::StaleIgnored;
                }
                entry.insert(job.clone());
                UpsertOutcome::Replaced
            }
            Entry::Vacant(entry) => {
                entry.insert(job.clone());
                UpsertOutcome::Inserted
            }
        };
        // Fire-and-forget: no subscribers is fine.
        let _ = self.events.send(RegistryEvent::JobUpserted { job });
        outcome
    }

    /// All known jobs for a project, unordered.
    pub fn jobs_for_project(&self, project_id: ProjectId) -> Vec<Job> {
        self.jobs
            .iter()
            .filter(|entry| entry.value().project_id == project_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.get(&id).map(|entry| entry.value().clone())
    }

    /// Mark a project's cached aggregates stale. The next consumer read must
    /// go back to the server instead of trusting memory.
    pub fn invalidate(&self, project_id: ProjectId) {
        self.stale_projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(project_id);
        let _ = self
            .events
            .send(RegistryEvent::ProjectInvalidated { project_id });
    }

    /// Whether a project's cached view is stale. Checking does not clear the
    /// flag; [`mark_fresh`](JobRegistry::mark_fresh) does, after a re-fetch.
    pub fn is_stale(&self, project_id: ProjectId) -> bool {
        self.stale_projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&project_id)
    }

    /// Clear the stale flag after a successful re-fetch.
    pub fn mark_fresh(&self, project_id: ProjectId) {
        self.stale_projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&project_id);
    }

    /// Subscribe to registry notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("job_count", &self.jobs.len())
            .finish()
    }
}
