//! Core data model: projects, jobs, sources, links, content versions.
//!
//! Everything here mirrors server-owned records. The client never mutates a
//! [`Job`] except by issuing cancel requests; all other changes arrive as
//! full replacement records through the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub Uuid);

impl LinkId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a content version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionId(pub Uuid);

impl VersionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Project
// ============================================================================

/// Persisted project workflow status.
///
/// Mutated only by server responses to user actions. Monotonic except for the
/// explicit `Failed` state reachable from `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    SearchParamsGenerated,
    SourcesConfigured,
    LinksExtracted,
    Processing,
    Failed,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub status: ProjectStatus,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Jobs
// ============================================================================

/// Category of work a job performs. Determines the shape of [`Job::result`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskName {
    GenerateSearchParams,
    GenerateSelectors,
    CrawlSources,
    RescanSources,
    ConfirmLinks,
    ProcessLinks,
    EditContent,
    /// Forward compatibility: tasks this client version does not know about.
    #[serde(untagged)]
    Other(String),
}

impl TaskName {
    /// Discovery-class tasks produce candidate links/sources not yet persisted.
    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            TaskName::GenerateSelectors | TaskName::CrawlSources | TaskName::RescanSources
        )
    }

    /// Confirmation tasks persist a user-approved subset of discovered items.
    pub fn is_confirmation(&self) -> bool {
        matches!(self, TaskName::ConfirmLinks)
    }

    /// Wire name used in REST paths and query parameters.
    pub fn as_str(&self) -> &str {
        match self {
            TaskName::GenerateSearchParams => "generate_search_params",
            TaskName::GenerateSelectors => "generate_selectors",
            TaskName::CrawlSources => "crawl_sources",
            TaskName::RescanSources => "rescan_sources",
            TaskName::ConfirmLinks => "confirm_links",
            TaskName::ProcessLinks => "process_links",
            TaskName::EditContent => "edit_content",
            TaskName::Other(name) => name,
        }
    }
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelling,
    Canceled,
}

impl JobStatus {
    /// Terminal states: the server will not change this job again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled
        )
    }

    /// Active states: the job may still make progress server-side.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::InProgress | JobStatus::Cancelling
        )
    }
}

/// Server-reported progress counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobProgress {
    pub processed_items: u32,
    pub total_items: u32,
}

impl JobProgress {
    /// Completion fraction in `[0.0, 1.0]`; zero-total progress reads as 0.
    pub fn fraction(&self) -> f32 {
        if self.total_items == 0 {
            0.0
        } else {
            self.processed_items as f32 / self.total_items as f32
        }
    }
}

/// A server-tracked asynchronous unit of work.
///
/// Owned by the server; the registry stores these as immutable snapshots and
/// replaces them wholesale on every update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub project_id: ProjectId,
    pub task_name: TaskName,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub progress: Option<JobProgress>,
    /// Payload whose shape is determined by `task_name`; decoded on demand.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Job {
    /// Whether a cancel request may be issued for this job.
    ///
    /// Refusing during `Cancelling` makes cancellation idempotent: one request
    /// in flight at a time, no duplicates while the server winds down.
    pub fn can_cancel(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::InProgress)
    }

    /// Decode the result payload of a discovery-class job.
    ///
    /// Returns `Ok(None)` when no result is present (job not completed, or a
    /// task that produces none).
    pub fn discovery_result(&self) -> Result<Option<DiscoveryResult>, serde_json::Error> {
        match &self.result {
            Some(value) => serde_json::from_value(value.clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Decode the result payload of an AI edit job.
    pub fn edit_result(&self) -> Result<Option<EditResult>, serde_json::Error> {
        match &self.result {
            Some(value) => serde_json::from_value(value.clone()).map(Some),
            None => Ok(None),
        }
    }
}

/// Result payload of discovery-class jobs (selector generation, crawl, rescan).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiscoveryResult {
    /// Candidate link URLs not yet persisted.
    #[serde(default)]
    pub new_links: Vec<String>,
    /// Link URLs already known to the server.
    #[serde(default)]
    pub existing_links: Vec<String>,
    /// Candidate sources (e.g. discovered sub-categories).
    #[serde(default)]
    pub new_sources: Vec<DiscoveredSource>,
}

/// A source candidate surfaced by a discovery job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredSource {
    pub url: String,
    /// Parent in the source hierarchy, when discovered transitively.
    #[serde(default)]
    pub parent_source_id: Option<SourceId>,
}

/// Result payload of an `edit_content` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditResult {
    pub content: String,
}

/// Fields sent when creating a job. Task-specific parameters travel as an
/// opaque JSON object the server interprets, flattened into the request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub project_id: ProjectId,
    #[serde(flatten, default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl CreateJobRequest {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            params: serde_json::Map::new(),
        }
    }

    pub fn with_params(project_id: ProjectId, params: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { project_id, params }
    }
}

// ============================================================================
// Sources and links
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub last_crawled_at: Option<DateTime<Utc>>,
}

impl Source {
    /// A source has content exactly when it has been crawled at least once.
    pub fn has_content(&self) -> bool {
        self.last_crawled_at.is_some()
    }
}

/// Parent/child relation between two sources. A relation, not an owned
/// entity; consumed only by the hierarchy builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEdge {
    pub parent_source_id: SourceId,
    pub child_source_id: SourceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
}

impl LinkStatus {
    /// Per-item failures inside a completed job are retried selectively, not
    /// surfaced as a job-level failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LinkStatus::Failed | LinkStatus::Skipped)
    }
}

/// Read-only mirror of a server-side link record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub url: String,
    pub status: LinkStatus,
}

// ============================================================================
// Content versions
// ============================================================================

/// One snapshot in a source's version-history timeline, newest first.
/// Immutable once created except for deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentVersion {
    pub id: VersionId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_name_discovery_classification() {
        assert!(TaskName::GenerateSelectors.is_discovery());
        assert!(TaskName::CrawlSources.is_discovery());
        assert!(TaskName::RescanSources.is_discovery());
        assert!(!TaskName::ConfirmLinks.is_discovery());
        assert!(!TaskName::EditContent.is_discovery());
        assert!(TaskName::ConfirmLinks.is_confirmation());
    }

    #[test]
    fn task_name_wire_roundtrip() {
        let json = serde_json::to_string(&TaskName::CrawlSources).unwrap();
        assert_eq!(json, "\"crawl_sources\"");
        let back: TaskName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TaskName::CrawlSources);

        // Unknown categories deserialize as Other rather than failing.
        let other: TaskName = serde_json::from_str("\"summarize_images\"").unwrap();
        assert_eq!(other, TaskName::Other("summarize_images".into()));
        assert_eq!(other.as_str(), "summarize_images");
    }

    #[test]
    fn job_status_classification() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
        assert!(JobStatus::Cancelling.is_active());
        assert!(!JobStatus::Cancelling.is_terminal());
        assert!(JobStatus::Pending.is_active());
    }

    #[test]
    fn cancel_availability() {
        let mut job = sample_job();
        job.status = JobStatus::Pending;
        assert!(job.can_cancel());
        job.status = JobStatus::Cancelling;
        assert!(!job.can_cancel());
        job.status = JobStatus::Canceled;
        assert!(!job.can_cancel());
    }

    #[test]
    fn progress_fraction_handles_zero_total() {
        let p = JobProgress {
            processed_items: 0,
            total_items: 0,
        };
        assert_eq!(p.fraction(), 0.0);
        let p = JobProgress {
            processed_items: 3,
            total_items: 4,
        };
        assert_eq!(p.fraction(), 0.75);
    }

    #[test]
    fn discovery_result_decodes_partial_payload() {
        let mut job = sample_job();
        job.result = Some(serde_json::json!({ "new_links": ["https://a.example/x"] }));
        let result = job.discovery_result().unwrap().unwrap();
        assert_eq!(result.new_links, vec!["https://a.example/x"]);
        assert!(result.existing_links.is_empty());
        assert!(result.new_sources.is_empty());
    }

    fn sample_job() -> Job {
        Job {
            id: JobId::new(),
            project_id: ProjectId::new(),
            task_name: TaskName::CrawlSources,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            progress: None,
            result: None,
            error_message: None,
        }
    }
}
