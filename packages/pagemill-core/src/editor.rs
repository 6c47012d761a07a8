//! Three-buffer content editing session with AI-proposed edits.
//!
//! Buffers:
//! - **baseline** — last-saved persisted content, the diff reference;
//! - **local** — the user's in-progress edit;
//! - **proposal** — an AI edit job's output, reviewed against `local`.
//!
//! While a proposal is pending review the local buffer is frozen: the user
//! must apply or revert before editing resumes. At most one AI edit job is in
//! flight per session, enforced here rather than left to the UI.

use std::sync::Arc;

use crate::api::VersionsApi;
use crate::error::{CoreError, Result};
use crate::types::{ContentVersion, Job, JobId, JobStatus, SourceId, VersionId};

/// A captured text selection inside the local buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// What the session surface allows right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Local buffer is editable.
    Editing,
    /// A proposal is pending; local is frozen until apply or revert.
    Reviewing,
}

/// Payload for an AI edit job request.
///
/// With a locked selection the edit is scoped: the selection is the target
/// and the full local buffer travels as surrounding context. Without a lock
/// the whole buffer is the target and no separate context is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiEditRequest {
    pub target: String,
    pub context: Option<String>,
}

/// Tracks the single allowed in-flight AI edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    /// Request payload handed out, job id not yet known.
    Requested,
    /// Job created; only its completion is accepted.
    Job(JobId),
}

/// One editing session for a source's content.
pub struct EditSession {
    source_id: SourceId,
    baseline: String,
    local: String,
    proposal: Option<String>,
    selection: Option<Selection>,
    selection_locked: bool,
    in_flight: Option<InFlight>,
    /// Newest first.
    history: Vec<ContentVersion>,
    versions: Arc<dyn VersionsApi>,
}

impl EditSession {
    pub fn new(source_id: SourceId, baseline: String, versions: Arc<dyn VersionsApi>) -> Self {
        let local = baseline.clone();
        Self {
            source_id,
            baseline,
            local,
            proposal: None,
            selection: None,
            selection_locked: false,
            in_flight: None,
            history: Vec::new(),
            versions,
        }
    }

    pub fn mode(&self) -> SessionMode {
        if self.proposal.is_some() {
            SessionMode::Reviewing
        } else {
            SessionMode::Editing
        }
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn proposal(&self) -> Option<&str> {
        self.proposal.as_deref()
    }

    /// Whether the local buffer differs from the saved baseline.
    pub fn is_dirty(&self) -> bool {
        self.local != self.baseline
    }

    // ------------------------------------------------------------------
    // Local buffer
    // ------------------------------------------------------------------

    /// Replace the local buffer. Rejected while a proposal is under review.
    pub fn set_local(&mut self, content: impl Into<String>) -> Result<()> {
        if self.proposal.is_some() {
            return Err(CoreError::ReviewPending);
        }
        self.local = content.into();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Selection lock
    // ------------------------------------------------------------------

    /// Record the editor's current selection. Continuous: every selection
    /// change overwrites the previous value — unless the lock is held, in
    /// which case changes are ignored until unlock.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        if self.selection_locked {
            return;
        }
        self.selection = selection;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn is_selection_locked(&self) -> bool {
        self.selection_locked
    }

    /// Freeze the current selection as the AI edit target.
    pub fn lock_selection(&mut self) -> Result<()> {
        if self.selection.is_none() {
            return Err(CoreError::SelectionMissing);
        }
        self.selection_locked = true;
        Ok(())
    }

    pub fn unlock_selection(&mut self) {
        self.selection_locked = false;
    }

    // ------------------------------------------------------------------
    // AI edit lifecycle
    // ------------------------------------------------------------------

    /// The target/context an AI edit request would carry right now.
    pub fn edit_target(&self) -> AiEditRequest {
        match (&self.selection, self.selection_locked) {
            (Some(selection), true) => AiEditRequest {
                target: selection.text.clone(),
                context: Some(self.local.clone()),
            },
            _ => AiEditRequest {
                target: self.local.clone(),
                context: None,
            },
        }
    }

    /// Start an AI edit. Returns the request payload the caller submits as an
    /// `edit_content` job. A second call while one is active is rejected.
    pub fn begin_ai_edit(&mut self) -> Result<AiEditRequest> {
        if self.in_flight.is_some() {
            return Err(CoreError::EditInFlight);
        }
        if self.proposal.is_some() {
            return Err(CoreError::ReviewPending);
        }
        self.in_flight = Some(InFlight::Requested);
        Ok(self.edit_target())
    }

    /// Record the created job's id so completions can be matched to it.
    pub fn ai_edit_started(&mut self, job_id: JobId) {
        if matches!(self.in_flight, Some(InFlight::Requested)) {
            self.in_flight = Some(InFlight::Job(job_id));
        }
    }

    /// The job creation call failed; release the guard.
    pub fn ai_edit_aborted(&mut self) {
        self.in_flight = None;
    }

    /// Feed a registry update for this session's job. Updates for other jobs
    /// or non-terminal statuses are ignored. A completed job with a usable
    /// result fills the proposal and enters review mode; failed or canceled
    /// jobs just release the guard.
    pub fn on_job_update(&mut self, job: &Job) -> Result<()> {
        let Some(InFlight::Job(expected)) = self.in_flight else {
            return Ok(());
        };
        if job.id != expected || !job.status.is_terminal() {
            return Ok(());
        }

        self.in_flight = None;
        match job.status {
            JobStatus::Completed => {
                let result = job.edit_result()?;
                match result {
                    Some(edit) => {
                        tracing::debug!(job_id = %job.id, "AI edit proposal received");
                        self.proposal = Some(edit.content);
                    }
                    None => {
                        tracing::warn!(job_id = %job.id, "AI edit completed without a result");
                    }
                }
            }
            _ => {
                tracing::debug!(job_id = %job.id, status = ?job.status, "AI edit ended without proposal");
            }
        }
        Ok(())
    }

    pub fn has_edit_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Accept the proposal: copy it into the local buffer and resume editing.
    pub fn apply_proposal(&mut self) {
        if let Some(proposal) = self.proposal.take() {
            self.local = proposal;
        }
    }

    /// Discard the proposal, keeping the local buffer unchanged.
    pub fn revert_proposal(&mut self) {
        self.proposal = None;
    }

    // ------------------------------------------------------------------
    // Version history
    // ------------------------------------------------------------------

    /// Newest-first version timeline as last fetched.
    pub fn history(&self) -> &[ContentVersion] {
        &self.history
    }

    pub async fn load_history(&mut self) -> Result<()> {
        self.history = self.versions.list_versions(self.source_id).await?;
        Ok(())
    }

    /// Commit the local buffer: persist it, make it the new baseline, and
    /// prepend the created version to the timeline.
    pub async fn save(&mut self) -> Result<ContentVersion> {
        let version = self
            .versions
            .save_version(self.source_id, &self.local)
            .await?;
        self.baseline = self.local.clone();
        self.history.insert(0, version.clone());
        tracing::debug!(source_id = %self.source_id, "Saved content version");
        Ok(version)
    }

    /// Restore a historical version. Overwrites the local buffer and
    /// refreshes the baseline from the restored content; no new history
    /// entry is created until the next explicit save.
    pub async fn restore(&mut self, version_id: VersionId) -> Result<()> {
        let restored = self
            .versions
            .restore_version(self.source_id, version_id)
            .await?;
        self.local = restored.content.clone();
        self.baseline = restored.content;
        self.proposal = None;
        Ok(())
    }

    pub async fn delete_version(&mut self, version_id: VersionId) -> Result<()> {
        self.versions
            .delete_version(self.source_id, version_id)
            .await?;
        self.history.retain(|version| version.id != version_id);
        Ok(())
    }

    /// Drop all history except the most recent entry.
    pub async fn clear_except_latest(&mut self) -> Result<()> {
        self.versions
            .clear_versions_except_latest(self.source_id)
            .await?;
        self.history.truncate(1);
        Ok(())
    }
}
