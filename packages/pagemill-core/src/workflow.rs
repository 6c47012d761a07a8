//! Wizard step derivation and sticky backward navigation.
//!
//! Two pieces of state, combined by an explicit precedence rule:
//! - the *implied* step, a pure function of the persisted project status;
//! - the *cursor*, a client-persisted override the user sets by navigating
//!   backward to inspect completed steps.
//!
//! The cursor never exceeds the implied step and never blocks the status from
//! advancing; it is sticky until the user acts again.

use serde::{Deserialize, Serialize};

use crate::types::ProjectStatus;

/// One step of the project wizard, in fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    /// Project setup and search intent.
    Setup,
    /// Generated search parameters review.
    SearchParams,
    /// Selector and source configuration.
    SourceSelection,
    /// Extracted link review and confirmation.
    LinkReview,
    /// Processing output and final content.
    Results,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::Setup,
        WizardStep::SearchParams,
        WizardStep::SourceSelection,
        WizardStep::LinkReview,
        WizardStep::Results,
    ];

    /// Zero-based index used for URL persistence and ordering.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The step a project's persisted status puts it on.
    ///
    /// `LinksExtracted`, `Processing` and `Failed` all land on link review:
    /// a failed run is re-issued from there, not from scratch.
    pub fn for_status(status: ProjectStatus) -> Self {
        match status {
            ProjectStatus::Draft => WizardStep::Setup,
            ProjectStatus::SearchParamsGenerated => WizardStep::SearchParams,
            ProjectStatus::SourcesConfigured => WizardStep::SourceSelection,
            ProjectStatus::LinksExtracted | ProjectStatus::Processing | ProjectStatus::Failed => {
                WizardStep::LinkReview
            }
            ProjectStatus::Completed => WizardStep::Results,
        }
    }
}

/// Navigation failures, reported to the caller rather than silently fixed up
/// so the UI can decide whether to ignore or explain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationError {
    /// Forward navigation beyond what the project status has reached.
    NotYetReachable,
}

/// Combines the status-implied step with the user's sticky cursor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepController {
    /// Backward-navigation override; `None` means "follow the status".
    cursor: Option<WizardStep>,
}

impl StepController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted cursor value (e.g. a URL query parameter).
    /// Out-of-range indices are treated as no cursor.
    pub fn from_persisted(index: Option<usize>) -> Self {
        Self {
            cursor: index.and_then(WizardStep::from_index),
        }
    }

    /// The step to render for the given status.
    pub fn current(&self, status: ProjectStatus) -> WizardStep {
        let implied = WizardStep::for_status(status);
        match self.cursor {
            Some(cursor) if cursor <= implied => cursor,
            _ => implied,
        }
    }

    /// User-driven navigation. Only steps at or before the implied step are
    /// reachable; forward jumps are rejected.
    pub fn navigate_to(
        &mut self,
        step: WizardStep,
        status: ProjectStatus,
    ) -> Result<(), NavigationError> {
        if step > WizardStep::for_status(status) {
            return Err(NavigationError::NotYetReachable);
        }
        self.cursor = Some(step);
        Ok(())
    }

    /// Called after a project refetch changes the status. Recomputes nothing
    /// eagerly — the cursor stays where the user put it — but drops a cursor
    /// that now exactly matches the implied step so future status advances
    /// move the view again.
    pub fn sync_status(&mut self, status: ProjectStatus) {
        if self.cursor == Some(WizardStep::for_status(status)) {
            self.cursor = None;
        }
    }

    /// Cursor value to persist, if the user has navigated away.
    pub fn persisted(&self) -> Option<usize> {
        self.cursor.map(|step| step.index())
    }

    /// Steps the user may navigate to under the given status.
    pub fn reachable(status: ProjectStatus) -> Vec<WizardStep> {
        let implied = WizardStep::for_status(status);
        WizardStep::ALL
            .into_iter()
            .filter(|step| *step <= implied)
            .collect()
    }
}
