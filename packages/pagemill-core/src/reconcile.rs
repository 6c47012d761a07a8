//! Discovery reconciliation: which discovered items are genuinely new.
//!
//! Guards against stale results: a discovery result counts only if its job
//! completed *after* the most recent confirmation job was created. Anything
//! older describes a world the user has already confirmed away, and is
//! silently treated as empty — staleness is not an error.

use std::collections::{HashMap, HashSet};

use crate::latest::latest_of;
use crate::types::{DiscoveredSource, Job, JobStatus, SourceId};

/// Disjoint split of a discovery job's raw result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryOutcome {
    /// Candidate items not yet persisted.
    pub new_items: Vec<String>,
    /// Items the server already knows.
    pub existing_items: Vec<String>,
}

impl DiscoveryOutcome {
    pub fn is_empty(&self) -> bool {
        self.new_items.is_empty() && self.existing_items.is_empty()
    }
}

/// Pick "the" discovery job among completed discovery-class candidates:
/// greatest `created_at` wins (crawl vs rescan tie-break per the same rule).
pub fn pick_discovery_job<'a, I>(candidates: I) -> Option<&'a Job>
where
    I: IntoIterator<Item = &'a Job>,
{
    latest_of(
        candidates
            .into_iter()
            .filter(|job| job.task_name.is_discovery() && job.status == JobStatus::Completed),
    )
}

/// Reconcile the latest discovery result against the latest confirmation.
///
/// Returns empty sets when:
/// - there is no discovery job, or it is not `completed`;
/// - its result fails to decode (logged, treated as absent);
/// - a confirmation job exists and the discovery job is not strictly newer
///   (the stale-result invariant — compared on `created_at`, any statuses).
///
/// Otherwise the job's `new_links`/`existing_links` are taken verbatim, with
/// one exclusion: a discovered source whose ancestor (per `parent_of`) is
/// itself in `selection` is dropped from `new_items`, so a parent and its
/// transitively discovered child are never processed together.
pub fn reconcile(
    discovery: Option<&Job>,
    confirmation: Option<&Job>,
    selection: &HashSet<SourceId>,
    parent_of: &HashMap<SourceId, SourceId>,
) -> DiscoveryOutcome {
    let Some(discovery) = discovery else {
        return DiscoveryOutcome::default();
    };
    if discovery.status != JobStatus::Completed {
        return DiscoveryOutcome::default();
    }
    if let Some(confirmation) = confirmation {
        if discovery.created_at <= confirmation.created_at {
            tracing::debug!(
                discovery_job = %discovery.id,
                confirmation_job = %confirmation.id,
                "Discarding stale discovery result"
            );
            return DiscoveryOutcome::default();
        }
    }

    let result = match discovery.discovery_result() {
        Ok(Some(result)) => result,
        Ok(None) => return DiscoveryOutcome::default(),
        Err(err) => {
            tracing::warn!(job_id = %discovery.id, error = %err, "Malformed discovery result");
            return DiscoveryOutcome::default();
        }
    };

    let excluded: HashSet<&str> = result
        .new_sources
        .iter()
        .filter(|candidate| has_selected_ancestor(candidate, selection, parent_of))
        .map(|candidate| candidate.url.as_str())
        .collect();

    DiscoveryOutcome {
        new_items: result
            .new_links
            .iter()
            .filter(|url| !excluded.contains(url.as_str()))
            .cloned()
            .collect(),
        existing_items: result.existing_links.clone(),
    }
}

/// Walk ancestors of a discovered source; bounded by a visited set so a
/// cyclic edge relation terminates.
fn has_selected_ancestor(
    candidate: &DiscoveredSource,
    selection: &HashSet<SourceId>,
    parent_of: &HashMap<SourceId, SourceId>,
) -> bool {
    let mut visited = HashSet::new();
    let mut current = candidate.parent_source_id;
    while let Some(id) = current {
        if !visited.insert(id) {
            return false;
        }
        if selection.contains(&id) {
            return true;
        }
        current = parent_of.get(&id).copied();
    }
    false
}
