//! End-to-end lifecycle tests over the in-memory API.
//!
//! Exercises the pull-first contract: every scenario here must pass with the
//! push channel either delivering events or never connecting at all, because
//! polls feed the same registry through the same upsert path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pagemill_core::testing::InMemoryApi;
use pagemill_core::{
    pick_discovery_job, reconcile, CreateJobRequest, JobRegistry, JobStatus, JobTracker,
    JobsApi, LatestJobResolver, StepController, TaskName, WizardStep,
};
use pagemill_core::types::{DiscoveryResult, ProjectId, ProjectStatus};

fn harness() -> (Arc<InMemoryApi>, JobTracker, LatestJobResolver) {
    let api = Arc::new(InMemoryApi::new());
    let registry = Arc::new(JobRegistry::new());
    let tracker = JobTracker::new(api.clone(), registry);
    let resolver = LatestJobResolver::new(api.clone());
    (api, tracker, resolver)
}

#[tokio::test]
async fn crawl_lifecycle_without_push_channel() {
    let (api, tracker, resolver) = harness();
    let project = ProjectId::new();

    // Nothing has run yet: absence, not an error.
    let none = resolver
        .resolve(project, &TaskName::CrawlSources)
        .await
        .unwrap();
    assert!(none.is_none());

    let job = tracker
        .create(&TaskName::CrawlSources, CreateJobRequest::new(project))
        .await
        .unwrap();

    // The server finishes while no push channel exists; a poll catches up.
    api.transition_job(job.id, JobStatus::Completed);
    let jobs = tracker.project_jobs(project).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Completed);

    let latest = resolver
        .resolve(project, &TaskName::CrawlSources)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, job.id);
}

#[tokio::test]
async fn discovery_results_flow_into_reconciliation() {
    let (api, tracker, resolver) = harness();
    let project = ProjectId::new();

    let confirm = tracker
        .create(&TaskName::ConfirmLinks, CreateJobRequest::new(project))
        .await
        .unwrap();
    api.transition_job(confirm.id, JobStatus::Completed);

    // A crawl started after the confirmation turns up two new links.
    let crawl = tracker
        .create(&TaskName::CrawlSources, CreateJobRequest::new(project))
        .await
        .unwrap();
    api.transition_job(crawl.id, JobStatus::Completed);
    // Attach the result the way the server would report it.
    let mut finished = api
        .latest_job(project, &TaskName::CrawlSources)
        .await
        .unwrap();
    finished.result = Some(
        serde_json::to_value(DiscoveryResult {
            new_links: vec!["https://new.example/a".into(), "https://new.example/b".into()],
            existing_links: vec!["https://old.example".into()],
            new_sources: vec![],
        })
        .unwrap(),
    );
    api.seed_job(finished);

    let discovery = resolver
        .resolve(project, &TaskName::CrawlSources)
        .await
        .unwrap();
    let confirmation = resolver
        .resolve(project, &TaskName::ConfirmLinks)
        .await
        .unwrap();

    let picked = pick_discovery_job(discovery.as_ref());
    let outcome = reconcile(
        picked,
        confirmation.as_ref(),
        &HashSet::new(),
        &HashMap::new(),
    );
    assert_eq!(outcome.new_items.len(), 2);
    assert_eq!(outcome.existing_items, vec!["https://old.example"]);
}

#[tokio::test]
async fn wizard_follows_project_status_with_sticky_cursor() {
    let mut controller = StepController::new();

    // Links extracted; user steps back to review search params.
    assert_eq!(
        controller.current(ProjectStatus::LinksExtracted),
        WizardStep::LinkReview
    );
    controller
        .navigate_to(WizardStep::SearchParams, ProjectStatus::LinksExtracted)
        .unwrap();

    // Processing completes; the manual cursor survives the status change.
    controller.sync_status(ProjectStatus::Completed);
    assert_eq!(
        controller.current(ProjectStatus::Completed),
        WizardStep::SearchParams
    );

    // The user moves forward again; now the view follows the status.
    controller
        .navigate_to(WizardStep::Results, ProjectStatus::Completed)
        .unwrap();
    controller.sync_status(ProjectStatus::Completed);
    assert_eq!(
        controller.current(ProjectStatus::Completed),
        WizardStep::Results
    );
}
