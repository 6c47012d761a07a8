//! Push subscriber: drives one server event channel per project.
//!
//! Push delivery is a latency optimization, never a correctness input. Every
//! event is folded into the registry the same way a pull would be; if the
//! channel dies the subscriber parks in `Error` and the owner decides when to
//! re-subscribe (typically on project change or remount). The core stays
//! correct if this task never receives a single event.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::api::PushChannel;
use crate::registry::{JobRegistry, UpsertOutcome};
use crate::types::{Job, JobId, JobStatus, ProjectId, TaskName};

/// Lifecycle of a push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Connected,
    /// Server closed the stream normally.
    Disconnected,
    /// The stream failed. No auto-reconnect; owners re-subscribe.
    Error,
}

/// A job reached a terminal state worth telling the user about.
///
/// What the notification looks like is a UI concern; this carries the
/// contract-bearing fields only.
#[derive(Debug, Clone)]
pub struct JobNotice {
    pub project_id: ProjectId,
    pub job_id: JobId,
    pub task_name: TaskName,
    pub status: JobStatus,
    pub error_message: Option<String>,
}

/// Handle to a running per-project subscription task.
pub struct PushSubscriber {
    state: watch::Receiver<ChannelState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PushSubscriber {
    /// Open a channel for `project_id` and start folding its events into the
    /// registry. Terminal `completed`/`failed` updates are forwarded on
    /// `notices`.
    pub fn spawn(
        channel: Arc<dyn PushChannel>,
        registry: Arc<JobRegistry>,
        project_id: ProjectId,
        notices: mpsc::Sender<JobNotice>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_subscription(
            channel,
            registry,
            project_id,
            notices,
            state_tx,
            shutdown_rx,
        ));

        Self {
            state: state_rx,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Watch for state transitions (e.g. to show a "live" indicator).
    pub fn state_watch(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Close the channel. Idempotent; dropping the subscriber also closes it.
    pub fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for PushSubscriber {
    fn drop(&mut self) {
        self.close();
        self.task.abort();
    }
}

async fn run_subscription(
    channel: Arc<dyn PushChannel>,
    registry: Arc<JobRegistry>,
    project_id: ProjectId,
    notices: mpsc::Sender<JobNotice>,
    state: watch::Sender<ChannelState>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut stream = match channel.subscribe(project_id).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(%project_id, error = %err, "Push channel failed to connect");
            let _ = state.send(ChannelState::Error);
            return;
        }
    };
    let _ = state.send(ChannelState::Connected);
    tracing::debug!(%project_id, "Push channel connected");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = state.send(ChannelState::Disconnected);
                tracing::debug!(%project_id, "Push channel closed by owner");
                return;
            }
            item = stream.next() => match item {
                Some(Ok(job)) => handle_update(&registry, project_id, job, &notices).await,
                Some(Err(err)) => {
                    // Degrade to pull-only. Never a hard failure of the core.
                    tracing::warn!(%project_id, error = %err, "Push channel errored");
                    let _ = state.send(ChannelState::Error);
                    return;
                }
                None => {
                    let _ = state.send(ChannelState::Disconnected);
                    tracing::debug!(%project_id, "Push channel ended");
                    return;
                }
            }
        }
    }
}

async fn handle_update(
    registry: &JobRegistry,
    project_id: ProjectId,
    job: Job,
    notices: &mpsc::Sender<JobNotice>,
) {
    tracing::debug!(job_id = %job.id, status = ?job.status, "Push update received");

    let notice = match job.status {
        JobStatus::Completed | JobStatus::Failed => Some(JobNotice {
            project_id: job.project_id,
            job_id: job.id,
            task_name: job.task_name.clone(),
            status: job.status,
            error_message: job.error_message.clone(),
        }),
        _ => None,
    };

    if registry.upsert(job) == UpsertOutcome::StaleIgnored {
        return;
    }

    // Project status and job lists derive from this job; force re-fetch.
    registry.invalidate(project_id);

    if let Some(notice) = notice {
        if notices.send(notice).await.is_err() {
            tracing::debug!(%project_id, "Notice receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use futures::stream;

    use super::*;
    use crate::api::{ApiError, ApiResult, JobUpdateStream};
    use crate::registry::RegistryEvent;
    use crate::types::Job;

    struct ScriptedChannel {
        items: std::sync::Mutex<Option<Vec<ApiResult<Job>>>>,
    }

    impl ScriptedChannel {
        fn new(items: Vec<ApiResult<Job>>) -> Arc<Self> {
            Arc::new(Self {
                items: std::sync::Mutex::new(Some(items)),
            })
        }
    }

    #[async_trait]
    impl PushChannel for ScriptedChannel {
        async fn subscribe(&self, _project_id: ProjectId) -> ApiResult<JobUpdateStream> {
            match self.items.lock().unwrap().take() {
                Some(items) => Ok(stream::iter(items).boxed()),
                None => Err(ApiError::Transport("already subscribed".into())),
            }
        }
    }

    fn job(project_id: ProjectId, status: JobStatus) -> Job {
        Job {
            id: JobId::new(),
            project_id,
            task_name: TaskName::CrawlSources,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            progress: None,
            result: None,
            error_message: None,
        }
    }

    async fn wait_for_state(sub: &PushSubscriber, expected: ChannelState) {
        let mut watch = sub.state_watch();
        for _ in 0..50 {
            if *watch.borrow() == expected {
                return;
            }
            let _ = tokio::time::timeout(std::time::Duration::from_millis(20), watch.changed())
                .await;
        }
        panic!("state never reached {expected:?}, last was {:?}", sub.state());
    }

    #[tokio::test]
    async fn events_are_upserted_and_invalidate_project() {
        let registry = Arc::new(JobRegistry::new());
        let project = ProjectId::new();
        let update = job(project, JobStatus::InProgress);
        let channel = ScriptedChannel::new(vec![Ok(update.clone())]);
        let (tx, _rx) = mpsc::channel(8);

        let sub = PushSubscriber::spawn(channel, registry.clone(), project, tx);
        wait_for_state(&sub, ChannelState::Disconnected).await;

        assert_eq!(registry.get(update.id).unwrap().status, JobStatus::InProgress);
        assert!(registry.is_stale(project));
    }

    #[tokio::test]
    async fn terminal_updates_emit_notices() {
        let registry = Arc::new(JobRegistry::new());
        let project = ProjectId::new();
        let mut failed = job(project, JobStatus::Failed);
        failed.error_message = Some("selector timeout".into());
        let channel = ScriptedChannel::new(vec![
            Ok(job(project, JobStatus::InProgress)),
            Ok(failed.clone()),
            Ok(job(project, JobStatus::Completed)),
        ]);
        let (tx, mut rx) = mpsc::channel(8);

        let sub = PushSubscriber::spawn(channel, registry, project, tx);
        wait_for_state(&sub, ChannelState::Disconnected).await;

        // In-progress update did not qualify; the two terminal ones did.
        let first = rx.recv().await.unwrap();
        assert_eq!(first.status, JobStatus::Failed);
        assert_eq!(first.error_message.as_deref(), Some("selector timeout"));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.status, JobStatus::Completed);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stream_error_degrades_to_error_state() {
        let registry = Arc::new(JobRegistry::new());
        let project = ProjectId::new();
        let update = job(project, JobStatus::InProgress);
        let channel = ScriptedChannel::new(vec![
            Ok(update.clone()),
            Err(ApiError::Transport("connection reset".into())),
        ]);
        let (tx, _rx) = mpsc::channel(8);

        let sub = PushSubscriber::spawn(channel, registry.clone(), project, tx);
        wait_for_state(&sub, ChannelState::Error).await;

        // The event before the failure still landed.
        assert!(registry.get(update.id).is_some());
    }

    #[tokio::test]
    async fn connect_failure_is_error_not_panic() {
        let channel = ScriptedChannel::new(vec![]);
        let project = ProjectId::new();
        // First subscription consumes the script; spawn against a drained one.
        let _ = channel.subscribe(project).await;
        let (tx, _rx) = mpsc::channel(8);

        let sub = PushSubscriber::spawn(channel, Arc::new(JobRegistry::new()), project, tx);
        wait_for_state(&sub, ChannelState::Error).await;
    }

    #[tokio::test]
    async fn registry_subscribers_see_push_traffic() {
        let registry = Arc::new(JobRegistry::new());
        let mut events = registry.subscribe();
        let project = ProjectId::new();
        let channel = ScriptedChannel::new(vec![Ok(job(project, JobStatus::Completed))]);
        let (tx, _rx) = mpsc::channel(8);

        let sub = PushSubscriber::spawn(channel, registry, project, tx);
        wait_for_state(&sub, ChannelState::Disconnected).await;

        assert!(matches!(
            events.recv().await.unwrap(),
            RegistryEvent::JobUpserted { .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            RegistryEvent::ProjectInvalidated { .. }
        ));
    }
}
