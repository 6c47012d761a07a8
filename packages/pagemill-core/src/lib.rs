//! # Pagemill core
//!
//! Client-resident coordination for server-executed jobs (crawling, AI
//! generation, content editing) across a multi-step, resumable project
//! workflow.
//!
//! Built pull-first: the [`registry::JobRegistry`] is the single source of
//! truth, on-demand pulls are the correctness backstop, and the push channel
//! is a latency optimization that may never deliver a single event.

pub mod api;
pub mod editor;
pub mod error;
pub mod hierarchy;
pub mod latest;
pub mod push;
pub mod reconcile;
pub mod registry;
pub mod tracker;
pub mod types;
pub mod workflow;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports for clean API
pub use api::{ApiError, JobsApi, PushChannel, SourcesApi, VersionsApi};
pub use editor::{AiEditRequest, EditSession, Selection, SessionMode};
pub use error::{CoreError, Result};
pub use hierarchy::{build_forest, parent_index, SourceNode};
pub use latest::{latest_of, LatestJobResolver};
pub use push::{ChannelState, JobNotice, PushSubscriber};
pub use reconcile::{pick_discovery_job, reconcile, DiscoveryOutcome};
pub use registry::{JobRegistry, RegistryEvent, UpsertOutcome};
pub use tracker::JobTracker;
pub use types::*;
pub use workflow::{NavigationError, StepController, WizardStep};
