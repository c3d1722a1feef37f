//! Stage execution for the newsdesk pipeline.
//!
//! - [`dispatch`]: the task dispatcher, a typed stage registry over a tokio
//!   worker pool with at-least-once delivery.
//! - [`stages`]: the stage handlers and their payload types.
//! - [`orchestrator`]: retry policy and full-run sequencing on top of the
//!   dispatcher.
//! - [`provider`], [`channel`]: the external collaborators stages call out to.

pub mod channel;
pub mod dispatch;
pub mod orchestrator;
pub mod provider;
pub mod render;
pub mod stages;

pub use dispatch::{Dispatcher, DispatcherConfig, JobError, JobHandle, JobSnapshot, Registry, Stage};
pub use orchestrator::{OrchestrationConfig, Orchestrator, RunReport};
pub use stages::{Stages, StoreResultExt};
