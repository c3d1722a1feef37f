use newsdesk_core::ErrorKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::Stage;

/// Errors raised while building or talking to the dispatcher itself.
#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("no handler registered for stage {0}")]
  MissingHandler(Stage),

  #[error("dispatcher needs at least one worker")]
  NoWorkers,

  #[error("dispatcher queue is closed")]
  Closed,

  #[error("could not encode job payload: {0}")]
  Payload(#[source] serde_json::Error),
}

/// Why a job ended in failure. Serialisable so it can be reported through the
/// job status endpoint unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct JobFailure {
  pub kind:    ErrorKind,
  pub message: String,
}

impl JobFailure {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self { kind, message: message.into() }
  }

  pub fn is_retryable(&self) -> bool { self.kind.is_retryable() }
}

impl From<newsdesk_core::Error> for JobFailure {
  fn from(err: newsdesk_core::Error) -> Self { Self::new(err.kind(), err.to_string()) }
}

/// Errors returned while waiting on a [`super::JobHandle`].
#[derive(Debug, Error)]
pub enum JobError {
  /// The stage handler reported a failure, or the job crashed too often.
  #[error("job failed: {0}")]
  Failed(JobFailure),

  /// The job did not finish in time. It keeps running.
  #[error("job {0} did not finish in time")]
  Timeout(Uuid),

  /// The dispatcher shut down before the job finished.
  #[error("job {0} was lost: dispatcher shut down")]
  Lost(Uuid),

  #[error("could not decode job output: {0}")]
  Decode(#[source] serde_json::Error),

  #[error(transparent)]
  Dispatch(#[from] DispatchError),
}

impl JobError {
  /// Kind of the underlying failure, if the handler reported one.
  pub fn failure_kind(&self) -> Option<ErrorKind> {
    match self {
      Self::Failed(f) => Some(f.kind),
      _ => None,
    }
  }
}
