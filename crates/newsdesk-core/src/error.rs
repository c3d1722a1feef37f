//! Error taxonomy shared by every pipeline stage.
//!
//! Storage backends convert their own errors into [`Error`] so that the
//! orchestration layer can decide whether a failure is safe to retry without
//! knowing which backend produced it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The entity types held by the work item store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Entity {
  Source,
  Fact,
  Analysis,
  Verification,
  Post,
}

#[derive(Debug, Error)]
pub enum Error {
  /// A referenced entity does not exist. Never retried.
  #[error("{entity} not found: {id}")]
  NotFound { entity: Entity, id: Uuid },

  /// A stage was invoked before its upstream state exists (e.g. build before
  /// verify). Indicates a sequencing bug in the caller; never retried.
  #[error("precondition failed: {0}")]
  PreconditionFailed(String),

  /// The output a stage would create already exists (second verification,
  /// second post for the same analysis, duplicate slug).
  #[error("conflict: {0}")]
  Conflict(String),

  /// Store or network failure. The stage transaction was rolled back and the
  /// invocation is safe to retry.
  #[error("transient i/o failure: {0}")]
  TransientIo(String),

  /// The verifier could not compute a required sub-score. No score is
  /// committed.
  #[error("computation error: {0}")]
  Computation(String),

  /// A stored or wire value failed validation on read.
  #[error("invalid value: {0}")]
  Invalid(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn not_found(entity: Entity, id: Uuid) -> Self { Self::NotFound { entity, id } }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::NotFound { .. } => ErrorKind::NotFound,
      Self::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
      Self::Conflict(_) => ErrorKind::Conflict,
      Self::TransientIo(_) => ErrorKind::TransientIo,
      Self::Computation(_) => ErrorKind::Computation,
      Self::Invalid(_) | Self::Serialization(_) => ErrorKind::Invalid,
    }
  }

  /// Only transient I/O failures may be retried by the orchestration layer.
  pub fn is_retryable(&self) -> bool { self.kind().is_retryable() }
}

/// Serialisable classification of an [`Error`], used wherever a failure has
/// to cross a job or HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
  NotFound,
  PreconditionFailed,
  Conflict,
  TransientIo,
  Computation,
  Invalid,
  /// The worker executing the job crashed and redelivery was exhausted.
  Crashed,
}

impl ErrorKind {
  pub fn is_retryable(self) -> bool { matches!(self, Self::TransientIo | Self::Crashed) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
