//! Error type for `newsdesk-store-sqlite`.

use rusqlite::{ErrorCode, ffi};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rejection raised inside a transaction (missing row, forbidden
  /// transition, duplicate output).
  #[error(transparent)]
  Core(#[from] newsdesk_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which kind of table constraint rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
  /// UNIQUE or PRIMARY KEY: the row already exists.
  Unique,
  /// A referenced row is missing, or a dependent row blocks a delete.
  ForeignKey,
  /// A CHECK expression rejected a column value.
  Check,
  /// NOT NULL, triggers and anything else.
  Other,
}

impl Error {
  /// The constraint that rejected the write, if that is what failed.
  pub fn constraint(&self) -> Option<Constraint> {
    let Self::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))) =
      self
    else {
      return None;
    };
    if e.code != ErrorCode::ConstraintViolation {
      return None;
    }
    Some(match e.extended_code {
      ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Constraint::Unique,
      ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Constraint::ForeignKey,
      ffi::SQLITE_CONSTRAINT_CHECK => Constraint::Check,
      _ => Constraint::Other,
    })
  }
}

impl From<Error> for newsdesk_core::Error {
  fn from(err: Error) -> Self {
    use newsdesk_core::Error as Core;

    match err.constraint() {
      Some(Constraint::Unique) => return Core::Conflict(err.to_string()),
      Some(Constraint::ForeignKey) => return Core::PreconditionFailed(err.to_string()),
      Some(Constraint::Check) => return Core::Invalid(err.to_string()),
      Some(Constraint::Other) | None => {}
    }
    match err {
      Error::Core(e) => e,
      Error::Database(e) => Core::TransientIo(e.to_string()),
      Error::Json(e) => Core::Invalid(format!("stored json: {e}")),
      Error::Uuid(e) => Core::Invalid(format!("stored uuid: {e}")),
      Error::DateParse(e) => Core::Invalid(format!("stored timestamp: {e}")),
    }
  }
}
