//! Audit log: append-only record of actions taken on a post.
//!
//! Rows are written in the same transaction as the change they describe and
//! are only ever removed by cascade when their post is deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action names recorded in the `action` column.
pub mod action {
  pub const BUILD: &str = "build";
  pub const TRANSITION: &str = "transition";
  pub const DELIVER: &str = "deliver";
  pub const PUBLISH: &str = "publish";
}

/// Actor recorded for writes made by pipeline stages.
pub const SYSTEM_ACTOR: &str = "pipeline";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
  pub audit_id: Uuid,
  pub post_id:  Uuid,
  pub actor:    String,
  pub action:   String,
  pub diff:     serde_json::Value,
  pub at:       DateTime<Utc>,
}

/// An audit row to append; the store assigns the ID and timestamp.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
  pub actor:  String,
  pub action: String,
  pub diff:   serde_json::Value,
}

impl NewAuditEntry {
  pub fn new(actor: impl Into<String>, action: &str, diff: serde_json::Value) -> Self {
    Self { actor: actor.into(), action: action.to_owned(), diff }
  }
}
