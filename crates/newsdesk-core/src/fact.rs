//! Facts: atomic claims extracted from a source item.
//!
//! Facts are owned by their source and deleted with it. The fact-indexing
//! stage replaces a source's whole fact set in one transaction, so re-running
//! it never accumulates duplicates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Extracted entities, keyed by entity type (`"org"`, `"number"`, ...).
pub type Entities = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
  pub fact_id:    Uuid,
  pub source_id:  Uuid,
  /// The sentence exactly as it appears in the source.
  pub quote:      String,
  /// Case-folded, punctuation-trimmed claim text.
  pub claim:      Option<String>,
  pub entities:   Entities,
  /// Extraction confidence in `[0, 1]`.
  pub confidence: f64,
}

/// Input to [`crate::store::PipelineStore::replace_facts`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewFact {
  pub quote:      String,
  pub claim:      Option<String>,
  pub entities:   Entities,
  pub confidence: f64,
}
