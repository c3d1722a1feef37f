//! Source items: raw articles entering the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Topic;

// ─── Hashes ──────────────────────────────────────────────────────────────────

/// Content fingerprints used by the dedupe stage. Populated at ingest and
/// recomputed by normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHashes {
  /// SHA-256 hex of the case-folded, whitespace-collapsed title.
  pub title:   String,
  /// SHA-256 hex of the case-folded, whitespace-collapsed body.
  pub content: String,
  /// 64-bit simhash over word 3-shingles, hex encoded.
  pub simhash: String,
}

// ─── SourceItem ──────────────────────────────────────────────────────────────

/// An ingested article. `url` is unique across the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceItem {
  pub source_id:    Uuid,
  pub topic:        Topic,
  pub url:          String,
  pub domain:       Option<String>,
  pub title:        String,
  pub excerpt:      Option<String>,
  pub content:      Option<String>,
  pub published_at: Option<DateTime<Utc>>,
  pub event_at:     Option<DateTime<Utc>>,
  pub language:     Option<String>,
  pub author:       Option<String>,
  pub fetched_at:   DateTime<Utc>,
  pub hashes:       Option<ContentHashes>,
  /// Set once the normalize stage has committed.
  pub normalized_at: Option<DateTime<Utc>>,
}

/// An article as returned by the research provider, before it is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
  pub url:          String,
  pub title:        String,
  #[serde(default)]
  pub excerpt:      Option<String>,
  #[serde(default)]
  pub content:      Option<String>,
  #[serde(default)]
  pub published_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub event_at:     Option<DateTime<Utc>>,
  #[serde(default)]
  pub language:     Option<String>,
  #[serde(default)]
  pub author:       Option<String>,
}

/// Input to [`crate::store::PipelineStore::insert_source`].
/// `source_id` and `fetched_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewSource {
  pub topic:        Topic,
  pub url:          String,
  pub domain:       Option<String>,
  pub title:        String,
  pub excerpt:      Option<String>,
  pub content:      Option<String>,
  pub published_at: Option<DateTime<Utc>>,
  pub event_at:     Option<DateTime<Utc>>,
  pub language:     Option<String>,
  pub author:       Option<String>,
  pub hashes:       ContentHashes,
}

/// Fields rewritten by the normalize stage.
#[derive(Debug, Clone)]
pub struct NormalizedFields {
  pub domain:   Option<String>,
  pub title:    String,
  pub excerpt:  Option<String>,
  pub content:  Option<String>,
  pub language: Option<String>,
  pub hashes:   ContentHashes,
}
