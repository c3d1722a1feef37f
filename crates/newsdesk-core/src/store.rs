//! The `PipelineStore` trait: the work item store every stage reads and
//! writes.
//!
//! The trait is implemented by storage backends (e.g.
//! `newsdesk-store-sqlite`). Stages and the API depend on this abstraction,
//! never on a concrete backend, and receive the store handle explicitly.
//!
//! Every write method is atomic: it either commits all of its rows or none.
//! Precondition checks that guard a write (the analysis exists, no
//! verification exists yet, ...) run inside the same transaction as the
//! write.

use std::{collections::BTreeMap, future::Future};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Topic,
  analysis::{Analysis, NewAnalysis},
  audit::{AuditLog, NewAuditEntry},
  fact::{Fact, NewFact},
  post::{Channel, Delivery, NewPost, Post, PostQuery, PostStatus},
  source::{ContentHashes, NewSource, NormalizedFields, SourceItem},
  verification::{NewVerification, Verification},
};

// ─── Supporting types ────────────────────────────────────────────────────────

/// A previously ingested source considered by the dedupe stage.
#[derive(Debug, Clone)]
pub struct HashCandidate {
  pub source_id:  Uuid,
  pub fetched_at: DateTime<Utc>,
  pub hashes:     ContentHashes,
}

/// Outcome of [`PipelineStore::insert_sources`].
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
  /// Newly stored sources, in input order.
  pub inserted: Vec<SourceItem>,
  /// Inputs whose URL was already stored, or repeated earlier in the batch.
  pub skipped:  usize,
}

/// Row counts over a time window, for the daily report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityCounts {
  pub sources:       u64,
  pub analyses:      u64,
  /// Verification count per status code.
  pub verifications: BTreeMap<String, u64>,
  /// Post count per status code (by creation time).
  pub posts:         BTreeMap<String, u64>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a work item store backend.
///
/// All methods return `Send` futures so the trait can be used from the
/// multi-threaded dispatcher and from `axum` handlers.
pub trait PipelineStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Sources ───────────────────────────────────────────────────────────

  /// Persist a new source. Returns `None` if a source with the same URL
  /// already exists; the existing row is left untouched.
  fn insert_source(
    &self,
    input: NewSource,
  ) -> impl Future<Output = Result<Option<SourceItem>, Self::Error>> + Send + '_;

  /// Persist a batch of sources in one transaction. Known URLs are skipped
  /// as in [`Self::insert_source`]; any other failure rolls back the whole
  /// batch.
  fn insert_sources(
    &self,
    inputs: Vec<NewSource>,
  ) -> impl Future<Output = Result<SourceBatch, Self::Error>> + Send + '_;

  fn get_source(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<SourceItem>, Self::Error>> + Send + '_;

  /// Fetch several sources. Missing IDs are simply absent from the result;
  /// the result follows the order of `ids`.
  fn get_sources<'a>(
    &'a self,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<SourceItem>, Self::Error>> + Send + 'a;

  /// Overwrite the normalised fields of a source and stamp `normalized_at`.
  /// Fails with not-found if the source does not exist.
  fn update_normalized(
    &self,
    id: Uuid,
    fields: NormalizedFields,
  ) -> impl Future<Output = Result<SourceItem, Self::Error>> + Send + '_;

  /// Hashes of the sources in `topic` that were ingested before `before` and
  /// fetched at or after `since`, oldest first.
  fn hash_candidates(
    &self,
    topic: Topic,
    since: DateTime<Utc>,
    before: Uuid,
  ) -> impl Future<Output = Result<Vec<HashCandidate>, Self::Error>> + Send + '_;

  /// Delete a source and (by cascade) its facts. Returns `false` if absent.
  fn delete_source(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Facts ─────────────────────────────────────────────────────────────

  /// Atomically replace every fact of `source_id` with `facts`.
  fn replace_facts(
    &self,
    source_id: Uuid,
    facts: Vec<NewFact>,
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send + '_;

  fn facts_for_sources<'a>(
    &'a self,
    source_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send + 'a;

  // ── Analyses ──────────────────────────────────────────────────────────

  /// Persist an analysis. Fails with not-found if any source ID is unknown.
  fn insert_analysis(
    &self,
    input: NewAnalysis,
  ) -> impl Future<Output = Result<Analysis, Self::Error>> + Send + '_;

  fn get_analysis(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Analysis>, Self::Error>> + Send + '_;

  /// Delete an analysis and (by cascade) its verification.
  fn delete_analysis(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Verifications ─────────────────────────────────────────────────────

  /// Persist the single verification of an analysis. Fails with not-found if
  /// the analysis is missing and with conflict if it is already verified.
  fn insert_verification(
    &self,
    input: NewVerification,
  ) -> impl Future<Output = Result<Verification, Self::Error>> + Send + '_;

  fn get_verification(
    &self,
    analysis_id: Uuid,
  ) -> impl Future<Output = Result<Option<Verification>, Self::Error>> + Send + '_;

  // ── Posts ─────────────────────────────────────────────────────────────

  /// Persist a draft post together with its first audit entry. Fails with
  /// conflict if the analysis already has a post or the slug is taken.
  fn insert_post(
    &self,
    input: NewPost,
    audit: NewAuditEntry,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  fn get_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  fn get_post_for_analysis(
    &self,
    analysis_id: Uuid,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  /// Posts matching `query`, newest first.
  fn list_posts<'a>(
    &'a self,
    query: &'a PostQuery,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + 'a;

  /// Move a post to `next` and append a `transition` audit row attributed to
  /// `actor`. Fails with precondition-failed if the editorial workflow
  /// forbids the transition.
  fn transition_post(
    &self,
    id: Uuid,
    next: PostStatus,
    actor: String,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  /// Mark a post published, record `deliveries` in the audit log and set
  /// `cms_id` from a CMS delivery if one is present. Publishing an already
  /// published post only appends the new deliveries.
  fn record_publication(
    &self,
    id: Uuid,
    deliveries: Vec<Delivery>,
    actor: String,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  /// Channels that already received this post.
  fn delivered_channels(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<Channel>, Self::Error>> + Send + '_;

  /// The audit trail of a post, oldest first.
  fn audit_log(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AuditLog>, Self::Error>> + Send + '_;

  /// Delete a post and (by cascade) its audit log.
  fn delete_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Reporting ─────────────────────────────────────────────────────────

  fn activity_since(
    &self,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<ActivityCounts, Self::Error>> + Send + '_;
}
