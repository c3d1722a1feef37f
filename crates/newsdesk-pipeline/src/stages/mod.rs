//! Stage handlers.
//!
//! Every stage is a method on [`Stages`], which carries the store handle and
//! the collaborators explicitly. Each one checks its preconditions against
//! committed state, then performs its writes through a single atomic store
//! call, so a failure never leaves a partial result behind.

mod analysis;
mod post;
mod sources;

use std::{sync::Arc, time::Duration};

use newsdesk_core::{
  Error, Result, Topic,
  analysis::Analysis,
  dedupe::{DedupeConfig, Verdict},
  post::{Channel, PublishOutcome},
  source::SourceItem,
  store::PipelineStore,
  verification::Verification,
  verify::Verifier,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  channel::ChannelSet,
  dispatch::{Registry, Stage, StageDef},
  provider::{Analyst, ResearchProvider},
};

/// Converts a backend error into the shared taxonomy.
pub trait StoreResultExt<T> {
  fn db(self) -> Result<T>;
}

impl<T, E: Into<Error>> StoreResultExt<T> for std::result::Result<T, E> {
  fn db(self) -> Result<T> { self.map_err(Into::into) }
}

// ─── Payloads ────────────────────────────────────────────────────────────────

pub const MIN_WINDOW_HOURS: u32 = 1;
pub const MAX_WINDOW_HOURS: u32 = 48;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestInput {
  pub topic:        Topic,
  pub window_hours: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestOutput {
  /// Newly stored sources, in provider order.
  pub source_ids:       Vec<Uuid>,
  /// Items whose URL was already stored.
  pub skipped_existing: usize,
  /// Items dropped for lacking a URL or title.
  pub rejected:         usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceRef {
  pub source_id: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndexOutput {
  pub source_id: Uuid,
  pub facts:     usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeInput {
  pub topic:      Topic,
  pub source_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalysisRef {
  pub analysis_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRef {
  pub post_id: Uuid,
  pub slug:    String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishInput {
  pub post_id:  Uuid,
  pub channels: Vec<Channel>,
  /// Recorded in the audit log; defaults to the pipeline actor.
  #[serde(default)]
  pub actor:    Option<String>,
}

// ─── Stage markers ───────────────────────────────────────────────────────────

macro_rules! stage {
  ($(#[$doc:meta])* $name:ident, $stage:ident, $input:ty => $output:ty) => {
    $(#[$doc])*
    pub struct $name;

    impl StageDef for $name {
      const STAGE: Stage = Stage::$stage;
      type Input = $input;
      type Output = $output;
    }
  };
}

stage!(
  /// Fetch items for a topic and store the new ones.
  Ingest, Ingest, IngestInput => IngestOutput
);
stage!(
  /// Clean a source and recompute its hashes.
  Normalize, Normalize, SourceRef => SourceItem
);
stage!(
  /// Compare a source against earlier ones. Never writes.
  Dedupe, Dedupe, SourceRef => Verdict
);
stage!(
  /// Replace the facts extracted from a normalised source.
  IndexFacts, IndexFacts, SourceRef => IndexOutput
);
stage!(
  /// Synthesise an analysis over a set of sources.
  Analyze, Analyze, AnalyzeInput => AnalysisRef
);
stage!(
  /// Score an analysis and record its single verification.
  Verify, Verify, AnalysisRef => Verification
);
stage!(
  /// Render the draft post of a verified analysis.
  Build, Build, AnalysisRef => PostRef
);
stage!(
  /// Deliver a post to channels and mark it published.
  Publish, Publish, PublishInput => PublishOutcome
);

// ─── Context ─────────────────────────────────────────────────────────────────

/// Everything the stage handlers need, passed explicitly.
pub struct Stages<S> {
  pub store:           Arc<S>,
  pub research:        Arc<dyn ResearchProvider>,
  pub analyst:         Arc<dyn Analyst>,
  pub channels:        ChannelSet,
  pub verifier:        Verifier,
  pub dedupe:          DedupeConfig,
  /// Upper bound on facts kept per source.
  pub max_facts:       usize,
  /// Public base URL posts are linked under.
  pub site_url:        String,
  /// Upper bound on a single channel delivery.
  pub channel_timeout: Duration,
}

pub const DEFAULT_MAX_FACTS: usize = 20;

impl<S: PipelineStore + 'static> Stages<S> {
  /// Stage context with offline collaborators, no channels and default
  /// tunables.
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      research: Arc::new(crate::provider::OfflineResearch),
      analyst: Arc::new(crate::provider::OfflineAnalyst),
      channels: ChannelSet::new(),
      verifier: Verifier::default(),
      dedupe: DedupeConfig::default(),
      max_facts: DEFAULT_MAX_FACTS,
      site_url: "https://example.com".to_owned(),
      channel_timeout: Duration::from_secs(10),
    }
  }

  pub(crate) async fn require_source(&self, id: Uuid) -> Result<SourceItem> {
    self
      .store
      .get_source(id)
      .await
      .db()?
      .ok_or_else(|| Error::not_found(newsdesk_core::Entity::Source, id))
  }

  pub(crate) async fn require_analysis(&self, id: Uuid) -> Result<Analysis> {
    self
      .store
      .get_analysis(id)
      .await
      .db()?
      .ok_or_else(|| Error::not_found(newsdesk_core::Entity::Analysis, id))
  }
}

macro_rules! route {
  ($registry:ident, $stages:ident, $marker:ty, $method:ident) => {{
    let stages = $stages.clone();
    $registry.register::<$marker, _, _>(move |input| {
      let stages = stages.clone();
      async move { stages.$method(input).await }
    });
  }};
}

/// A registry with every stage routed to `stages`.
pub fn registry<S: PipelineStore + 'static>(stages: Arc<Stages<S>>) -> Registry {
  let mut registry = Registry::new();
  route!(registry, stages, Ingest, ingest);
  route!(registry, stages, Normalize, normalize);
  route!(registry, stages, Dedupe, dedupe);
  route!(registry, stages, IndexFacts, index_facts);
  route!(registry, stages, Analyze, analyze);
  route!(registry, stages, Verify, verify);
  route!(registry, stages, Build, build);
  route!(registry, stages, Publish, publish);
  registry
}

#[cfg(test)]
mod tests;
