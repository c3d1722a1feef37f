//! Orchestration layer: retry policy and cross-stage sequencing.
//!
//! The dispatcher runs single jobs; the orchestrator decides what runs next.
//! Retryable failures (transient I/O, crashed workers) are re-enqueued with
//! linear backoff up to `max_attempts`. Everything else surfaces at once.
//! Jobs touching the same entity are awaited one after another, never
//! enqueued concurrently.

use std::{sync::Arc, time::Duration};

use newsdesk_core::{
  Entity, Error, ErrorKind, Topic,
  dedupe::Verdict,
  post::{Channel, PublishOutcome},
  store::PipelineStore,
  verification::Verification,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  dispatch::{Dispatcher, JobError, JobFailure, StageDef},
  stages::{
    Analyze, AnalysisRef, AnalyzeInput, Build, Dedupe, IndexFacts, Ingest, IngestInput,
    IngestOutput, Normalize, PostRef, Publish, PublishInput, SourceRef, StoreResultExt as _,
    Verify,
  },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
  /// Total tries for a stage whose failure is retryable.
  pub max_attempts:         u32,
  /// Delay before retry `n` is `n * backoff_ms`.
  pub backoff_ms:           u64,
  /// Wait bound for one stage job during a pipeline run.
  pub stage_timeout_secs:   u64,
  /// Wait bound for synchronous API calls.
  pub sync_timeout_secs:    u64,
  /// Wait bound for a publish call, which fans out to every channel.
  pub publish_timeout_secs: u64,
}

impl Default for OrchestrationConfig {
  fn default() -> Self {
    Self {
      max_attempts:         3,
      backoff_ms:           500,
      stage_timeout_secs:   60,
      sync_timeout_secs:    30,
      publish_timeout_secs: 60,
    }
  }
}

impl OrchestrationConfig {
  pub fn stage_timeout(&self) -> Duration { Duration::from_secs(self.stage_timeout_secs) }

  pub fn sync_timeout(&self) -> Duration { Duration::from_secs(self.sync_timeout_secs) }

  pub fn publish_timeout(&self) -> Duration { Duration::from_secs(self.publish_timeout_secs) }
}

/// Outcome of processing one ingested source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReport {
  pub source_id: Uuid,
  pub verdict:   Verdict,
  /// Facts indexed; absent for duplicates, which skip indexing.
  pub facts:     Option<usize>,
}

/// Everything a full topic run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
  pub topic:        Topic,
  pub ingest:       IngestOutput,
  pub sources:      Vec<SourceReport>,
  pub analysis_id:  Option<Uuid>,
  pub verification: Option<Verification>,
  pub post:         Option<PostRef>,
  pub publish:      Option<PublishOutcome>,
}

fn store_failure(err: impl Into<Error>) -> JobError { JobError::Failed(JobFailure::from(err.into())) }

fn is_conflict(err: &JobError) -> bool { err.failure_kind() == Some(ErrorKind::Conflict) }

pub struct Orchestrator<S> {
  dispatcher: Dispatcher,
  store:      Arc<S>,
  config:     OrchestrationConfig,
}

impl<S> Clone for Orchestrator<S> {
  fn clone(&self) -> Self {
    Self {
      dispatcher: self.dispatcher.clone(),
      store:      self.store.clone(),
      config:     self.config.clone(),
    }
  }
}

impl<S: PipelineStore + 'static> Orchestrator<S> {
  pub fn new(dispatcher: Dispatcher, store: Arc<S>, config: OrchestrationConfig) -> Self {
    Self { dispatcher, store, config }
  }

  pub fn dispatcher(&self) -> &Dispatcher { &self.dispatcher }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn config(&self) -> &OrchestrationConfig { &self.config }

  /// Run one stage with the configured stage timeout and retry policy.
  pub async fn run_stage<D>(&self, input: D::Input) -> Result<D::Output, JobError>
  where
    D: StageDef,
    D::Input: Clone,
  {
    self.run_stage_with::<D>(input, self.config.stage_timeout()).await
  }

  /// Run one stage, waiting at most `timeout` for the whole call, retries
  /// and backoff included. A timeout is returned as is: the job may still
  /// complete, so it is not retried here. A retry that could not start
  /// before the deadline is skipped and the last failure returned.
  pub async fn run_stage_with<D>(
    &self,
    input: D::Input,
    timeout: Duration,
  ) -> Result<D::Output, JobError>
  where
    D: StageDef,
    D::Input: Clone,
  {
    let deadline = Instant::now() + timeout;
    let mut attempt = 1;
    loop {
      let mut handle = self.dispatcher.enqueue::<D>(input.clone()).await?;
      let remaining = deadline.saturating_duration_since(Instant::now());
      match handle.await_result(remaining).await {
        Err(JobError::Failed(failure))
          if failure.is_retryable() && attempt < self.config.max_attempts =>
        {
          let delay = Duration::from_millis(self.config.backoff_ms * u64::from(attempt));
          if Instant::now() + delay >= deadline {
            warn!(
              stage = %D::STAGE,
              job_id = %handle.job_id(),
              attempt,
              %failure,
              "no time left to retry stage"
            );
            return Err(JobError::Failed(failure));
          }
          warn!(
            stage = %D::STAGE,
            job_id = %handle.job_id(),
            attempt,
            ?delay,
            %failure,
            "retrying stage"
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        other => return other,
      }
    }
  }

  /// normalize → dedupe → index_facts, stopping after dedupe for duplicates.
  pub async fn process_source(&self, source_id: Uuid) -> Result<SourceReport, JobError> {
    let source = SourceRef { source_id };
    self.run_stage::<Normalize>(source).await?;
    let verdict = self.run_stage::<Dedupe>(source).await?;
    let facts = if verdict.is_duplicate() {
      None
    } else {
      Some(self.run_stage::<IndexFacts>(source).await?.facts)
    };
    Ok(SourceReport { source_id, verdict, facts })
  }

  /// Verify, treating an existing verification as already done.
  pub async fn verify(&self, analysis: AnalysisRef) -> Result<Verification, JobError> {
    match self.run_stage::<Verify>(analysis).await {
      Err(err) if is_conflict(&err) => self
        .store
        .get_verification(analysis.analysis_id)
        .await
        .db()
        .map_err(store_failure)?
        .ok_or_else(|| store_failure(Error::not_found(Entity::Verification, analysis.analysis_id))),
      other => other,
    }
  }

  /// Build, treating an existing post for the analysis as already done.
  pub async fn build(&self, analysis: AnalysisRef) -> Result<PostRef, JobError> {
    match self.run_stage::<Build>(analysis).await {
      Err(err) if is_conflict(&err) => {
        let post = self
          .store
          .get_post_for_analysis(analysis.analysis_id)
          .await
          .db()
          .map_err(store_failure)?;
        // A conflict on the slug alone leaves no post for this analysis.
        post.map(|p| PostRef { post_id: p.post_id, slug: p.slug }).ok_or(err)
      }
      other => other,
    }
  }

  pub async fn publish(&self, input: PublishInput) -> Result<PublishOutcome, JobError> {
    self
      .run_stage_with::<Publish>(input, self.config.publish_timeout())
      .await
  }

  /// ingest → per source (normalize → dedupe → index_facts) → analyze over
  /// the unique sources → verify → build → publish when channels are given.
  /// Stops before analyze if nothing new and unique was ingested.
  pub async fn run_topic(
    &self,
    topic: Topic,
    window_hours: u32,
    channels: Vec<Channel>,
  ) -> Result<RunReport, JobError> {
    let ingest = self.run_stage::<Ingest>(IngestInput { topic, window_hours }).await?;
    let mut report = RunReport {
      topic,
      ingest: ingest.clone(),
      sources: Vec::with_capacity(ingest.source_ids.len()),
      analysis_id: None,
      verification: None,
      post: None,
      publish: None,
    };

    for source_id in &ingest.source_ids {
      report.sources.push(self.process_source(*source_id).await?);
    }
    let unique: Vec<Uuid> = report
      .sources
      .iter()
      .filter(|s| !s.verdict.is_duplicate())
      .map(|s| s.source_id)
      .collect();
    if unique.is_empty() {
      info!(%topic, ingested = ingest.source_ids.len(), "nothing new to analyse");
      return Ok(report);
    }

    let analysis = self
      .run_stage::<Analyze>(AnalyzeInput { topic, source_ids: unique })
      .await?;
    report.analysis_id = Some(analysis.analysis_id);
    report.verification = Some(self.verify(analysis).await?);
    let post = self.build(analysis).await?;

    if !channels.is_empty() {
      let outcome = self
        .publish(PublishInput { post_id: post.post_id, channels, actor: None })
        .await?;
      report.publish = Some(outcome);
    }
    report.post = Some(post);

    info!(
      %topic,
      analysis_id = %analysis.analysis_id,
      sources = report.sources.len(),
      "topic run finished"
    );
    Ok(report)
  }
}
