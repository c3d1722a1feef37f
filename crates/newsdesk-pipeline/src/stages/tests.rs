use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use newsdesk_core::{
  ErrorKind, Result, Topic,
  dedupe::Verdict,
  post::{Channel, ChannelOutcome, Post, PostStatus},
  source::RawItem,
  store::PipelineStore,
};
use newsdesk_store_sqlite::SqliteStore;
use uuid::Uuid;

use super::*;
use crate::{
  channel::{ChannelAdapter, ChannelError, CmsAdapter, CmsConfig},
  provider::ResearchProvider,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

struct FixedResearch(Vec<RawItem>);

#[async_trait]
impl ResearchProvider for FixedResearch {
  async fn fetch(&self, _topic: Topic, _window_hours: u32) -> Result<Vec<RawItem>> {
    Ok(self.0.clone())
  }
}

struct RejectingChannel(Channel);

#[async_trait]
impl ChannelAdapter for RejectingChannel {
  fn channel(&self) -> Channel { self.0 }

  async fn deliver(&self, _post: &Post, _link: &str) -> std::result::Result<Option<String>, ChannelError> {
    Err(ChannelError::Rejected("chat not found".into()))
  }
}

struct SlowChannel(Channel);

#[async_trait]
impl ChannelAdapter for SlowChannel {
  fn channel(&self) -> Channel { self.0 }

  async fn deliver(&self, _post: &Post, _link: &str) -> std::result::Result<Option<String>, ChannelError> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Ok(None)
  }
}

fn raw(url: &str, title: &str, content: &str) -> RawItem {
  RawItem {
    url:          url.into(),
    title:        title.into(),
    excerpt:      None,
    content:      Some(content.into()),
    published_at: None,
    event_at:     None,
    language:     None,
    author:       Some("Desk".into()),
  }
}

fn two_items() -> Vec<RawItem> {
  vec![
    raw(
      "https://alpha.example/a",
      "Retailer margins widen",
      "<p>Acme Retail said margins rose 3% in the quarter.</p>",
    ),
    raw(
      "https://beta.example/b",
      "Parcel volumes climb",
      "<p>According to Acme Retail, parcel volumes grew 8% year on year.</p>",
    ),
  ]
}

async fn stages(items: Vec<RawItem>, channels: ChannelSet) -> Stages<SqliteStore> {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  Stages {
    research: Arc::new(FixedResearch(items)),
    channels,
    channel_timeout: Duration::from_millis(100),
    site_url: "https://news.example/".into(),
    ..Stages::new(store)
  }
}

async fn ingest_and_process(stages: &Stages<SqliteStore>) -> Vec<Uuid> {
  let out = stages
    .ingest(IngestInput { topic: Topic::Ecom, window_hours: 6 })
    .await
    .unwrap();
  for id in &out.source_ids {
    stages.normalize(SourceRef { source_id: *id }).await.unwrap();
    stages.index_facts(SourceRef { source_id: *id }).await.unwrap();
  }
  out.source_ids
}

async fn verified_analysis(stages: &Stages<SqliteStore>) -> Uuid {
  let source_ids = ingest_and_process(stages).await;
  let analysis = stages
    .analyze(AnalyzeInput { topic: Topic::Ecom, source_ids })
    .await
    .unwrap();
  stages.verify(analysis).await.unwrap();
  analysis.analysis_id
}

// ─── Sources ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_rejects_window_out_of_range() {
  let stages = stages(two_items(), ChannelSet::new()).await;
  for window_hours in [0, 49] {
    let err = stages
      .ingest(IngestInput { topic: Topic::It, window_hours })
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
  }
}

#[tokio::test]
async fn ingest_populates_hashes_and_skips_known_urls() {
  let stages = stages(two_items(), ChannelSet::new()).await;
  let input = IngestInput { topic: Topic::Ecom, window_hours: 6 };

  let first = stages.ingest(input.clone()).await.unwrap();
  assert_eq!(first.source_ids.len(), 2);
  let source = stages.store.get_source(first.source_ids[0]).await.unwrap().unwrap();
  assert!(source.hashes.is_some());
  assert_eq!(source.domain.as_deref(), Some("alpha.example"));

  let second = stages.ingest(input).await.unwrap();
  assert!(second.source_ids.is_empty());
  assert_eq!(second.skipped_existing, 2);
}

#[tokio::test]
async fn ingest_drops_items_without_title() {
  let items = vec![raw("https://alpha.example/a", "  ", "body")];
  let stages = stages(items, ChannelSet::new()).await;
  let out = stages
    .ingest(IngestInput { topic: Topic::Ecom, window_hours: 6 })
    .await
    .unwrap();
  assert_eq!(out.rejected, 1);
  assert!(out.source_ids.is_empty());
}

#[tokio::test]
async fn normalize_cleans_content() {
  let stages = stages(two_items(), ChannelSet::new()).await;
  let out = stages
    .ingest(IngestInput { topic: Topic::Ecom, window_hours: 6 })
    .await
    .unwrap();

  let source = stages
    .normalize(SourceRef { source_id: out.source_ids[0] })
    .await
    .unwrap();
  assert_eq!(
    source.content.as_deref(),
    Some("Acme Retail said margins rose 3% in the quarter.")
  );
  assert_eq!(source.language.as_deref(), Some("en"));
  assert!(source.excerpt.is_some());
  assert!(source.normalized_at.is_some());
}

#[tokio::test]
async fn normalize_unknown_source_is_not_found() {
  let stages = stages(vec![], ChannelSet::new()).await;
  let err = stages
    .normalize(SourceRef { source_id: Uuid::new_v4() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn dedupe_flags_only_the_later_copy() {
  let items = vec![
    raw("https://alpha.example/a", "Retailer margins widen", "First wording."),
    raw("https://beta.example/b", "Retailer margins widen", "Second wording."),
  ];
  let stages = stages(items, ChannelSet::new()).await;
  let ids = ingest_and_process(&stages).await;

  let first = stages.dedupe(SourceRef { source_id: ids[0] }).await.unwrap();
  let second = stages.dedupe(SourceRef { source_id: ids[1] }).await.unwrap();

  assert_eq!(first, Verdict::Unique);
  assert!(matches!(second, Verdict::Duplicate { of, .. } if of == ids[0]));
}

#[tokio::test]
async fn index_facts_requires_normalization() {
  let stages = stages(two_items(), ChannelSet::new()).await;
  let out = stages
    .ingest(IngestInput { topic: Topic::Ecom, window_hours: 6 })
    .await
    .unwrap();
  let source_ref = SourceRef { source_id: out.source_ids[0] };

  let err = stages.index_facts(source_ref).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

  stages.normalize(source_ref).await.unwrap();
  let first = stages.index_facts(source_ref).await.unwrap();
  let again = stages.index_facts(source_ref).await.unwrap();
  assert_eq!(first.facts, 1);
  assert_eq!(again.facts, 1);
}

// ─── Analysis and verification ───────────────────────────────────────────────

#[tokio::test]
async fn analyze_keeps_source_ids() {
  let stages = stages(two_items(), ChannelSet::new()).await;
  let source_ids = ingest_and_process(&stages).await;

  let analysis_ref = stages
    .analyze(AnalyzeInput { topic: Topic::Ecom, source_ids: source_ids.clone() })
    .await
    .unwrap();
  let analysis = stages.store.get_analysis(analysis_ref.analysis_id).await.unwrap().unwrap();
  assert_eq!(analysis.source_ids(), source_ids.as_slice());
}

#[tokio::test]
async fn analyze_rejects_unknown_sources() {
  let stages = stages(vec![], ChannelSet::new()).await;
  let err = stages
    .analyze(AnalyzeInput { topic: Topic::It, source_ids: vec![Uuid::new_v4()] })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn analysis_without_sources_verifies_with_zero_source_score() {
  let stages = stages(vec![], ChannelSet::new()).await;
  let analysis = stages
    .analyze(AnalyzeInput { topic: Topic::It, source_ids: vec![] })
    .await
    .unwrap();

  let verification = stages.verify(analysis).await.unwrap();
  assert_eq!(verification.checks.source, 0.0);
  assert!(
    verification.issues.iter().any(|i| i == "analysis cites no sources"),
    "issues: {:?}",
    verification.issues
  );
}

#[tokio::test]
async fn verify_writes_once_and_rejects_reverification() {
  let stages = stages(two_items(), ChannelSet::new()).await;
  let source_ids = ingest_and_process(&stages).await;
  let analysis = stages
    .analyze(AnalyzeInput { topic: Topic::Ecom, source_ids })
    .await
    .unwrap();

  let verification = stages.verify(analysis).await.unwrap();
  assert!((0.0..=100.0).contains(&verification.reliability_score));
  assert_eq!(verification.analysis_id, analysis.analysis_id);

  let err = stages.verify(analysis).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
  let stored = stages.store.get_verification(analysis.analysis_id).await.unwrap().unwrap();
  assert_eq!(stored.verification_id, verification.verification_id);
}

#[tokio::test]
async fn verify_unknown_analysis_is_not_found() {
  let stages = stages(vec![], ChannelSet::new()).await;
  let err = stages
    .verify(AnalysisRef { analysis_id: Uuid::new_v4() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn verification_status_follows_score() {
  let stages = stages(two_items(), ChannelSet::new()).await;
  let analysis_id = verified_analysis(&stages).await;
  let v = stages.store.get_verification(analysis_id).await.unwrap().unwrap();
  let expected = newsdesk_core::verify::classify(v.reliability_score, 65.0, 50.0);
  assert_eq!(v.status, expected);
}

// ─── Build and publish ───────────────────────────────────────────────────────

#[tokio::test]
async fn build_requires_verification() {
  let stages = stages(two_items(), ChannelSet::new()).await;
  let source_ids = ingest_and_process(&stages).await;
  let analysis = stages
    .analyze(AnalyzeInput { topic: Topic::Ecom, source_ids })
    .await
    .unwrap();

  let err = stages.build(analysis).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
}

#[tokio::test]
async fn build_creates_exactly_one_draft() {
  let stages = stages(two_items(), ChannelSet::new()).await;
  let analysis_id = verified_analysis(&stages).await;

  let post_ref = stages.build(AnalysisRef { analysis_id }).await.unwrap();
  let post = stages.store.get_post(post_ref.post_id).await.unwrap().unwrap();
  let verification = stages.store.get_verification(analysis_id).await.unwrap().unwrap();

  assert_eq!(post.status, PostStatus::Draft);
  assert_eq!(post.reliability_score, verification.reliability_score);
  assert!(post.slug.starts_with("ecom-"));
  assert!(post.body_html.contains("<article"));
  assert_eq!(stages.store.audit_log(post.post_id).await.unwrap().len(), 1);

  let err = stages.build(AnalysisRef { analysis_id }).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn publish_survives_a_failing_channel() {
  let mut channels = ChannelSet::new();
  channels
    .insert(Arc::new(CmsAdapter::new(reqwest::Client::new(), CmsConfig::default())))
    .insert(Arc::new(RejectingChannel(Channel::Telegram)));
  let stages = stages(two_items(), channels).await;
  let analysis_id = verified_analysis(&stages).await;
  let post_ref = stages.build(AnalysisRef { analysis_id }).await.unwrap();

  let outcome = stages
    .publish(PublishInput {
      post_id:  post_ref.post_id,
      channels: vec![Channel::Cms, Channel::Telegram],
      actor:    None,
    })
    .await
    .unwrap();

  assert_eq!(outcome.status, PostStatus::Published);
  assert!(outcome.is_partial_failure());
  let expected_cms_id = format!("cms-{}", post_ref.slug);
  assert_eq!(outcome.cms_id.as_deref(), Some(expected_cms_id.as_str()));
  assert!(matches!(outcome.channels[&Channel::Telegram], ChannelOutcome::Failed { .. }));
  assert!(matches!(outcome.channels[&Channel::Cms], ChannelOutcome::Delivered { .. }));
}

#[tokio::test]
async fn publish_skips_channels_already_delivered() {
  let mut channels = ChannelSet::new();
  channels.insert(Arc::new(CmsAdapter::new(reqwest::Client::new(), CmsConfig::default())));
  let stages = stages(two_items(), channels).await;
  let analysis_id = verified_analysis(&stages).await;
  let post_ref = stages.build(AnalysisRef { analysis_id }).await.unwrap();
  let input = PublishInput { post_id: post_ref.post_id, channels: vec![Channel::Cms], actor: None };

  stages.publish(input.clone()).await.unwrap();
  let again = stages.publish(input).await.unwrap();

  assert!(matches!(again.channels[&Channel::Cms], ChannelOutcome::Skipped { .. }));
  assert_eq!(again.status, PostStatus::Published);
  assert_eq!(stages.store.delivered_channels(post_ref.post_id).await.unwrap(), vec![Channel::Cms]);
}

#[tokio::test]
async fn publish_bounds_each_channel_by_timeout() {
  let mut channels = ChannelSet::new();
  channels.insert(Arc::new(SlowChannel(Channel::Telegram)));
  let stages = stages(two_items(), channels).await;
  let analysis_id = verified_analysis(&stages).await;
  let post_ref = stages.build(AnalysisRef { analysis_id }).await.unwrap();

  let outcome = stages
    .publish(PublishInput {
      post_id:  post_ref.post_id,
      channels: vec![Channel::Telegram, Channel::Cms],
      actor:    Some("editor".into()),
    })
    .await
    .unwrap();

  assert!(matches!(outcome.channels[&Channel::Telegram], ChannelOutcome::Failed { .. }));
  assert!(matches!(outcome.channels[&Channel::Cms], ChannelOutcome::Skipped { .. }));
  assert_eq!(outcome.status, PostStatus::Published);
}

#[tokio::test]
async fn publish_unknown_post_is_not_found() {
  let stages = stages(vec![], ChannelSet::new()).await;
  let err = stages
    .publish(PublishInput { post_id: Uuid::new_v4(), channels: vec![Channel::Cms], actor: None })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}
