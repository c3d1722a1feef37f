//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use newsdesk_core::{
  Topic,
  analysis::{AnalysisDraft, NewAnalysis},
  audit::{NewAuditEntry, SYSTEM_ACTOR, action},
  dedupe::fingerprint,
  fact::{Entities, NewFact},
  post::{Channel, Delivery, NewPost, PostQuery, PostStatus, Seo},
  source::{NewSource, NormalizedFields},
  store::PipelineStore,
  verification::{NewVerification, SubScores, VerificationStatus},
};
use serde_json::json;
use uuid::Uuid;

use crate::{SqliteStore, error::Constraint};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn core(err: crate::Error) -> newsdesk_core::Error { err.into() }

fn new_source(topic: Topic, url: &str, title: &str) -> NewSource {
  NewSource {
    topic,
    url: url.into(),
    domain: Some("example.com".into()),
    title: title.into(),
    excerpt: None,
    content: Some(format!("{title} body")),
    published_at: None,
    event_at: None,
    language: None,
    author: Some("Desk".into()),
    hashes: fingerprint(title, Some(&format!("{title} body"))),
  }
}

async fn source(s: &SqliteStore, url: &str) -> Uuid {
  s.insert_source(new_source(Topic::It, url, url))
    .await
    .unwrap()
    .expect("fresh url")
    .source_id
}

async fn analysis(s: &SqliteStore) -> Uuid {
  let src = source(s, &format!("https://example.com/{}", Uuid::new_v4())).await;
  s.insert_analysis(NewAnalysis {
    topic:      Topic::It,
    source_ids: vec![src],
    draft:      AnalysisDraft { thesis: Some("thesis".into()), confidence: Some(0.8), ..Default::default() },
  })
  .await
  .unwrap()
  .analysis_id
}

fn verification(analysis_id: Uuid, score: f64, status: VerificationStatus) -> NewVerification {
  NewVerification {
    analysis_id,
    checks: SubScores { source: 20.0, consistency: 50.0, transparency: 100.0, model: 80.0, fact_check: 100.0 },
    reliability_score: score,
    issues: vec!["single source".into()],
    status,
  }
}

fn new_post(analysis_id: Uuid, slug: &str, score: f64) -> NewPost {
  NewPost {
    analysis_id,
    slug: slug.into(),
    topic: Topic::It,
    title: "IT market analysis".into(),
    body_html: "<h2>IT</h2>".into(),
    summary: "IT\n\nFull analysis: {link}".into(),
    seo: Seo {
      title:       "IT market analysis".into(),
      description: "thesis".into(),
      keywords:    vec!["it".into()],
      og_image:    None,
      schema:      json!({ "@type": "NewsArticle" }),
    },
    sources: vec![],
    reliability_score: score,
  }
}

fn build_audit() -> NewAuditEntry { NewAuditEntry::new(SYSTEM_ACTOR, action::BUILD, json!({})) }

async fn post(s: &SqliteStore, slug: &str, score: f64) -> Uuid {
  let a = analysis(s).await;
  s.insert_post(new_post(a, slug, score), build_audit())
    .await
    .unwrap()
    .post_id
}

async fn source_count(s: &SqliteStore) -> i64 {
  s.conn
    .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM sources", [], |r| r.get(0))?))
    .await
    .unwrap()
}

// ─── Sources ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_source() {
  let s = store().await;
  let inserted = s
    .insert_source(new_source(Topic::OilGas, "https://example.com/a", "Brent rises"))
    .await
    .unwrap()
    .unwrap();

  let fetched = s.get_source(inserted.source_id).await.unwrap().unwrap();
  assert_eq!(fetched.topic, Topic::OilGas);
  assert_eq!(fetched.url, "https://example.com/a");
  assert_eq!(fetched.hashes, inserted.hashes);
  assert!(fetched.normalized_at.is_none());
}

#[tokio::test]
async fn batch_skips_known_and_repeated_urls() {
  let s = store().await;
  source(&s, "https://example.com/known").await;

  let batch = s
    .insert_sources(vec![
      new_source(Topic::It, "https://example.com/known", "Known"),
      new_source(Topic::It, "https://example.com/a", "Alpha"),
      new_source(Topic::It, "https://example.com/a", "Alpha again"),
      new_source(Topic::It, "https://example.com/b", "Beta"),
    ])
    .await
    .unwrap();

  let titles: Vec<&str> = batch.inserted.iter().map(|s| s.title.as_str()).collect();
  assert_eq!(titles, vec!["Alpha", "Beta"]);
  assert_eq!(batch.skipped, 2);
  assert_eq!(source_count(&s).await, 3);
}

#[tokio::test]
async fn failed_batch_commits_nothing() {
  let s = store().await;
  s.conn
    .call(|conn| {
      conn.execute_batch(
        "CREATE TRIGGER reject_boom BEFORE INSERT ON sources
         WHEN NEW.title = 'boom'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let result = s
    .insert_sources(vec![
      new_source(Topic::It, "https://example.com/alpha", "alpha"),
      new_source(Topic::It, "https://example.com/beta", "beta"),
      new_source(Topic::It, "https://example.com/boom", "boom"),
    ])
    .await;

  assert!(result.is_err());
  assert_eq!(source_count(&s).await, 0);
}

#[tokio::test]
async fn duplicate_url_is_ignored() {
  let s = store().await;
  let first = s
    .insert_source(new_source(Topic::It, "https://example.com/a", "First"))
    .await
    .unwrap();
  assert!(first.is_some());

  let second = s
    .insert_source(new_source(Topic::It, "https://example.com/a", "Second"))
    .await
    .unwrap();
  assert!(second.is_none());

  let stored = s.get_source(first.unwrap().source_id).await.unwrap().unwrap();
  assert_eq!(stored.title, "First");
}

#[tokio::test]
async fn get_sources_keeps_order_and_skips_missing() {
  let s = store().await;
  let a = source(&s, "https://example.com/a").await;
  let b = source(&s, "https://example.com/b").await;
  let got = s.get_sources(&[b, Uuid::new_v4(), a]).await.unwrap();
  let ids: Vec<Uuid> = got.iter().map(|x| x.source_id).collect();
  assert_eq!(ids, vec![b, a]);
}

#[tokio::test]
async fn update_normalized_stamps_source() {
  let s = store().await;
  let id = source(&s, "https://example.com/a").await;
  let updated = s
    .update_normalized(id, NormalizedFields {
      domain:   Some("example.com".into()),
      title:    "Clean title".into(),
      excerpt:  Some("Clean".into()),
      content:  Some("Clean body".into()),
      language: Some("en".into()),
      hashes:   fingerprint("Clean title", Some("Clean body")),
    })
    .await
    .unwrap();
  assert_eq!(updated.title, "Clean title");
  assert_eq!(updated.language.as_deref(), Some("en"));
  assert!(updated.normalized_at.is_some());
}

#[tokio::test]
async fn update_normalized_missing_source() {
  let s = store().await;
  let err = s
    .update_normalized(Uuid::new_v4(), NormalizedFields {
      domain:   None,
      title:    "t".into(),
      excerpt:  None,
      content:  None,
      language: None,
      hashes:   fingerprint("t", None),
    })
    .await
    .unwrap_err();
  assert!(matches!(core(err), newsdesk_core::Error::NotFound { .. }));
}

#[tokio::test]
async fn hash_candidates_only_include_earlier_sources_of_the_topic() {
  let s = store().await;
  let first = source(&s, "https://example.com/1").await;
  let second = source(&s, "https://example.com/2").await;
  s.insert_source(new_source(Topic::Ecom, "https://example.com/3", "other topic"))
    .await
    .unwrap();
  let third = source(&s, "https://example.com/4").await;

  let since = Utc::now() - Duration::hours(1);
  let candidates = s.hash_candidates(Topic::It, since, third).await.unwrap();
  let ids: Vec<Uuid> = candidates.iter().map(|c| c.source_id).collect();
  assert_eq!(ids, vec![first, second]);

  assert!(s.hash_candidates(Topic::It, since, first).await.unwrap().is_empty());

  let future = Utc::now() + Duration::hours(1);
  assert!(s.hash_candidates(Topic::It, future, third).await.unwrap().is_empty());
}

// ─── Facts ───────────────────────────────────────────────────────────────────

fn new_fact(quote: &str) -> NewFact {
  let mut entities = Entities::new();
  entities.insert("name".into(), vec!["Acme".into()]);
  NewFact { quote: quote.into(), claim: Some(quote.to_lowercase()), entities, confidence: 0.8 }
}

#[tokio::test]
async fn replace_facts_is_idempotent() {
  let s = store().await;
  let id = source(&s, "https://example.com/a").await;

  s.replace_facts(id, vec![new_fact("One"), new_fact("Two")]).await.unwrap();
  s.replace_facts(id, vec![new_fact("One"), new_fact("Two")]).await.unwrap();

  let facts = s.facts_for_sources(&[id]).await.unwrap();
  assert_eq!(facts.len(), 2);
  assert_eq!(facts[0].quote, "One");
  assert_eq!(facts[1].entities["name"], vec!["Acme"]);
}

#[tokio::test]
async fn replace_facts_for_missing_source_writes_nothing() {
  let s = store().await;
  let missing = Uuid::new_v4();
  let err = s.replace_facts(missing, vec![new_fact("One")]).await.unwrap_err();
  assert!(matches!(core(err), newsdesk_core::Error::NotFound { .. }));
  assert!(s.facts_for_sources(&[missing]).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_source_cascades_to_facts() {
  let s = store().await;
  let id = source(&s, "https://example.com/a").await;
  s.replace_facts(id, vec![new_fact("One")]).await.unwrap();

  assert!(s.delete_source(id).await.unwrap());
  assert!(s.facts_for_sources(&[id]).await.unwrap().is_empty());
  assert!(!s.delete_source(id).await.unwrap());
}

// ─── Analyses & verifications ────────────────────────────────────────────────

#[tokio::test]
async fn analysis_keeps_source_ids() {
  let s = store().await;
  let a = source(&s, "https://example.com/a").await;
  let b = source(&s, "https://example.com/b").await;
  let analysis = s
    .insert_analysis(NewAnalysis { topic: Topic::It, source_ids: vec![b, a], draft: AnalysisDraft::default() })
    .await
    .unwrap();

  let fetched = s.get_analysis(analysis.analysis_id).await.unwrap().unwrap();
  assert_eq!(fetched.source_ids(), &[b, a]);
  assert_eq!(fetched.topic, Topic::It);
}

#[tokio::test]
async fn analysis_with_unknown_source_is_rejected() {
  let s = store().await;
  let a = source(&s, "https://example.com/a").await;
  let err = s
    .insert_analysis(NewAnalysis {
      topic:      Topic::It,
      source_ids: vec![a, Uuid::new_v4()],
      draft:      AnalysisDraft::default(),
    })
    .await
    .unwrap_err();
  assert!(matches!(
    core(err),
    newsdesk_core::Error::NotFound { entity: newsdesk_core::Entity::Source, .. }
  ));
}

#[tokio::test]
async fn second_verification_conflicts() {
  let s = store().await;
  let a = analysis(&s).await;
  s.insert_verification(verification(a, 53.0, VerificationStatus::Flagged))
    .await
    .unwrap();

  let err = s
    .insert_verification(verification(a, 90.0, VerificationStatus::Passed))
    .await
    .unwrap_err();
  assert!(matches!(core(err), newsdesk_core::Error::Conflict(_)));

  let stored = s.get_verification(a).await.unwrap().unwrap();
  assert_eq!(stored.status, VerificationStatus::Flagged);
  assert_eq!(stored.reliability_score, 53.0);
}

#[tokio::test]
async fn out_of_range_score_is_invalid() {
  let s = store().await;
  let a = analysis(&s).await;
  let err = s
    .insert_verification(verification(a, 150.0, VerificationStatus::Passed))
    .await
    .unwrap_err();
  assert_eq!(err.constraint(), Some(Constraint::Check));
  assert!(matches!(core(err), newsdesk_core::Error::Invalid(_)));
  assert!(s.get_verification(a).await.unwrap().is_none());
}

#[tokio::test]
async fn verification_of_missing_analysis() {
  let s = store().await;
  let err = s
    .insert_verification(verification(Uuid::new_v4(), 53.0, VerificationStatus::Flagged))
    .await
    .unwrap_err();
  assert!(matches!(core(err), newsdesk_core::Error::NotFound { .. }));
}

#[tokio::test]
async fn deleting_analysis_cascades_to_verification() {
  let s = store().await;
  let a = analysis(&s).await;
  s.insert_verification(verification(a, 70.0, VerificationStatus::Passed))
    .await
    .unwrap();
  assert!(s.delete_analysis(a).await.unwrap());
  assert!(s.get_verification(a).await.unwrap().is_none());
}

// ─── Posts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_post_per_analysis() {
  let s = store().await;
  let a = analysis(&s).await;
  let first = s.insert_post(new_post(a, "it-a", 70.0), build_audit()).await.unwrap();
  assert_eq!(first.status, PostStatus::Draft);

  let err = s
    .insert_post(new_post(a, "it-b", 70.0), build_audit())
    .await
    .unwrap_err();
  assert!(matches!(core(err), newsdesk_core::Error::Conflict(_)));
  assert_eq!(s.get_post_for_analysis(a).await.unwrap().unwrap().post_id, first.post_id);
}

#[tokio::test]
async fn duplicate_slug_conflicts() {
  let s = store().await;
  post(&s, "same-slug", 70.0).await;
  let other = analysis(&s).await;
  let err = s
    .insert_post(new_post(other, "same-slug", 70.0), build_audit())
    .await
    .unwrap_err();
  assert!(matches!(core(err), newsdesk_core::Error::Conflict(_)));
}

#[tokio::test]
async fn list_posts_filters_and_orders_newest_first() {
  let s = store().await;
  let low = post(&s, "low", 40.0).await;
  let high = post(&s, "high", 80.0).await;
  let newest = post(&s, "newest", 90.0).await;
  s.transition_post(newest, PostStatus::InReview, "editor".into())
    .await
    .unwrap();

  let all = s.list_posts(&PostQuery::default()).await.unwrap();
  let ids: Vec<Uuid> = all.iter().map(|p| p.post_id).collect();
  assert_eq!(ids, vec![newest, high, low]);

  let drafts = s
    .list_posts(&PostQuery { status: Some(PostStatus::Draft), min_score: Some(50.0), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(drafts.len(), 1);
  assert_eq!(drafts[0].post_id, high);
}

#[tokio::test]
async fn workflow_transitions_are_audited() {
  let s = store().await;
  let id = post(&s, "flow", 70.0).await;

  s.transition_post(id, PostStatus::InReview, "alice".into()).await.unwrap();
  let approved = s
    .transition_post(id, PostStatus::Approved, "bob".into())
    .await
    .unwrap();
  assert_eq!(approved.status, PostStatus::Approved);

  let err = s
    .transition_post(id, PostStatus::InReview, "alice".into())
    .await
    .unwrap_err();
  assert!(matches!(core(err), newsdesk_core::Error::PreconditionFailed(_)));

  let log = s.audit_log(id).await.unwrap();
  let actions: Vec<&str> = log.iter().map(|e| e.action.as_str()).collect();
  assert_eq!(actions, vec![action::BUILD, action::TRANSITION, action::TRANSITION]);
  assert_eq!(log[2].actor, "bob");
  assert_eq!(log[2].diff["status"]["to"], "approved");
}

#[tokio::test]
async fn transition_of_missing_post() {
  let s = store().await;
  let err = s
    .transition_post(Uuid::new_v4(), PostStatus::InReview, "alice".into())
    .await
    .unwrap_err();
  assert!(matches!(core(err), newsdesk_core::Error::NotFound { .. }));
}

#[tokio::test]
async fn publication_records_deliveries() {
  let s = store().await;
  let id = post(&s, "pub", 70.0).await;

  let published = s
    .record_publication(
      id,
      vec![Delivery { channel: Channel::Cms, external_id: Some("cms-42".into()) }],
      SYSTEM_ACTOR.into(),
    )
    .await
    .unwrap();
  assert_eq!(published.status, PostStatus::Published);
  assert_eq!(published.cms_id.as_deref(), Some("cms-42"));
  assert_eq!(s.delivered_channels(id).await.unwrap(), vec![Channel::Cms]);

  // A later publish that only reaches telegram keeps the cms id.
  let again = s
    .record_publication(
      id,
      vec![Delivery { channel: Channel::Telegram, external_id: None }],
      SYSTEM_ACTOR.into(),
    )
    .await
    .unwrap();
  assert_eq!(again.cms_id.as_deref(), Some("cms-42"));
  assert_eq!(
    s.delivered_channels(id).await.unwrap(),
    vec![Channel::Cms, Channel::Telegram]
  );

  let publishes = s
    .audit_log(id)
    .await
    .unwrap()
    .into_iter()
    .filter(|e| e.action == action::PUBLISH)
    .count();
  assert_eq!(publishes, 1);
}

#[tokio::test]
async fn publication_without_deliveries_still_publishes() {
  let s = store().await;
  let id = post(&s, "nochan", 70.0).await;
  let published = s.record_publication(id, vec![], SYSTEM_ACTOR.into()).await.unwrap();
  assert_eq!(published.status, PostStatus::Published);
  assert!(published.cms_id.is_none());
  assert!(s.delivered_channels(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_post_cascades_to_audit_log() {
  let s = store().await;
  let id = post(&s, "gone", 70.0).await;
  assert!(s.delete_post(id).await.unwrap());
  assert!(s.audit_log(id).await.unwrap().is_empty());
  assert!(s.get_post(id).await.unwrap().is_none());
}

#[tokio::test]
async fn analysis_with_post_cannot_be_deleted() {
  let s = store().await;
  let a = analysis(&s).await;
  s.insert_post(new_post(a, "kept", 70.0), build_audit()).await.unwrap();
  let err = s.delete_analysis(a).await.unwrap_err();
  assert_eq!(err.constraint(), Some(Constraint::ForeignKey));
  assert!(matches!(core(err), newsdesk_core::Error::PreconditionFailed(_)));
  assert!(s.get_analysis(a).await.unwrap().is_some());
}

// ─── Reporting ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn activity_counts() {
  let s = store().await;
  let a = analysis(&s).await;
  s.insert_verification(verification(a, 70.0, VerificationStatus::Passed))
    .await
    .unwrap();
  s.insert_post(new_post(a, "counted", 70.0), build_audit()).await.unwrap();

  let counts = s.activity_since(Utc::now() - Duration::hours(24)).await.unwrap();
  assert_eq!(counts.sources, 1);
  assert_eq!(counts.analyses, 1);
  assert_eq!(counts.verifications.get("passed"), Some(&1));
  assert_eq!(counts.posts.get("draft"), Some(&1));

  let later = s.activity_since(Utc::now() + Duration::hours(1)).await.unwrap();
  assert_eq!(later.sources, 0);
  assert!(later.posts.is_empty());
}
