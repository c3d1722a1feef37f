//! [`SqliteStore`]: the SQLite implementation of [`PipelineStore`].

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Utc};
use newsdesk_core::{
  Entity,
  Topic,
  analysis::{Analysis, AnalysisItems, NewAnalysis},
  audit::{AuditLog, NewAuditEntry, action},
  fact::{Fact, NewFact},
  post::{Channel, Delivery, NewPost, Post, PostQuery, PostStatus},
  source::{NewSource, NormalizedFields, SourceItem},
  store::{ActivityCounts, HashCandidate, PipelineStore, SourceBatch},
  verification::{NewVerification, Verification},
};
use rusqlite::{OptionalExtension as _, params};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    ANALYSIS_COLUMNS, AUDIT_COLUMNS, FACT_COLUMNS, POST_COLUMNS, RawAnalysis, RawAudit, RawFact,
    RawPost, RawSource, RawVerification, SOURCE_COLUMNS, VERIFICATION_COLUMNS, decode_dt,
    decode_uuid, encode_dt, encode_json, encode_uuid,
  },
  schema::SCHEMA,
};

/// The outcome of a transaction that may be rejected on a domain rule. A
/// rejected transaction is dropped uncommitted, which rolls it back.
type Guarded<T> = std::result::Result<T, newsdesk_core::Error>;

const DEFAULT_LIST_LIMIT: usize = 100;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A newsdesk work item store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn row_exists(conn: &rusqlite::Connection, table: &str, column: &str, id: &str) -> rusqlite::Result<bool> {
  let sql = format!("SELECT 1 FROM {table} WHERE {column} = ?1");
  Ok(conn.query_row(&sql, params![id], |_| Ok(())).optional()?.is_some())
}

fn select_source(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawSource>> {
  conn
    .query_row(
      &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE source_id = ?1"),
      params![id],
      RawSource::from_row,
    )
    .optional()
}

fn select_post(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawPost>> {
  conn
    .query_row(
      &format!("SELECT {POST_COLUMNS} FROM posts WHERE post_id = ?1"),
      params![id],
      RawPost::from_row,
    )
    .optional()
}

fn insert_audit(
  conn: &rusqlite::Connection,
  post_id: &str,
  actor: &str,
  action: &str,
  diff: &str,
  at: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO audit_log (audit_id, post_id, actor, action, diff, at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![encode_uuid(Uuid::new_v4()), post_id, actor, action, diff, at],
  )?;
  Ok(())
}

fn count(conn: &rusqlite::Connection, sql: &str, since: &str) -> rusqlite::Result<u64> {
  let n: i64 = conn.query_row(sql, params![since], |r| r.get(0))?;
  Ok(n.max(0) as u64)
}

fn count_by_status(
  conn: &rusqlite::Connection,
  sql: &str,
  since: &str,
) -> rusqlite::Result<BTreeMap<String, u64>> {
  let mut stmt = conn.prepare(sql)?;
  let rows = stmt
    .query_map(params![since], |r| {
      let status: String = r.get(0)?;
      let n: i64 = r.get(1)?;
      Ok((status, n.max(0) as u64))
    })?
    .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
  Ok(rows)
}

// ─── PipelineStore impl ──────────────────────────────────────────────────────

impl PipelineStore for SqliteStore {
  type Error = crate::Error;

  // ── Sources ───────────────────────────────────────────────────────────────

  async fn insert_source(&self, input: NewSource) -> Result<Option<SourceItem>> {
    let batch = self.insert_sources(vec![input]).await?;
    Ok(batch.inserted.into_iter().next())
  }

  async fn insert_sources(&self, inputs: Vec<NewSource>) -> Result<SourceBatch> {
    let fetched_at = Utc::now();
    let items: Vec<SourceItem> = inputs
      .into_iter()
      .map(|input| SourceItem {
        source_id:     Uuid::new_v4(),
        topic:         input.topic,
        url:           input.url,
        domain:        input.domain,
        title:         input.title,
        excerpt:       input.excerpt,
        content:       input.content,
        published_at:  input.published_at,
        event_at:      input.event_at,
        language:      input.language,
        author:        input.author,
        fetched_at,
        hashes:        Some(input.hashes),
        normalized_at: None,
      })
      .collect();
    let fetched_at = encode_dt(fetched_at);

    let (items, stored) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut stored = Vec::with_capacity(items.len());
        {
          let mut stmt = tx.prepare(
            "INSERT INTO sources (
               source_id, topic, url, domain, title, excerpt, content,
               published_at, event_at, language, author, fetched_at,
               title_hash, content_hash, simhash
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT (url) DO NOTHING",
          )?;
          for item in &items {
            let hashes = item.hashes.as_ref();
            let n = stmt.execute(params![
              encode_uuid(item.source_id),
              item.topic.code(),
              item.url,
              item.domain,
              item.title,
              item.excerpt,
              item.content,
              item.published_at.map(encode_dt),
              item.event_at.map(encode_dt),
              item.language,
              item.author,
              fetched_at,
              hashes.map(|h| h.title.as_str()),
              hashes.map(|h| h.content.as_str()),
              hashes.map(|h| h.simhash.as_str()),
            ])?;
            stored.push(n == 1);
          }
        }
        tx.commit()?;
        Ok((items, stored))
      })
      .await?;

    let mut batch = SourceBatch::default();
    for (item, stored) in items.into_iter().zip(stored) {
      if stored {
        batch.inserted.push(item);
      } else {
        debug!(url = %item.url, "source url already stored");
        batch.skipped += 1;
      }
    }
    Ok(batch)
  }

  async fn get_source(&self, id: Uuid) -> Result<Option<SourceItem>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(select_source(conn, &id_str)?))
      .await?;
    raw.map(RawSource::into_source).transpose()
  }

  async fn get_sources(&self, ids: &[Uuid]) -> Result<Vec<SourceItem>> {
    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();
    let raws: Vec<RawSource> = self
      .conn
      .call(move |conn| {
        let mut out = Vec::with_capacity(id_strs.len());
        for id in &id_strs {
          if let Some(raw) = select_source(conn, id)? {
            out.push(raw);
          }
        }
        Ok(out)
      })
      .await?;
    raws.into_iter().map(RawSource::into_source).collect()
  }

  async fn update_normalized(&self, id: Uuid, fields: NormalizedFields) -> Result<SourceItem> {
    let id_str = encode_uuid(id);
    let now = encode_dt(Utc::now());

    let raw: Guarded<RawSource> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let n = tx.execute(
          "UPDATE sources SET
             domain = ?2, title = ?3, excerpt = ?4, content = ?5, language = ?6,
             title_hash = ?7, content_hash = ?8, simhash = ?9, normalized_at = ?10
           WHERE source_id = ?1",
          params![
            id_str,
            fields.domain,
            fields.title,
            fields.excerpt,
            fields.content,
            fields.language,
            fields.hashes.title,
            fields.hashes.content,
            fields.hashes.simhash,
            now,
          ],
        )?;
        let Some(raw) = (n == 1).then(|| select_source(&tx, &id_str)).transpose()?.flatten() else {
          return Ok(Err(newsdesk_core::Error::not_found(Entity::Source, id)));
        };
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    raw?.into_source()
  }

  async fn hash_candidates(
    &self,
    topic: Topic,
    since: DateTime<Utc>,
    before: Uuid,
  ) -> Result<Vec<HashCandidate>> {
    let topic = topic.code();
    let since = encode_dt(since);
    let before = encode_uuid(before);

    let rows: Vec<(String, String, String, String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT source_id, fetched_at, title_hash, content_hash, simhash
           FROM sources
           WHERE topic = ?1
             AND fetched_at >= ?2
             AND rowid < (SELECT rowid FROM sources WHERE source_id = ?3)
             AND title_hash IS NOT NULL
             AND content_hash IS NOT NULL
             AND simhash IS NOT NULL
           ORDER BY fetched_at, rowid",
        )?;
        let rows = stmt
          .query_map(params![topic, since, before], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, fetched_at, title, content, simhash)| {
        Ok(HashCandidate {
          source_id:  decode_uuid(&id)?,
          fetched_at: decode_dt(&fetched_at)?,
          hashes:     newsdesk_core::source::ContentHashes { title, content, simhash },
        })
      })
      .collect()
  }

  async fn delete_source(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM sources WHERE source_id = ?1", params![id_str])?))
      .await?;
    Ok(n > 0)
  }

  // ── Facts ─────────────────────────────────────────────────────────────────

  async fn replace_facts(&self, source_id: Uuid, facts: Vec<NewFact>) -> Result<Vec<Fact>> {
    let facts: Vec<Fact> = facts
      .into_iter()
      .map(|f| Fact {
        fact_id: Uuid::new_v4(),
        source_id,
        quote: f.quote,
        claim: f.claim,
        entities: f.entities,
        confidence: f.confidence,
      })
      .collect();

    let source_str = encode_uuid(source_id);
    let rows = facts
      .iter()
      .map(|f| {
        Ok((
          encode_uuid(f.fact_id),
          f.quote.clone(),
          f.claim.clone(),
          encode_json(&f.entities)?,
          f.confidence,
        ))
      })
      .collect::<Result<Vec<_>>>()?;

    let outcome: Guarded<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, "sources", "source_id", &source_str)? {
          return Ok(Err(newsdesk_core::Error::not_found(Entity::Source, source_id)));
        }
        tx.execute("DELETE FROM facts WHERE source_id = ?1", params![source_str])?;
        for (position, (fact_id, quote, claim, entities, confidence)) in rows.iter().enumerate() {
          tx.execute(
            "INSERT INTO facts (fact_id, source_id, position, quote, claim, entities, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![fact_id, source_str, position as i64, quote, claim, entities, confidence],
          )?;
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    Ok(facts)
  }

  async fn facts_for_sources(&self, source_ids: &[Uuid]) -> Result<Vec<Fact>> {
    let id_strs: Vec<String> = source_ids.iter().copied().map(encode_uuid).collect();
    let raws: Vec<RawFact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {FACT_COLUMNS} FROM facts WHERE source_id = ?1 ORDER BY position"
        ))?;
        let mut out = Vec::new();
        for id in &id_strs {
          let rows = stmt
            .query_map(params![id], RawFact::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          out.extend(rows);
        }
        Ok(out)
      })
      .await?;
    raws.into_iter().map(RawFact::into_fact).collect()
  }

  // ── Analyses ──────────────────────────────────────────────────────────────

  async fn insert_analysis(&self, input: NewAnalysis) -> Result<Analysis> {
    let draft = input.draft;
    let analysis = Analysis {
      analysis_id:   Uuid::new_v4(),
      topic:         input.topic,
      items:         AnalysisItems { source_ids: input.source_ids },
      thesis:        draft.thesis,
      impact_market: draft.impact_market,
      winners:       draft.winners,
      losers:        draft.losers,
      scenarios:     draft.scenarios,
      risks:         draft.risks,
      confidence:    draft.confidence,
      created_at:    Utc::now(),
    };

    let id_str     = encode_uuid(analysis.analysis_id);
    let topic      = analysis.topic.code();
    let source_ids = analysis.items.source_ids.clone();
    let items      = encode_json(&analysis.items)?;
    let thesis     = analysis.thesis.clone();
    let impact     = analysis.impact_market.clone();
    let winners    = analysis.winners.clone();
    let losers     = analysis.losers.clone();
    let scenarios  = encode_json(&analysis.scenarios)?;
    let risks      = encode_json(&analysis.risks)?;
    let confidence = analysis.confidence;
    let created_at = encode_dt(analysis.created_at);

    let outcome: Guarded<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for source_id in &source_ids {
          if !row_exists(&tx, "sources", "source_id", &encode_uuid(*source_id))? {
            return Ok(Err(newsdesk_core::Error::not_found(Entity::Source, *source_id)));
          }
        }
        tx.execute(
          "INSERT INTO analyses (
             analysis_id, topic, items, thesis, impact_market, winners, losers,
             scenarios, risks, confidence, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          params![
            id_str, topic, items, thesis, impact, winners, losers, scenarios, risks, confidence,
            created_at,
          ],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    Ok(analysis)
  }

  async fn get_analysis(&self, id: Uuid) -> Result<Option<Analysis>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE analysis_id = ?1"),
              params![id_str],
              RawAnalysis::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawAnalysis::into_analysis).transpose()
  }

  async fn delete_analysis(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM analyses WHERE analysis_id = ?1", params![id_str])?)
      })
      .await?;
    Ok(n > 0)
  }

  // ── Verifications ─────────────────────────────────────────────────────────

  async fn insert_verification(&self, input: NewVerification) -> Result<Verification> {
    let verification = Verification {
      verification_id:   Uuid::new_v4(),
      analysis_id:       input.analysis_id,
      checks:            input.checks,
      reliability_score: input.reliability_score,
      issues:            input.issues,
      status:            input.status,
    };

    let id_str       = encode_uuid(verification.verification_id);
    let analysis_id  = verification.analysis_id;
    let analysis_str = encode_uuid(analysis_id);
    let checks       = encode_json(&verification.checks)?;
    let score        = verification.reliability_score;
    let issues       = encode_json(&verification.issues)?;
    let status       = verification.status.as_str();
    let created_at   = encode_dt(Utc::now());

    let outcome: Guarded<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, "analyses", "analysis_id", &analysis_str)? {
          return Ok(Err(newsdesk_core::Error::not_found(Entity::Analysis, analysis_id)));
        }
        if row_exists(&tx, "verifications", "analysis_id", &analysis_str)? {
          return Ok(Err(newsdesk_core::Error::Conflict(format!(
            "analysis {analysis_id} is already verified"
          ))));
        }
        tx.execute(
          "INSERT INTO verifications (
             verification_id, analysis_id, checks, reliability_score, issues, status, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![id_str, analysis_str, checks, score, issues, status, created_at],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    Ok(verification)
  }

  async fn get_verification(&self, analysis_id: Uuid) -> Result<Option<Verification>> {
    let id_str = encode_uuid(analysis_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {VERIFICATION_COLUMNS} FROM verifications WHERE analysis_id = ?1"),
              params![id_str],
              RawVerification::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawVerification::into_verification).transpose()
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn insert_post(&self, input: NewPost, audit: NewAuditEntry) -> Result<Post> {
    let now = Utc::now();
    let post = Post {
      post_id:           Uuid::new_v4(),
      analysis_id:       input.analysis_id,
      slug:              input.slug,
      topic:             input.topic,
      title:             input.title,
      body_html:         input.body_html,
      summary:           input.summary,
      seo:               input.seo,
      sources:           input.sources,
      reliability_score: input.reliability_score,
      status:            PostStatus::Draft,
      cms_id:            None,
      created_at:        now,
      updated_at:        now,
    };

    let id_str       = encode_uuid(post.post_id);
    let analysis_id  = post.analysis_id;
    let analysis_str = encode_uuid(analysis_id);
    let slug         = post.slug.clone();
    let topic        = post.topic.code();
    let title        = post.title.clone();
    let body_html    = post.body_html.clone();
    let summary      = post.summary.clone();
    let seo          = encode_json(&post.seo)?;
    let sources      = encode_json(&post.sources)?;
    let score        = post.reliability_score;
    let status       = post.status.as_str();
    let at           = encode_dt(now);
    let diff         = encode_json(&audit.diff)?;

    let outcome: Guarded<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, "analyses", "analysis_id", &analysis_str)? {
          return Ok(Err(newsdesk_core::Error::not_found(Entity::Analysis, analysis_id)));
        }
        if row_exists(&tx, "posts", "analysis_id", &analysis_str)? {
          return Ok(Err(newsdesk_core::Error::Conflict(format!(
            "analysis {analysis_id} already has a post"
          ))));
        }
        tx.execute(
          "INSERT INTO posts (
             post_id, analysis_id, slug, topic, title, body_html, summary, seo,
             sources, reliability_score, status, cms_id, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL, ?12, ?12)",
          params![
            id_str, analysis_str, slug, topic, title, body_html, summary, seo, sources, score,
            status, at,
          ],
        )?;
        insert_audit(&tx, &id_str, &audit.actor, &audit.action, &diff, &at)?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    Ok(post)
  }

  async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(select_post(conn, &id_str)?))
      .await?;
    raw.map(RawPost::into_post).transpose()
  }

  async fn get_post_for_analysis(&self, analysis_id: Uuid) -> Result<Option<Post>> {
    let id_str = encode_uuid(analysis_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {POST_COLUMNS} FROM posts WHERE analysis_id = ?1"),
              params![id_str],
              RawPost::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawPost::into_post).transpose()
  }

  async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
    let status    = query.status.map(PostStatus::as_str);
    let min_score = query.min_score;
    let limit     = query.limit.unwrap_or(DEFAULT_LIST_LIMIT) as i64;
    let offset    = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawPost> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {POST_COLUMNS} FROM posts
           WHERE (?1 IS NULL OR status = ?1)
             AND (?2 IS NULL OR reliability_score >= ?2)
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt
          .query_map(params![status, min_score, limit, offset], RawPost::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPost::into_post).collect()
  }

  async fn transition_post(&self, id: Uuid, next: PostStatus, actor: String) -> Result<Post> {
    let id_str = encode_uuid(id);
    let now = encode_dt(Utc::now());

    let raw: Guarded<RawPost> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(current) = select_post(&tx, &id_str)? else {
          return Ok(Err(newsdesk_core::Error::not_found(Entity::Post, id)));
        };
        let from = match PostStatus::parse(&current.status) {
          Ok(status) => status,
          Err(e) => return Ok(Err(e)),
        };
        if !from.can_transition_to(next) {
          return Ok(Err(newsdesk_core::Error::PreconditionFailed(format!(
            "post {id} cannot move from {from} to {next}"
          ))));
        }
        tx.execute(
          "UPDATE posts SET status = ?2, updated_at = ?3 WHERE post_id = ?1",
          params![id_str, next.as_str(), now],
        )?;
        let diff = json!({ "status": { "from": from, "to": next } }).to_string();
        insert_audit(&tx, &id_str, &actor, action::TRANSITION, &diff, &now)?;
        let updated = select_post(&tx, &id_str)?;
        tx.commit()?;
        Ok(updated.ok_or_else(|| newsdesk_core::Error::not_found(Entity::Post, id)))
      })
      .await?;

    raw?.into_post()
  }

  async fn record_publication(
    &self,
    id: Uuid,
    deliveries: Vec<Delivery>,
    actor: String,
  ) -> Result<Post> {
    let id_str = encode_uuid(id);
    let now = encode_dt(Utc::now());
    let cms_id = deliveries
      .iter()
      .find(|d| d.channel == Channel::Cms)
      .and_then(|d| d.external_id.clone());
    let delivery_diffs = deliveries
      .iter()
      .map(|d| encode_json(d))
      .collect::<Result<Vec<_>>>()?;

    let raw: Guarded<RawPost> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(current) = select_post(&tx, &id_str)? else {
          return Ok(Err(newsdesk_core::Error::not_found(Entity::Post, id)));
        };
        let from = match PostStatus::parse(&current.status) {
          Ok(status) => status,
          Err(e) => return Ok(Err(e)),
        };

        tx.execute(
          "UPDATE posts SET status = ?2, cms_id = COALESCE(?3, cms_id), updated_at = ?4
           WHERE post_id = ?1",
          params![id_str, PostStatus::Published.as_str(), cms_id, now],
        )?;
        for diff in &delivery_diffs {
          insert_audit(&tx, &id_str, &actor, action::DELIVER, diff, &now)?;
        }
        if from != PostStatus::Published {
          let diff = json!({ "status": { "from": from, "to": PostStatus::Published } }).to_string();
          insert_audit(&tx, &id_str, &actor, action::PUBLISH, &diff, &now)?;
        }

        let updated = select_post(&tx, &id_str)?;
        tx.commit()?;
        Ok(updated.ok_or_else(|| newsdesk_core::Error::not_found(Entity::Post, id)))
      })
      .await?;

    raw?.into_post()
  }

  async fn delivered_channels(&self, id: Uuid) -> Result<Vec<Channel>> {
    let id_str = encode_uuid(id);
    let codes: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT json_extract(diff, '$.channel') FROM audit_log
           WHERE post_id = ?1 AND action = ?2",
        )?;
        let rows = stmt
          .query_map(params![id_str, action::DELIVER], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut channels = codes
      .iter()
      .map(|c| Channel::parse(c))
      .collect::<newsdesk_core::Result<Vec<_>>>()?;
    channels.sort();
    Ok(channels)
  }

  async fn audit_log(&self, post_id: Uuid) -> Result<Vec<AuditLog>> {
    let id_str = encode_uuid(post_id);
    let raws: Vec<RawAudit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {AUDIT_COLUMNS} FROM audit_log WHERE post_id = ?1 ORDER BY at, rowid"
        ))?;
        let rows = stmt
          .query_map(params![id_str], RawAudit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawAudit::into_audit).collect()
  }

  async fn delete_post(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM posts WHERE post_id = ?1", params![id_str])?))
      .await?;
    Ok(n > 0)
  }

  // ── Reporting ─────────────────────────────────────────────────────────────

  async fn activity_since(&self, since: DateTime<Utc>) -> Result<ActivityCounts> {
    let since = encode_dt(since);
    let counts = self
      .conn
      .call(move |conn| {
        Ok(ActivityCounts {
          sources:       count(conn, "SELECT COUNT(*) FROM sources WHERE fetched_at >= ?1", &since)?,
          analyses:      count(conn, "SELECT COUNT(*) FROM analyses WHERE created_at >= ?1", &since)?,
          verifications: count_by_status(
            conn,
            "SELECT status, COUNT(*) FROM verifications WHERE created_at >= ?1 GROUP BY status",
            &since,
          )?,
          posts:         count_by_status(
            conn,
            "SELECT status, COUNT(*) FROM posts WHERE created_at >= ?1 GROUP BY status",
            &since,
          )?,
        })
      })
      .await?;
    Ok(counts)
  }
}
