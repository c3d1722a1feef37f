//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so that they sort
//! lexically. Structured fields (entities, scenarios, sub-scores, SEO) are
//! stored as compact JSON. Enumerations are stored as their wire codes and
//! validated on read.

use chrono::{DateTime, SecondsFormat, Utc};
use newsdesk_core::{
  Topic,
  analysis::{Analysis, AnalysisItems},
  audit::AuditLog,
  fact::Fact,
  post::{Post, PostStatus},
  source::{ContentHashes, SourceItem},
  verification::{Verification, VerificationStatus},
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

pub fn encode_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

fn decode_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const SOURCE_COLUMNS: &str = "source_id, topic, url, domain, title, excerpt, content, \
   published_at, event_at, language, author, fetched_at, title_hash, content_hash, simhash, \
   normalized_at";

/// Raw strings read directly from a `sources` row.
pub struct RawSource {
  pub source_id:     String,
  pub topic:         String,
  pub url:           String,
  pub domain:        Option<String>,
  pub title:         String,
  pub excerpt:       Option<String>,
  pub content:       Option<String>,
  pub published_at:  Option<String>,
  pub event_at:      Option<String>,
  pub language:      Option<String>,
  pub author:        Option<String>,
  pub fetched_at:    String,
  pub title_hash:    Option<String>,
  pub content_hash:  Option<String>,
  pub simhash:       Option<String>,
  pub normalized_at: Option<String>,
}

impl RawSource {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      source_id:     row.get(0)?,
      topic:         row.get(1)?,
      url:           row.get(2)?,
      domain:        row.get(3)?,
      title:         row.get(4)?,
      excerpt:       row.get(5)?,
      content:       row.get(6)?,
      published_at:  row.get(7)?,
      event_at:      row.get(8)?,
      language:      row.get(9)?,
      author:        row.get(10)?,
      fetched_at:    row.get(11)?,
      title_hash:    row.get(12)?,
      content_hash:  row.get(13)?,
      simhash:       row.get(14)?,
      normalized_at: row.get(15)?,
    })
  }

  pub fn into_source(self) -> Result<SourceItem> {
    let hashes = match (self.title_hash, self.content_hash, self.simhash) {
      (Some(title), Some(content), Some(simhash)) => Some(ContentHashes { title, content, simhash }),
      _ => None,
    };
    Ok(SourceItem {
      source_id: decode_uuid(&self.source_id)?,
      topic: Topic::parse(&self.topic)?,
      url: self.url,
      domain: self.domain,
      title: self.title,
      excerpt: self.excerpt,
      content: self.content,
      published_at: decode_opt_dt(self.published_at)?,
      event_at: decode_opt_dt(self.event_at)?,
      language: self.language,
      author: self.author,
      fetched_at: decode_dt(&self.fetched_at)?,
      hashes,
      normalized_at: decode_opt_dt(self.normalized_at)?,
    })
  }
}

pub const FACT_COLUMNS: &str = "fact_id, source_id, quote, claim, entities, confidence";

/// Raw strings read directly from a `facts` row.
pub struct RawFact {
  pub fact_id:    String,
  pub source_id:  String,
  pub quote:      String,
  pub claim:      Option<String>,
  pub entities:   String,
  pub confidence: f64,
}

impl RawFact {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      fact_id:    row.get(0)?,
      source_id:  row.get(1)?,
      quote:      row.get(2)?,
      claim:      row.get(3)?,
      entities:   row.get(4)?,
      confidence: row.get(5)?,
    })
  }

  pub fn into_fact(self) -> Result<Fact> {
    Ok(Fact {
      fact_id:    decode_uuid(&self.fact_id)?,
      source_id:  decode_uuid(&self.source_id)?,
      quote:      self.quote,
      claim:      self.claim,
      entities:   decode_json(&self.entities)?,
      confidence: self.confidence,
    })
  }
}

pub const ANALYSIS_COLUMNS: &str = "analysis_id, topic, items, thesis, impact_market, winners, \
   losers, scenarios, risks, confidence, created_at";

/// Raw strings read directly from an `analyses` row.
pub struct RawAnalysis {
  pub analysis_id:   String,
  pub topic:         String,
  pub items:         String,
  pub thesis:        Option<String>,
  pub impact_market: Option<String>,
  pub winners:       Option<String>,
  pub losers:        Option<String>,
  pub scenarios:     String,
  pub risks:         String,
  pub confidence:    Option<f64>,
  pub created_at:    String,
}

impl RawAnalysis {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      analysis_id:   row.get(0)?,
      topic:         row.get(1)?,
      items:         row.get(2)?,
      thesis:        row.get(3)?,
      impact_market: row.get(4)?,
      winners:       row.get(5)?,
      losers:        row.get(6)?,
      scenarios:     row.get(7)?,
      risks:         row.get(8)?,
      confidence:    row.get(9)?,
      created_at:    row.get(10)?,
    })
  }

  pub fn into_analysis(self) -> Result<Analysis> {
    let items: AnalysisItems = decode_json(&self.items)?;
    Ok(Analysis {
      analysis_id: decode_uuid(&self.analysis_id)?,
      topic: Topic::parse(&self.topic)?,
      items,
      thesis: self.thesis,
      impact_market: self.impact_market,
      winners: self.winners,
      losers: self.losers,
      scenarios: decode_json(&self.scenarios)?,
      risks: decode_json(&self.risks)?,
      confidence: self.confidence,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const VERIFICATION_COLUMNS: &str =
  "verification_id, analysis_id, checks, reliability_score, issues, status";

/// Raw strings read directly from a `verifications` row.
pub struct RawVerification {
  pub verification_id:   String,
  pub analysis_id:       String,
  pub checks:            String,
  pub reliability_score: f64,
  pub issues:            String,
  pub status:            String,
}

impl RawVerification {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      verification_id:   row.get(0)?,
      analysis_id:       row.get(1)?,
      checks:            row.get(2)?,
      reliability_score: row.get(3)?,
      issues:            row.get(4)?,
      status:            row.get(5)?,
    })
  }

  pub fn into_verification(self) -> Result<Verification> {
    Ok(Verification {
      verification_id:   decode_uuid(&self.verification_id)?,
      analysis_id:       decode_uuid(&self.analysis_id)?,
      checks:            decode_json(&self.checks)?,
      reliability_score: self.reliability_score,
      issues:            decode_json(&self.issues)?,
      status:            VerificationStatus::parse(&self.status)?,
    })
  }
}

pub const POST_COLUMNS: &str = "post_id, analysis_id, slug, topic, title, body_html, summary, \
   seo, sources, reliability_score, status, cms_id, created_at, updated_at";

/// Raw strings read directly from a `posts` row.
pub struct RawPost {
  pub post_id:           String,
  pub analysis_id:       String,
  pub slug:              String,
  pub topic:             String,
  pub title:             String,
  pub body_html:         String,
  pub summary:           String,
  pub seo:               String,
  pub sources:           String,
  pub reliability_score: f64,
  pub status:            String,
  pub cms_id:            Option<String>,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawPost {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      post_id:           row.get(0)?,
      analysis_id:       row.get(1)?,
      slug:              row.get(2)?,
      topic:             row.get(3)?,
      title:             row.get(4)?,
      body_html:         row.get(5)?,
      summary:           row.get(6)?,
      seo:               row.get(7)?,
      sources:           row.get(8)?,
      reliability_score: row.get(9)?,
      status:            row.get(10)?,
      cms_id:            row.get(11)?,
      created_at:        row.get(12)?,
      updated_at:        row.get(13)?,
    })
  }

  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      post_id:           decode_uuid(&self.post_id)?,
      analysis_id:       decode_uuid(&self.analysis_id)?,
      slug:              self.slug,
      topic:             Topic::parse(&self.topic)?,
      title:             self.title,
      body_html:         self.body_html,
      summary:           self.summary,
      seo:               decode_json(&self.seo)?,
      sources:           decode_json(&self.sources)?,
      reliability_score: self.reliability_score,
      status:            PostStatus::parse(&self.status)?,
      cms_id:            self.cms_id,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

pub const AUDIT_COLUMNS: &str = "audit_id, post_id, actor, action, diff, at";

/// Raw strings read directly from an `audit_log` row.
pub struct RawAudit {
  pub audit_id: String,
  pub post_id:  String,
  pub actor:    String,
  pub action:   String,
  pub diff:     String,
  pub at:       String,
}

impl RawAudit {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      audit_id: row.get(0)?,
      post_id:  row.get(1)?,
      actor:    row.get(2)?,
      action:   row.get(3)?,
      diff:     row.get(4)?,
      at:       row.get(5)?,
    })
  }

  pub fn into_audit(self) -> Result<AuditLog> {
    Ok(AuditLog {
      audit_id: decode_uuid(&self.audit_id)?,
      post_id:  decode_uuid(&self.post_id)?,
      actor:    self.actor,
      action:   self.action,
      diff:     decode_json(&self.diff)?,
      at:       decode_dt(&self.at)?,
    })
  }
}
