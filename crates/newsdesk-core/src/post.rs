//! Posts: publishable artifacts derived from exactly one analysis.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::Topic;

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// Editorial lifecycle of a post.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  EnumString,
  EnumIter,
  IntoStaticStr,
  strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PostStatus {
  #[default]
  Draft,
  InReview,
  Approved,
  Published,
}

impl PostStatus {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn parse(s: &str) -> crate::Result<Self> {
    s.parse()
      .map_err(|_| crate::Error::Invalid(format!("unknown post status: {s:?}")))
  }

  /// Whether the editorial workflow allows moving from `self` to `next`.
  ///
  /// `draft → in_review → approved → published`; approval may skip review,
  /// and publishing is allowed from any unpublished state. Nothing leaves
  /// `published`.
  pub fn can_transition_to(self, next: PostStatus) -> bool {
    use PostStatus::*;
    matches!(
      (self, next),
      (Draft, InReview)
        | (Draft, Approved)
        | (InReview, Approved)
        | (Draft | InReview | Approved, Published)
    )
  }
}

// ─── SEO ─────────────────────────────────────────────────────────────────────

/// Mechanically derived search-engine metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seo {
  /// Title truncated to 60 characters.
  pub title:       String,
  /// Thesis truncated to 155 characters.
  pub description: String,
  pub keywords:    Vec<String>,
  pub og_image:    Option<String>,
  /// schema.org JSON-LD object.
  pub schema:      serde_json::Value,
}

// ─── Post ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
  pub post_id:           Uuid,
  /// The analysis this post was built from; at most one post per analysis.
  pub analysis_id:       Uuid,
  /// Globally unique; derived from topic, analysis ID and build date.
  pub slug:              String,
  pub topic:             Topic,
  pub title:             String,
  pub body_html:         String,
  /// Short form for messaging channels; contains a `{link}` placeholder.
  pub summary:           String,
  pub seo:               Seo,
  /// Source IDs inherited from the analysis.
  pub sources:           Vec<Uuid>,
  /// Copied from the verification at build time.
  pub reliability_score: f64,
  pub status:            PostStatus,
  pub cms_id:            Option<String>,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

/// Input to [`crate::store::PipelineStore::insert_post`].
#[derive(Debug, Clone)]
pub struct NewPost {
  pub analysis_id:       Uuid,
  pub slug:              String,
  pub topic:             Topic,
  pub title:             String,
  pub body_html:         String,
  pub summary:           String,
  pub seo:               Seo,
  pub sources:           Vec<Uuid>,
  pub reliability_score: f64,
}

/// Filter for the editor draft listing.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
  pub status:    Option<PostStatus>,
  /// Only posts scoring at least this much.
  pub min_score: Option<f64>,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}

// ─── Channels ────────────────────────────────────────────────────────────────

/// An external publishing target.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  EnumString,
  EnumIter,
  IntoStaticStr,
  strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Channel {
  Cms,
  Telegram,
}

impl Channel {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn parse(s: &str) -> crate::Result<Self> {
    s.parse()
      .map_err(|_| crate::Error::Invalid(format!("unknown channel: {s:?}")))
  }
}

/// A successful delivery to one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
  pub channel:     Channel,
  /// Identifier assigned by the remote side (CMS post ID, message ID).
  pub external_id: Option<String>,
}

/// What happened on one channel during a publish call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChannelOutcome {
  Delivered { external_id: Option<String> },
  Failed { error: String },
  Skipped { reason: String },
}

/// Structured result of the publish stage. Per-channel failures are reported
/// here rather than raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishOutcome {
  pub post_id:  Uuid,
  pub status:   PostStatus,
  pub cms_id:   Option<String>,
  pub channels: BTreeMap<Channel, ChannelOutcome>,
}

impl PublishOutcome {
  /// True if at least one requested channel failed.
  pub fn is_partial_failure(&self) -> bool {
    self
      .channels
      .values()
      .any(|o| matches!(o, ChannelOutcome::Failed { .. }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn workflow_transitions() {
    use PostStatus::*;
    assert!(Draft.can_transition_to(InReview));
    assert!(InReview.can_transition_to(Approved));
    assert!(Draft.can_transition_to(Approved));
    assert!(Approved.can_transition_to(Published));
    assert!(Draft.can_transition_to(Published));
    assert!(!Published.can_transition_to(Draft));
    assert!(!Published.can_transition_to(Published));
    assert!(!Approved.can_transition_to(InReview));
    assert!(!InReview.can_transition_to(Draft));
  }

  #[test]
  fn status_strings_round_trip() {
    assert_eq!(PostStatus::InReview.as_str(), "in_review");
    assert_eq!(PostStatus::parse("in_review").unwrap(), PostStatus::InReview);
    assert!(PostStatus::parse("archived").is_err());
  }

  #[test]
  fn partial_failure_detection() {
    let mut outcome = PublishOutcome {
      post_id:  Uuid::nil(),
      status:   PostStatus::Published,
      cms_id:   Some("cms-1".into()),
      channels: BTreeMap::new(),
    };
    outcome
      .channels
      .insert(Channel::Cms, ChannelOutcome::Delivered { external_id: Some("cms-1".into()) });
    assert!(!outcome.is_partial_failure());
    outcome
      .channels
      .insert(Channel::Telegram, ChannelOutcome::Failed { error: "timeout".into() });
    assert!(outcome.is_partial_failure());
  }
}
