//! Channel adapters used by the publish stage.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use newsdesk_core::{
  build::LINK_PLACEHOLDER,
  post::{Channel, Post, Seo},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ChannelError {
  /// Credentials or endpoint are missing. The channel is skipped, not failed.
  #[error("channel is not configured")]
  NotConfigured,

  #[error("delivery timed out after {0:?}")]
  Timeout(Duration),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("rejected by remote: {0}")]
  Rejected(String),
}

/// Delivers a post to one external channel.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
  fn channel(&self) -> Channel;

  /// Deliver `post`. `link` is the public URL of the post. Returns the
  /// identifier assigned by the remote side, if any.
  async fn deliver(&self, post: &Post, link: &str) -> Result<Option<String>, ChannelError>;
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
  /// Endpoint accepting `POST` of a post document. Unset means posts are
  /// recorded locally under a `cms-<slug>` identifier.
  pub endpoint: Option<String>,
  pub api_key:  Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
  pub token:    Option<String>,
  pub chat_id:  Option<String>,
  pub api_base: String,
}

impl Default for TelegramConfig {
  fn default() -> Self {
    Self { token: None, chat_id: None, api_base: "https://api.telegram.org".to_owned() }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
  /// Upper bound on a single adapter call.
  pub timeout_secs: u64,
  pub cms:          CmsConfig,
  pub telegram:     TelegramConfig,
}

impl Default for ChannelsConfig {
  fn default() -> Self {
    Self {
      timeout_secs: 10,
      cms:          CmsConfig::default(),
      telegram:     TelegramConfig::default(),
    }
  }
}

impl ChannelsConfig {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

// ─── CMS ─────────────────────────────────────────────────────────────────────

pub struct CmsAdapter {
  client: Client,
  config: CmsConfig,
}

impl CmsAdapter {
  pub fn new(client: Client, config: CmsConfig) -> Self { Self { client, config } }
}

#[derive(Serialize)]
struct CmsDocument<'a> {
  slug:   &'a str,
  title:  &'a str,
  html:   &'a str,
  seo:    &'a Seo,
  status: &'static str,
}

#[derive(Deserialize)]
struct CmsCreated {
  id: String,
}

#[async_trait]
impl ChannelAdapter for CmsAdapter {
  fn channel(&self) -> Channel { Channel::Cms }

  async fn deliver(&self, post: &Post, _link: &str) -> Result<Option<String>, ChannelError> {
    let Some(endpoint) = self.config.endpoint.as_deref() else {
      info!(slug = %post.slug, "no CMS endpoint configured; recording locally");
      return Ok(Some(format!("cms-{}", post.slug)));
    };

    let doc = CmsDocument {
      slug:   &post.slug,
      title:  &post.title,
      html:   &post.body_html,
      seo:    &post.seo,
      status: "published",
    };
    let mut req = self.client.post(endpoint).json(&doc);
    if let Some(key) = self.config.api_key.as_deref() {
      req = req.bearer_auth(key);
    }
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(ChannelError::Rejected(format!("{status}: {body}")));
    }
    let created: CmsCreated = resp.json().await?;
    Ok(Some(created.id))
  }
}

// ─── Telegram ────────────────────────────────────────────────────────────────

pub struct TelegramAdapter {
  client: Client,
  config: TelegramConfig,
}

impl TelegramAdapter {
  pub fn new(client: Client, config: TelegramConfig) -> Self { Self { client, config } }
}

#[derive(Serialize)]
struct SendMessage<'a> {
  chat_id:                  &'a str,
  text:                     String,
  parse_mode:               &'static str,
  disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct TelegramReply {
  ok:          bool,
  description: Option<String>,
  result:      Option<TelegramMessage>,
}

#[derive(Deserialize)]
struct TelegramMessage {
  message_id: i64,
}

/// The short-form summary with its link placeholder filled in.
pub fn message_text(post: &Post, link: &str) -> String {
  post.summary.replace(LINK_PLACEHOLDER, link)
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
  fn channel(&self) -> Channel { Channel::Telegram }

  async fn deliver(&self, post: &Post, link: &str) -> Result<Option<String>, ChannelError> {
    let (Some(token), Some(chat_id)) = (self.config.token.as_deref(), self.config.chat_id.as_deref())
    else {
      return Err(ChannelError::NotConfigured);
    };

    let url = format!("{}/bot{token}/sendMessage", self.config.api_base.trim_end_matches('/'));
    let body = SendMessage {
      chat_id,
      text: message_text(post, link),
      parse_mode: "HTML",
      disable_web_page_preview: false,
    };
    let reply: TelegramReply = self.client.post(url).json(&body).send().await?.json().await?;
    if !reply.ok {
      return Err(ChannelError::Rejected(reply.description.unwrap_or_default()));
    }
    Ok(reply.result.map(|m| m.message_id.to_string()))
  }
}

// ─── Set ─────────────────────────────────────────────────────────────────────

/// The adapters available to the publish stage, keyed by channel.
#[derive(Clone, Default)]
pub struct ChannelSet {
  adapters: BTreeMap<Channel, Arc<dyn ChannelAdapter>>,
}

impl ChannelSet {
  pub fn new() -> Self { Self::default() }

  /// CMS and Telegram adapters sharing one HTTP client.
  pub fn from_config(config: &ChannelsConfig) -> Result<Self, ChannelError> {
    let client = Client::builder().timeout(config.timeout()).build()?;
    let mut set = Self::new();
    set.insert(Arc::new(CmsAdapter::new(client.clone(), config.cms.clone())));
    set.insert(Arc::new(TelegramAdapter::new(client, config.telegram.clone())));
    if config.telegram.token.is_none() {
      warn!("telegram credentials not configured; telegram deliveries will be skipped");
    }
    Ok(set)
  }

  pub fn insert(&mut self, adapter: Arc<dyn ChannelAdapter>) -> &mut Self {
    self.adapters.insert(adapter.channel(), adapter);
    self
  }

  pub fn get(&self, channel: Channel) -> Option<&Arc<dyn ChannelAdapter>> {
    self.adapters.get(&channel)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use newsdesk_core::{Topic, post::PostStatus};
  use uuid::Uuid;

  use super::*;

  fn post() -> Post {
    let now = Utc::now();
    Post {
      post_id:           Uuid::new_v4(),
      analysis_id:       Uuid::new_v4(),
      slug:              "it-post".to_owned(),
      topic:             Topic::It,
      title:             "IT market analysis".to_owned(),
      body_html:         "<article></article>".to_owned(),
      summary:           "IT market analysis\n\nFull analysis: {link}".to_owned(),
      seo:               Seo {
        title:       "IT market analysis".to_owned(),
        description: String::new(),
        keywords:    vec!["it".to_owned()],
        og_image:    None,
        schema:      serde_json::json!({}),
      },
      sources:           vec![],
      reliability_score: 70.0,
      status:            PostStatus::Approved,
      cms_id:            None,
      created_at:        now,
      updated_at:        now,
    }
  }

  #[test]
  fn link_placeholder_is_substituted() {
    let text = message_text(&post(), "https://news.example/it-post");
    assert!(text.ends_with("Full analysis: https://news.example/it-post"));
    assert!(!text.contains(LINK_PLACEHOLDER));
  }

  #[tokio::test]
  async fn telegram_without_credentials_is_not_configured() {
    let adapter = TelegramAdapter::new(Client::new(), TelegramConfig::default());
    let err = adapter.deliver(&post(), "https://x").await.unwrap_err();
    assert!(matches!(err, ChannelError::NotConfigured));
  }

  #[tokio::test]
  async fn cms_without_endpoint_records_locally() {
    let adapter = CmsAdapter::new(Client::new(), CmsConfig::default());
    let id = adapter.deliver(&post(), "https://x").await.unwrap();
    assert_eq!(id.as_deref(), Some("cms-it-post"));
  }
}
