//! Research and analyst collaborators.
//!
//! Both are opaque to the pipeline: the ingest stage asks a
//! [`ResearchProvider`] for raw items, the analyze stage asks an [`Analyst`]
//! for narrative content. Each comes in an HTTP flavour that talks to a JSON
//! endpoint and an offline flavour that produces deterministic placeholder
//! content.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use newsdesk_core::{
  Error, Result, Topic,
  analysis::{AnalysisDraft, Scenario},
  build::slugify,
  fact::Fact,
  source::{RawItem, SourceItem},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[async_trait]
pub trait ResearchProvider: Send + Sync {
  /// Latest items for `topic` within the last `window_hours`.
  async fn fetch(&self, topic: Topic, window_hours: u32) -> Result<Vec<RawItem>>;
}

#[async_trait]
pub trait Analyst: Send + Sync {
  /// Synthesise an analysis of `sources` (with their extracted `facts`).
  async fn analyze(
    &self,
    topic: Topic,
    sources: &[SourceItem],
    facts: &[Fact],
  ) -> Result<AnalysisDraft>;
}

/// Endpoint settings shared by the HTTP collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
  /// Base URL of the JSON endpoint. Unset selects the offline implementation.
  pub endpoint:     Option<String>,
  pub api_key:      Option<String>,
  pub timeout_secs: Option<u64>,
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn build_client(config: &EndpointConfig) -> Result<Client> {
  Client::builder()
    .timeout(config.timeout_secs.map_or(DEFAULT_TIMEOUT, Duration::from_secs))
    .build()
    .map_err(|e| Error::TransientIo(format!("failed to build HTTP client: {e}")))
}

fn http_error(what: &str, err: reqwest::Error) -> Error {
  if err.is_decode() {
    Error::Invalid(format!("{what}: undecodable response: {err}"))
  } else {
    Error::TransientIo(format!("{what}: {err}"))
  }
}

async fn post_json<B: Serialize + Sync, T: serde::de::DeserializeOwned>(
  client: &Client,
  url: &str,
  api_key: Option<&str>,
  body: &B,
  what: &str,
) -> Result<T> {
  let mut req = client.post(url).json(body);
  if let Some(key) = api_key {
    req = req.bearer_auth(key);
  }
  let resp = req.send().await.map_err(|e| http_error(what, e))?;

  let status = resp.status();
  if status.is_server_error() || status.as_u16() == 429 {
    return Err(Error::TransientIo(format!("{what} → {status}")));
  }
  if !status.is_success() {
    return Err(Error::Invalid(format!("{what} → {status}")));
  }
  resp.json().await.map_err(|e| http_error(what, e))
}

// ─── HTTP ────────────────────────────────────────────────────────────────────

/// Research provider behind `POST {endpoint}` with
/// `{"topic": "...", "window_hours": N}`, answering with a JSON array of items.
#[derive(Clone)]
pub struct HttpResearchProvider {
  client:   Client,
  endpoint: String,
  api_key:  Option<String>,
}

impl HttpResearchProvider {
  pub fn new(endpoint: impl Into<String>, config: &EndpointConfig) -> Result<Self> {
    Ok(Self {
      client:   build_client(config)?,
      endpoint: endpoint.into(),
      api_key:  config.api_key.clone(),
    })
  }
}

#[derive(Serialize)]
struct FetchRequest {
  topic:        Topic,
  window_hours: u32,
}

#[async_trait]
impl ResearchProvider for HttpResearchProvider {
  async fn fetch(&self, topic: Topic, window_hours: u32) -> Result<Vec<RawItem>> {
    let items: Vec<RawItem> = post_json(
      &self.client,
      &self.endpoint,
      self.api_key.as_deref(),
      &FetchRequest { topic, window_hours },
      "research provider",
    )
    .await?;
    debug!(%topic, count = items.len(), "research provider answered");
    Ok(items)
  }
}

/// Analyst behind `POST {endpoint}`, answering with an [`AnalysisDraft`].
#[derive(Clone)]
pub struct HttpAnalyst {
  client:   Client,
  endpoint: String,
  api_key:  Option<String>,
}

impl HttpAnalyst {
  pub fn new(endpoint: impl Into<String>, config: &EndpointConfig) -> Result<Self> {
    Ok(Self {
      client:   build_client(config)?,
      endpoint: endpoint.into(),
      api_key:  config.api_key.clone(),
    })
  }
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
  topic:   Topic,
  sources: &'a [SourceItem],
  facts:   &'a [Fact],
}

#[async_trait]
impl Analyst for HttpAnalyst {
  async fn analyze(
    &self,
    topic: Topic,
    sources: &[SourceItem],
    facts: &[Fact],
  ) -> Result<AnalysisDraft> {
    post_json(
      &self.client,
      &self.endpoint,
      self.api_key.as_deref(),
      &AnalyzeRequest { topic, sources, facts },
      "analyst",
    )
    .await
  }
}

// ─── Offline ─────────────────────────────────────────────────────────────────

/// Produces one placeholder item per call. URLs carry the fetch time so
/// repeated runs ingest distinct items.
#[derive(Debug, Clone, Default)]
pub struct OfflineResearch;

#[async_trait]
impl ResearchProvider for OfflineResearch {
  async fn fetch(&self, topic: Topic, window_hours: u32) -> Result<Vec<RawItem>> {
    let now = Utc::now();
    info!(%topic, window_hours, "offline research provider in use");
    Ok(vec![RawItem {
      url:          format!(
        "https://example.com/{}/{}",
        slugify(topic.code()),
        now.timestamp_micros()
      ),
      title:        format!("{} sector update {}", topic.label(), now.format("%Y-%m-%d %H:%M:%S")),
      excerpt:      None,
      content:      Some(format!(
        "<p>Analysts said demand in the {label} sector grew 4% over the last \
         {window_hours} hours.</p><p>Regulators reported that 12 companies filed \
         new disclosures this week.</p>",
        label = topic.label(),
      )),
      published_at: Some(now),
      event_at:     Some(now - ChronoDuration::hours(1)),
      language:     None,
      author:       None,
    }])
  }
}

/// Deterministic analyst: the same topic always yields the same draft.
#[derive(Debug, Clone, Default)]
pub struct OfflineAnalyst;

#[async_trait]
impl Analyst for OfflineAnalyst {
  async fn analyze(
    &self,
    topic: Topic,
    sources: &[SourceItem],
    _facts: &[Fact],
  ) -> Result<AnalysisDraft> {
    info!(%topic, sources = sources.len(), "offline analyst in use");
    let scenario = |case: &str, likelihood: f64, text: &str| Scenario {
      horizon: "1m".to_owned(),
      case: case.to_owned(),
      likelihood,
      text: text.to_owned(),
    };
    Ok(AnalysisDraft {
      thesis:        Some(format!(
        "Summary of the key {} events and their effect on the sector.",
        topic.label()
      )),
      impact_market: Some("Moderate market impact with upside potential.".to_owned()),
      winners:       Some("Large listed companies with disciplined cost control.".to_owned()),
      losers:        Some("Small players carrying heavy debt.".to_owned()),
      scenarios:     vec![
        scenario("base", 0.6, "The market stays stable against current events."),
        scenario("bull", 0.25, "Demand grows and sector leaders gain."),
        scenario("bear", 0.15, "Regulatory risk and shrinking margins weigh on the market."),
      ],
      risks:         vec!["Rising interest rates".to_owned(), "Political restrictions".to_owned()],
      confidence:    Some(0.75),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn offline_research_urls_are_distinct() {
    let a = OfflineResearch.fetch(Topic::OilGas, 6).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let b = OfflineResearch.fetch(Topic::OilGas, 6).await.unwrap();
    assert_eq!(a.len(), 1);
    assert!(a[0].url.starts_with("https://example.com/o-g/"));
    assert_ne!(a[0].url, b[0].url);
  }

  #[tokio::test]
  async fn offline_analyst_is_deterministic() {
    let a = OfflineAnalyst.analyze(Topic::It, &[], &[]).await.unwrap();
    let b = OfflineAnalyst.analyze(Topic::It, &[], &[]).await.unwrap();
    assert_eq!(a.thesis, b.thesis);
    assert_eq!(a.scenarios, b.scenarios);
    let total: f64 = a.scenarios.iter().map(|s| s.likelihood).sum();
    assert!((total - 1.0).abs() < 1e-9);
  }
}
