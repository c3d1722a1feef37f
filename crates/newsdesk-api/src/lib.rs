//! JSON REST API for newsdesk.
//!
//! Exposes an axum [`Router`] that triggers pipeline stages through the
//! orchestrator and reads posts back from any
//! [`newsdesk_core::store::PipelineStore`]. Transport and auth concerns are
//! the caller's responsibility.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/v1/ingest/run` | 202 + job id |
//! | `POST` | `/v1/sources/{id}/process` | normalize, dedupe, index facts |
//! | `POST` | `/v1/analysis/build` | waits for analyze, queues verify |
//! | `POST` | `/v1/analysis/{id}/verify` | waits for verify |
//! | `POST` | `/v1/post/build` | waits for build |
//! | `POST` | `/v1/post/submit`, `/v1/post/approve` | editorial workflow |
//! | `POST` | `/v1/post/publish` | 200 with per-channel outcomes |
//! | `GET`  | `/v1/posts/{id}`, `/v1/posts/{id}/audit` | |
//! | `GET`  | `/v1/editor/drafts` | `?status&min_score` |
//! | `GET`  | `/v1/jobs/{id}` | job snapshot |
//! | `GET`  | `/v1/feeds/sitemap.xml`, `/v1/feeds/rss.xml` | published posts |
//! | `GET`  | `/v1/report/daily` | last 24 hours |

pub mod error;
pub mod feeds;
pub mod pipeline;
pub mod posts;
pub mod report;

use axum::{
  Router,
  routing::{get, post},
};
use newsdesk_core::store::PipelineStore;
use newsdesk_pipeline::Orchestrator;

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub orchestrator: Orchestrator<S>,
  /// Public base URL of the site, used for feed links.
  pub site_url:     String,
  /// Title of the RSS channel.
  pub site_title:   String,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      orchestrator: self.orchestrator.clone(),
      site_url:     self.site_url.clone(),
      site_title:   self.site_title.clone(),
    }
  }
}

/// Build the API router for `state`.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: PipelineStore + 'static,
{
  Router::new()
    // Pipeline
    .route("/v1/ingest/run", post(pipeline::ingest::<S>))
    .route("/v1/sources/{id}/process", post(pipeline::process_source::<S>))
    .route("/v1/analysis/build", post(pipeline::build_analysis::<S>))
    .route("/v1/analysis/{id}/verify", post(pipeline::verify::<S>))
    .route("/v1/post/build", post(pipeline::build_post::<S>))
    .route("/v1/post/publish", post(pipeline::publish::<S>))
    .route("/v1/jobs/{id}", get(pipeline::job::<S>))
    // Posts
    .route("/v1/post/submit", post(posts::submit::<S>))
    .route("/v1/post/approve", post(posts::approve::<S>))
    .route("/v1/posts/{id}", get(posts::get_one::<S>))
    .route("/v1/posts/{id}/audit", get(posts::audit::<S>))
    .route("/v1/editor/drafts", get(posts::drafts::<S>))
    // Feeds and reporting
    .route("/v1/feeds/sitemap.xml", get(feeds::sitemap::<S>))
    .route("/v1/feeds/rss.xml", get(feeds::rss::<S>))
    .route("/v1/report/daily", get(report::daily::<S>))
    .with_state(state)
}
