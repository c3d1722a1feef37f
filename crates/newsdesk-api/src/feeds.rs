//! Sitemap and RSS 2.0 feeds over published posts.
//!
//! Generated with `quick-xml`'s writer API; text content is escaped by the
//! writer.

use std::io::Cursor;

use axum::{
  extract::State,
  http::header,
  response::IntoResponse,
};
use newsdesk_core::{
  post::{Post, PostQuery, PostStatus},
  store::PipelineStore,
};
use newsdesk_pipeline::StoreResultExt as _;
use quick_xml::{
  Writer,
  events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::{ApiState, error::ApiError};

const NS_SITEMAP: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Most recent published posts included in a feed.
const FEED_LIMIT: usize = 100;

// ─── Writer helpers ──────────────────────────────────────────────────────────

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn feed_err(e: impl std::fmt::Display) -> ApiError { ApiError::Feed(e.to_string()) }

fn start_document() -> Result<XmlWriter, ApiError> {
  let mut w = Writer::new(Cursor::new(Vec::new()));
  w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    .map_err(feed_err)?;
  Ok(w)
}

fn write_start(w: &mut XmlWriter, el: BytesStart<'_>) -> Result<(), ApiError> {
  w.write_event(Event::Start(el)).map_err(feed_err)
}

fn write_end(w: &mut XmlWriter, tag: &str) -> Result<(), ApiError> {
  w.write_event(Event::End(BytesEnd::new(tag))).map_err(feed_err)
}

fn write_text_elem(w: &mut XmlWriter, tag: &str, text: &str) -> Result<(), ApiError> {
  write_start(w, BytesStart::new(tag))?;
  w.write_event(Event::Text(BytesText::new(text))).map_err(feed_err)?;
  write_end(w, tag)
}

// ─── Documents ───────────────────────────────────────────────────────────────

pub fn post_url(site_url: &str, slug: &str) -> String {
  format!("{}/{}", site_url.trim_end_matches('/'), slug)
}

/// Render a sitemap `urlset` for `posts`.
pub fn sitemap_xml(site_url: &str, posts: &[Post]) -> Result<Vec<u8>, ApiError> {
  let mut w = start_document()?;
  write_start(&mut w, BytesStart::new("urlset").with_attributes([("xmlns", NS_SITEMAP)]))?;
  for post in posts {
    write_start(&mut w, BytesStart::new("url"))?;
    write_text_elem(&mut w, "loc", &post_url(site_url, &post.slug))?;
    write_text_elem(&mut w, "lastmod", &post.updated_at.format("%Y-%m-%d").to_string())?;
    write_end(&mut w, "url")?;
  }
  write_end(&mut w, "urlset")?;
  Ok(w.into_inner().into_inner())
}

/// Render an RSS 2.0 channel for `posts`.
pub fn rss_xml(site_url: &str, site_title: &str, posts: &[Post]) -> Result<Vec<u8>, ApiError> {
  let mut w = start_document()?;
  write_start(&mut w, BytesStart::new("rss").with_attributes([("version", "2.0")]))?;
  write_start(&mut w, BytesStart::new("channel"))?;
  write_text_elem(&mut w, "title", site_title)?;
  write_text_elem(&mut w, "link", site_url)?;
  write_text_elem(&mut w, "description", &format!("{site_title}: published analyses"))?;

  for post in posts {
    let link = post_url(site_url, &post.slug);
    write_start(&mut w, BytesStart::new("item"))?;
    write_text_elem(&mut w, "title", &post.title)?;
    write_text_elem(&mut w, "link", &link)?;
    write_text_elem(&mut w, "guid", &link)?;
    write_text_elem(&mut w, "description", &post.seo.description)?;
    write_text_elem(&mut w, "category", post.topic.label())?;
    write_text_elem(&mut w, "pubDate", &post.updated_at.to_rfc2822())?;
    write_end(&mut w, "item")?;
  }

  write_end(&mut w, "channel")?;
  write_end(&mut w, "rss")?;
  Ok(w.into_inner().into_inner())
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn published<S: PipelineStore + 'static>(state: &ApiState<S>) -> Result<Vec<Post>, ApiError> {
  let query = PostQuery {
    status: Some(PostStatus::Published),
    limit: Some(FEED_LIMIT),
    ..Default::default()
  };
  Ok(state.orchestrator.store().list_posts(&query).await.db()?)
}

/// `GET /v1/feeds/sitemap.xml`
pub async fn sitemap<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
) -> Result<impl IntoResponse, ApiError> {
  let posts = published(&state).await?;
  let body = sitemap_xml(&state.site_url, &posts)?;
  Ok(([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], body))
}

/// `GET /v1/feeds/rss.xml`
pub async fn rss<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
) -> Result<impl IntoResponse, ApiError> {
  let posts = published(&state).await?;
  let body = rss_xml(&state.site_url, &state.site_title, &posts)?;
  Ok(([(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")], body))
}
