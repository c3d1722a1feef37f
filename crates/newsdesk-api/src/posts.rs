//! Post handlers: editorial transitions, reads and the editor listing.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use newsdesk_core::{
  Entity, Error,
  audit::AuditLog,
  post::{Post, PostQuery, PostStatus},
  store::PipelineStore,
};
use newsdesk_pipeline::StoreResultExt as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// Actor recorded when a transition request names none.
const DEFAULT_EDITOR: &str = "editor";

const MAX_PAGE: usize = 200;

// ─── Transitions ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
  pub post_id: Uuid,
  pub actor:   Option<String>,
}

async fn transition<S: PipelineStore + 'static>(
  state: &ApiState<S>,
  body: TransitionBody,
  next: PostStatus,
) -> Result<Json<Post>, ApiError> {
  let actor = body.actor.unwrap_or_else(|| DEFAULT_EDITOR.to_owned());
  let post = state
    .orchestrator
    .store()
    .transition_post(body.post_id, next, actor.clone())
    .await
    .db()?;
  tracing::info!(post_id = %post.post_id, status = %post.status, %actor, "post transitioned");
  Ok(Json(post))
}

/// `POST /v1/post/submit`: draft → in_review
pub async fn submit<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
  Json(body): Json<TransitionBody>,
) -> Result<Json<Post>, ApiError> {
  transition(&state, body, PostStatus::InReview).await
}

/// `POST /v1/post/approve`: draft or in_review → approved
pub async fn approve<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
  Json(body): Json<TransitionBody>,
) -> Result<Json<Post>, ApiError> {
  transition(&state, body, PostStatus::Approved).await
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /v1/posts/{id}`
pub async fn get_one<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Post>, ApiError> {
  let post = state.orchestrator.store().get_post(id).await.db()?;
  post
    .map(Json)
    .ok_or_else(|| Error::not_found(Entity::Post, id).into())
}

/// `GET /v1/posts/{id}/audit`
pub async fn audit<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditLog>>, ApiError> {
  let store = state.orchestrator.store();
  if store.get_post(id).await.db()?.is_none() {
    return Err(Error::not_found(Entity::Post, id).into());
  }
  Ok(Json(store.audit_log(id).await.db()?))
}

// ─── Editor listing ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DraftsParams {
  pub status:    Option<PostStatus>,
  pub min_score: Option<f64>,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}

/// One row of the editor listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct DraftRow {
  pub post_id:           Uuid,
  pub slug:              String,
  pub title:             String,
  pub status:            PostStatus,
  pub reliability_score: f64,
  pub created_at:        DateTime<Utc>,
}

impl From<Post> for DraftRow {
  fn from(p: Post) -> Self {
    Self {
      post_id:           p.post_id,
      slug:              p.slug,
      title:             p.title,
      status:            p.status,
      reliability_score: p.reliability_score,
      created_at:        p.created_at,
    }
  }
}

/// `GET /v1/editor/drafts?status=in_review&min_score=0`: newest first.
pub async fn drafts<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
  Query(params): Query<DraftsParams>,
) -> Result<Json<Vec<DraftRow>>, ApiError> {
  let min_score = params.min_score.unwrap_or(0.0);
  if !(0.0..=100.0).contains(&min_score) {
    return Err(ApiError::BadRequest("min_score must be between 0 and 100".into()));
  }
  let query = PostQuery {
    status:    Some(params.status.unwrap_or(PostStatus::InReview)),
    min_score: Some(min_score),
    limit:     Some(params.limit.unwrap_or(MAX_PAGE).min(MAX_PAGE)),
    offset:    params.offset,
  };
  let posts = state.orchestrator.store().list_posts(&query).await.db()?;
  Ok(Json(posts.into_iter().map(DraftRow::from).collect()))
}
