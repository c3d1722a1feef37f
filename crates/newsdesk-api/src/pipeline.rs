//! Handlers that trigger pipeline stages.
//!
//! Ingest is fire-and-forget and answers with a job id. The other endpoints
//! wait for their stage up to the configured synchronous timeout; on timeout
//! they answer 504 with the job id, and the job keeps running.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use newsdesk_core::{Topic, post::{Channel, PublishOutcome}, store::PipelineStore, verification::Verification};
use newsdesk_pipeline::{
  JobSnapshot,
  orchestrator::SourceReport,
  stages::{
    Analyze, AnalysisRef, AnalyzeInput, Build, Ingest, IngestInput, MAX_WINDOW_HOURS,
    MIN_WINDOW_HOURS, PostRef, PublishInput, Verify,
  },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── Ingest ───────────────────────────────────────────────────────────────────

fn default_window() -> u32 { 6 }

#[derive(Debug, Deserialize)]
pub struct IngestBody {
  pub topic:        Topic,
  #[serde(default = "default_window")]
  pub window_hours: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobAccepted {
  pub job_id: Uuid,
}

/// `POST /v1/ingest/run`: body `{"topic":"it","window_hours":6}`
pub async fn ingest<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
  Json(body): Json<IngestBody>,
) -> Result<impl IntoResponse, ApiError> {
  if !(MIN_WINDOW_HOURS..=MAX_WINDOW_HOURS).contains(&body.window_hours) {
    return Err(ApiError::BadRequest(format!(
      "window_hours must be between {MIN_WINDOW_HOURS} and {MAX_WINDOW_HOURS}"
    )));
  }
  let handle = state
    .orchestrator
    .dispatcher()
    .enqueue::<Ingest>(IngestInput { topic: body.topic, window_hours: body.window_hours })
    .await?;
  Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id: handle.job_id() })))
}

// ─── Sources ──────────────────────────────────────────────────────────────────

/// `POST /v1/sources/{id}/process`
pub async fn process_source<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SourceReport>, ApiError> {
  Ok(Json(state.orchestrator.process_source(id).await?))
}

// ─── Analysis ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalysisBody {
  pub topic:      Topic,
  pub source_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisCreated {
  pub analysis_id:   Uuid,
  pub verify_job_id: Uuid,
}

/// `POST /v1/analysis/build`: waits for the analysis, then queues its
/// verification without waiting for it.
pub async fn build_analysis<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
  Json(body): Json<AnalysisBody>,
) -> Result<Json<AnalysisCreated>, ApiError> {
  let orch = &state.orchestrator;
  let analysis = orch
    .run_stage_with::<Analyze>(
      AnalyzeInput { topic: body.topic, source_ids: body.source_ids },
      orch.config().sync_timeout(),
    )
    .await?;
  let verify = orch.dispatcher().enqueue::<Verify>(analysis).await?;
  Ok(Json(AnalysisCreated {
    analysis_id:   analysis.analysis_id,
    verify_job_id: verify.job_id(),
  }))
}

/// `POST /v1/analysis/{id}/verify`: 409 if the analysis is already verified.
pub async fn verify<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Verification>, ApiError> {
  let orch = &state.orchestrator;
  let verification = orch
    .run_stage_with::<Verify>(AnalysisRef { analysis_id: id }, orch.config().sync_timeout())
    .await?;
  Ok(Json(verification))
}

// ─── Posts ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BuildBody {
  pub analysis_id: Uuid,
}

/// `POST /v1/post/build`
pub async fn build_post<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
  Json(body): Json<BuildBody>,
) -> Result<impl IntoResponse, ApiError> {
  let orch = &state.orchestrator;
  let post: PostRef = orch
    .run_stage_with::<Build>(
      AnalysisRef { analysis_id: body.analysis_id },
      orch.config().sync_timeout(),
    )
    .await?;
  Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Debug, Deserialize)]
pub struct PublishBody {
  pub post_id:  Uuid,
  pub channels: Vec<Channel>,
  pub actor:    Option<String>,
}

/// `POST /v1/post/publish`: 200 even when some channels failed; the body
/// carries the outcome of every channel.
pub async fn publish<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
  Json(body): Json<PublishBody>,
) -> Result<Json<PublishOutcome>, ApiError> {
  if body.channels.is_empty() {
    return Err(ApiError::BadRequest("at least one channel is required".into()));
  }
  let outcome = state
    .orchestrator
    .publish(PublishInput { post_id: body.post_id, channels: body.channels, actor: body.actor })
    .await?;
  Ok(Json(outcome))
}

// ─── Jobs ─────────────────────────────────────────────────────────────────────

/// `GET /v1/jobs/{id}`
pub async fn job<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<JobSnapshot>, ApiError> {
  state
    .orchestrator
    .dispatcher()
    .snapshot(id)
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("job {id} not found")))
}
