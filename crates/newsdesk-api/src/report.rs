use axum::{Json, extract::State};
use chrono::{DateTime, Duration, Utc};
use newsdesk_core::store::{ActivityCounts, PipelineStore};
use newsdesk_pipeline::StoreResultExt as _;
use serde::{Deserialize, Serialize};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Serialize, Deserialize)]
pub struct DailyReport {
  pub since:  DateTime<Utc>,
  pub until:  DateTime<Utc>,
  #[serde(flatten)]
  pub counts: ActivityCounts,
}

/// `GET /v1/report/daily`: activity over the last 24 hours.
pub async fn daily<S: PipelineStore + 'static>(
  State(state): State<ApiState<S>>,
) -> Result<Json<DailyReport>, ApiError> {
  let until = Utc::now();
  let since = until - Duration::hours(24);
  let counts = state.orchestrator.store().activity_since(since).await.db()?;
  Ok(Json(DailyReport { since, until, counts }))
}
