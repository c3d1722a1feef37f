//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use newsdesk_core::ErrorKind;
use newsdesk_pipeline::{JobError, dispatch::DispatchError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Pipeline(#[from] newsdesk_core::Error),

  #[error(transparent)]
  Job(#[from] JobError),

  #[error(transparent)]
  Dispatch(#[from] DispatchError),

  #[error("feed rendering failed: {0}")]
  Feed(String),
}

fn kind_status(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
    ErrorKind::Conflict => StatusCode::CONFLICT,
    ErrorKind::Invalid => StatusCode::BAD_REQUEST,
    ErrorKind::TransientIo | ErrorKind::Crashed => StatusCode::SERVICE_UNAVAILABLE,
    ErrorKind::Computation => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let message = self.to_string();
    let (status, body) = match &self {
      ApiError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": message })),
      ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
      ApiError::Pipeline(e) => {
        (kind_status(e.kind()), json!({ "error": message, "kind": e.kind() }))
      }
      ApiError::Job(JobError::Failed(f)) => {
        (kind_status(f.kind), json!({ "error": f.message, "kind": f.kind }))
      }
      ApiError::Job(JobError::Timeout(job_id)) => (
        StatusCode::GATEWAY_TIMEOUT,
        json!({ "error": message, "job_id": job_id }),
      ),
      ApiError::Job(JobError::Lost(_) | JobError::Dispatch(_)) | ApiError::Dispatch(_) => {
        (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": message }))
      }
      ApiError::Job(JobError::Decode(_)) | ApiError::Feed(_) => {
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
      }
    };
    if status.is_server_error() {
      tracing::error!(%status, error = %message, "request failed");
    }
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use newsdesk_core::{Entity, Error};
  use newsdesk_pipeline::dispatch::JobFailure;
  use uuid::Uuid;

  use super::*;

  #[test]
  fn taxonomy_maps_to_status_codes() {
    let cases = [
      (ApiError::from(Error::not_found(Entity::Post, Uuid::nil())), StatusCode::NOT_FOUND),
      (Error::PreconditionFailed("unverified".into()).into(), StatusCode::PRECONDITION_FAILED),
      (Error::Conflict("dup".into()).into(), StatusCode::CONFLICT),
      (Error::TransientIo("disk".into()).into(), StatusCode::SERVICE_UNAVAILABLE),
      (Error::Computation("nan".into()).into(), StatusCode::INTERNAL_SERVER_ERROR),
      (
        JobError::Failed(JobFailure::new(ErrorKind::Crashed, "worker died")).into(),
        StatusCode::SERVICE_UNAVAILABLE,
      ),
      (JobError::Timeout(Uuid::nil()).into(), StatusCode::GATEWAY_TIMEOUT),
    ];
    for (err, status) in cases {
      assert_eq!(err.into_response().status(), status);
    }
  }
}
