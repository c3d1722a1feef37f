//! Verification records and the verification state machine.
//!
//! An analysis starts out unverified (no row). Verifying it writes exactly
//! one row whose status is terminal: passed, flagged or failed. Rows are
//! never updated; a second verification of the same analysis is rejected.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

/// Terminal outcome of a verification.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  EnumString,
  EnumIter,
  IntoStaticStr,
  strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationStatus {
  Passed,
  Flagged,
  Failed,
}

impl VerificationStatus {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn parse(s: &str) -> crate::Result<Self> {
    s.parse()
      .map_err(|_| crate::Error::Invalid(format!("unknown verification status: {s:?}")))
  }
}

/// The verification state of an analysis, derived from whether a row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "status", rename_all = "snake_case")]
pub enum VerificationState {
  Unverified,
  Verified(VerificationStatus),
}

impl VerificationState {
  pub fn of(verification: Option<&Verification>) -> Self {
    match verification {
      Some(v) => Self::Verified(v.status),
      None => Self::Unverified,
    }
  }
}

/// The five named sub-scores, each in `[0, 100]`.
///
/// Serialised with the single-letter keys used in the stored breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
  /// Source diversity / freshness.
  #[serde(rename = "S")]
  pub source:       f64,
  /// Cross-source consistency.
  #[serde(rename = "C")]
  pub consistency:  f64,
  /// Transparency: quotes and attribution present.
  #[serde(rename = "T")]
  pub transparency: f64,
  /// Model-confidence proxy.
  #[serde(rename = "M")]
  pub model:        f64,
  /// Fact-check heuristic pass rate.
  #[serde(rename = "F")]
  pub fact_check:   f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
  pub verification_id:   Uuid,
  pub analysis_id:       Uuid,
  pub checks:            SubScores,
  /// Composite score in `[0, 100]`.
  pub reliability_score: f64,
  pub issues:            Vec<String>,
  pub status:            VerificationStatus,
}

/// Input to [`crate::store::PipelineStore::insert_verification`].
#[derive(Debug, Clone)]
pub struct NewVerification {
  pub analysis_id:       Uuid,
  pub checks:            SubScores,
  pub reliability_score: f64,
  pub issues:            Vec<String>,
  pub status:            VerificationStatus,
}
