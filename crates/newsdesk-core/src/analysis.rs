//! Analyses: synthesized reports over a set of sources for one topic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Topic;

/// The set of inputs an analysis was built from. Always contains the
/// originating source IDs, in the order they were supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisItems {
  pub source_ids: Vec<Uuid>,
}

/// One forward-looking scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
  /// e.g. `"1m"`, `"3m"`.
  pub horizon:    String,
  /// Case label, e.g. `"base"`, `"bull"`, `"bear"`.
  pub case:       String,
  /// Likelihood in `[0, 1]`.
  pub likelihood: f64,
  pub text:       String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
  pub analysis_id:   Uuid,
  pub topic:         Topic,
  pub items:         AnalysisItems,
  pub thesis:        Option<String>,
  pub impact_market: Option<String>,
  pub winners:       Option<String>,
  pub losers:        Option<String>,
  pub scenarios:     Vec<Scenario>,
  pub risks:         Vec<String>,
  /// Overall model confidence in `[0, 1]`, if the analyst reported one.
  pub confidence:    Option<f64>,
  pub created_at:    DateTime<Utc>,
}

impl Analysis {
  pub fn source_ids(&self) -> &[Uuid] { &self.items.source_ids }
}

/// Narrative content produced by the analyst collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisDraft {
  pub thesis:        Option<String>,
  pub impact_market: Option<String>,
  pub winners:       Option<String>,
  pub losers:        Option<String>,
  #[serde(default)]
  pub scenarios:     Vec<Scenario>,
  #[serde(default)]
  pub risks:         Vec<String>,
  pub confidence:    Option<f64>,
}

/// Input to [`crate::store::PipelineStore::insert_analysis`].
#[derive(Debug, Clone)]
pub struct NewAnalysis {
  pub topic:      Topic,
  pub source_ids: Vec<Uuid>,
  pub draft:      AnalysisDraft,
}
