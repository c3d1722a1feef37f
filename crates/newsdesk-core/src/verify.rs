//! Reliability scoring.
//!
//! An analysis is scored on five sub-scores in `[0, 100]`:
//!
//! | Key | Sub-score | Computed from |
//! |-----|-----------|---------------|
//! | S | source diversity | `min(1, n_sources / K) * 100` |
//! | C | cross-source consistency | mean pairwise entity overlap between sources |
//! | T | transparency | attribution (author) and quotable claims per source |
//! | M | model confidence | the analyst's reported confidence |
//! | F | fact check | share of extracted facts above the confidence floor |
//!
//! The composite is the weighted sum of the sub-scores; weights come from
//! [`VerifierConfig`] and must sum to 1.0. The composite is then thresholded
//! into passed / flagged / failed.
//!
//! A sub-score that cannot be computed (a cited source is missing, the model
//! confidence is absent or out of range) aborts the assessment with
//! [`Error::Computation`]; no default is substituted.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  Error,
  Result,
  analysis::Analysis,
  fact::Fact,
  normalize::fold,
  source::SourceItem,
  verification::{NewVerification, SubScores, VerificationStatus},
};

const WEIGHT_TOLERANCE: f64 = 1e-6;
const SCENARIO_TOLERANCE: f64 = 0.05;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Weight of each sub-score in the composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
  pub source:       f64,
  pub consistency:  f64,
  pub transparency: f64,
  pub model:        f64,
  pub fact_check:   f64,
}

impl Default for Weights {
  fn default() -> Self {
    Self {
      source:       0.30,
      consistency:  0.25,
      transparency: 0.15,
      model:        0.20,
      fact_check:   0.10,
    }
  }
}

impl Weights {
  fn named(&self) -> [(&'static str, f64); 5] {
    [
      ("source", self.source),
      ("consistency", self.consistency),
      ("transparency", self.transparency),
      ("model", self.model),
      ("fact_check", self.fact_check),
    ]
  }

  pub fn sum(&self) -> f64 { self.named().iter().map(|(_, w)| w).sum() }

  /// Weighted sum of `scores`.
  pub fn apply(&self, scores: &SubScores) -> f64 {
    self.source * scores.source
      + self.consistency * scores.consistency
      + self.transparency * scores.transparency
      + self.model * scores.model
      + self.fact_check * scores.fact_check
  }
}

/// Tunables of the verifier. Every field has a default; any subset may be
/// overridden from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
  pub weights:                    Weights,
  /// Composite at or above this is `passed`.
  pub passed_threshold:           f64,
  /// Composite at or above this (and below `passed_threshold`) is `flagged`.
  pub flagged_threshold:          f64,
  /// Source count at which the source sub-score saturates at 100 (`K`).
  pub saturation_sources:         u32,
  /// Facts below this extraction confidence fail the fact check.
  pub fact_confidence_floor:      f64,
  /// Mean entity overlap that earns a full consistency score.
  pub consistency_target_overlap: f64,
  /// Consistency score used when fewer than two sources carry entities.
  pub single_source_consistency:  f64,
}

impl Default for VerifierConfig {
  fn default() -> Self {
    Self {
      weights:                    Weights::default(),
      passed_threshold:           65.0,
      flagged_threshold:          50.0,
      saturation_sources:         5,
      fact_confidence_floor:      0.5,
      consistency_target_overlap: 0.25,
      single_source_consistency:  50.0,
    }
  }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
  #[error("verifier weights must sum to 1.0, got {0}")]
  WeightSum(f64),

  #[error("verifier weight {0} must be a finite, non-negative number, got {1}")]
  BadWeight(&'static str, f64),

  #[error("invalid verifier thresholds: {0}")]
  Thresholds(String),

  #[error("saturation_sources must be at least 1")]
  Saturation,

  #[error("invalid verifier setting {0}: {1}")]
  Setting(&'static str, f64),
}

impl VerifierConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    for (name, w) in self.weights.named() {
      if !w.is_finite() || w < 0.0 {
        return Err(ConfigError::BadWeight(name, w));
      }
    }
    let sum = self.weights.sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
      return Err(ConfigError::WeightSum(sum));
    }

    let in_range = |t: f64| t.is_finite() && (0.0..=100.0).contains(&t);
    if !in_range(self.passed_threshold) || !in_range(self.flagged_threshold) {
      return Err(ConfigError::Thresholds("thresholds must lie in [0, 100]".into()));
    }
    if self.flagged_threshold > self.passed_threshold {
      return Err(ConfigError::Thresholds(format!(
        "flagged_threshold ({}) exceeds passed_threshold ({})",
        self.flagged_threshold, self.passed_threshold
      )));
    }
    if self.saturation_sources == 0 {
      return Err(ConfigError::Saturation);
    }
    if !(0.0..=1.0).contains(&self.fact_confidence_floor) {
      return Err(ConfigError::Setting("fact_confidence_floor", self.fact_confidence_floor));
    }
    if !(self.consistency_target_overlap > 0.0 && self.consistency_target_overlap <= 1.0) {
      return Err(ConfigError::Setting(
        "consistency_target_overlap",
        self.consistency_target_overlap,
      ));
    }
    if !in_range(self.single_source_consistency) {
      return Err(ConfigError::Setting(
        "single_source_consistency",
        self.single_source_consistency,
      ));
    }
    Ok(())
  }
}

// ─── Pure scoring functions ──────────────────────────────────────────────────

/// Source sub-score: monotonic in `n_sources`, exactly 100 once `n_sources`
/// reaches `saturation`.
pub fn source_score(n_sources: usize, saturation: u32) -> f64 {
  if n_sources as u64 >= u64::from(saturation) {
    return 100.0;
  }
  (n_sources as f64 / f64::from(saturation)).min(1.0) * 100.0
}

/// Map a composite score onto a status. A pure function of its inputs.
pub fn classify(score: f64, passed_threshold: f64, flagged_threshold: f64) -> VerificationStatus {
  if score >= passed_threshold {
    VerificationStatus::Passed
  } else if score >= flagged_threshold {
    VerificationStatus::Flagged
  } else {
    VerificationStatus::Failed
  }
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
  let union = a.union(b).count();
  if union == 0 {
    return 0.0;
  }
  a.intersection(b).count() as f64 / union as f64
}

// ─── Evidence & assessment ───────────────────────────────────────────────────

/// Everything the verifier looks at for one analysis.
#[derive(Debug, Clone, Copy)]
pub struct Evidence<'a> {
  pub analysis: &'a Analysis,
  /// The sources cited by the analysis, as loaded from the store.
  pub sources:  &'a [SourceItem],
  /// Facts of those sources.
  pub facts:    &'a [Fact],
}

/// Outcome of scoring one analysis; not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
  pub checks:            SubScores,
  pub reliability_score: f64,
  pub issues:            Vec<String>,
  pub status:            VerificationStatus,
}

impl Assessment {
  pub fn into_new_verification(self, analysis_id: Uuid) -> NewVerification {
    NewVerification {
      analysis_id,
      checks: self.checks,
      reliability_score: self.reliability_score,
      issues: self.issues,
      status: self.status,
    }
  }
}

/// Scores analyses against a validated [`VerifierConfig`].
#[derive(Debug, Clone)]
pub struct Verifier {
  config: VerifierConfig,
}

impl Default for Verifier {
  fn default() -> Self { Self { config: VerifierConfig::default() } }
}

impl Verifier {
  pub fn new(config: VerifierConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    Ok(Self { config })
  }

  pub fn config(&self) -> &VerifierConfig { &self.config }

  /// Combine already-computed sub-scores into an assessment.
  pub fn score(&self, checks: SubScores, issues: Vec<String>) -> Result<Assessment> {
    let named = [
      ("S", checks.source),
      ("C", checks.consistency),
      ("T", checks.transparency),
      ("M", checks.model),
      ("F", checks.fact_check),
    ];
    for (key, value) in named {
      if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(Error::Computation(format!(
          "sub-score {key} out of range: {value}"
        )));
      }
    }

    let reliability_score = self.config.weights.apply(&checks).clamp(0.0, 100.0);
    let status = classify(
      reliability_score,
      self.config.passed_threshold,
      self.config.flagged_threshold,
    );
    Ok(Assessment { checks, reliability_score, issues, status })
  }

  /// Compute every sub-score from `evidence` and score the result.
  pub fn assess(&self, evidence: &Evidence<'_>) -> Result<Assessment> {
    let mut issues = Vec::new();
    let cited = cited_sources(evidence)?;

    let checks = SubScores {
      source:       self.source_diversity(evidence, &cited, &mut issues),
      consistency:  self.consistency(evidence, &cited, &mut issues),
      transparency: self.transparency(evidence, &cited, &mut issues),
      model:        self.model_confidence(evidence.analysis, &mut issues)?,
      fact_check:   self.fact_check(evidence, &cited, &mut issues),
    };
    scenario_issues(evidence.analysis, &mut issues);

    self.score(checks, issues)
  }

  fn source_diversity(
    &self,
    evidence: &Evidence<'_>,
    cited: &[&SourceItem],
    issues: &mut Vec<String>,
  ) -> f64 {
    if cited.is_empty() {
      issues.push("analysis cites no sources".into());
    }
    let domains: BTreeSet<&str> = cited.iter().filter_map(|s| s.domain.as_deref()).collect();
    if cited.len() >= 2 && domains.len() == 1 {
      issues.push(format!(
        "all sources come from a single domain ({})",
        domains.iter().next().copied().unwrap_or_default()
      ));
    }
    for source in cited.iter().filter(|s| s.topic != evidence.analysis.topic) {
      issues.push(format!(
        "source {} is filed under topic {}, analysis is {}",
        source.source_id, source.topic, evidence.analysis.topic
      ));
    }
    source_score(cited.len(), self.config.saturation_sources)
  }

  fn consistency(
    &self,
    evidence: &Evidence<'_>,
    cited: &[&SourceItem],
    issues: &mut Vec<String>,
  ) -> f64 {
    let mut by_source: HashMap<Uuid, BTreeSet<String>> = HashMap::new();
    for fact in evidence.facts {
      let values = fact.entities.values().flatten().map(|v| fold(v));
      by_source.entry(fact.source_id).or_default().extend(values);
    }
    let sets: Vec<&BTreeSet<String>> = cited
      .iter()
      .filter_map(|s| by_source.get(&s.source_id))
      .filter(|set| !set.is_empty())
      .collect();

    if sets.len() < 2 {
      issues.push(
        "consistency not cross-checked: fewer than two sources with extracted entities".into(),
      );
      return self.config.single_source_consistency;
    }

    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in sets.iter().enumerate() {
      for b in &sets[i + 1..] {
        total += jaccard(a, b);
        pairs += 1;
      }
    }
    let mean = total / pairs as f64;
    if mean == 0.0 {
      issues.push("sources share no entities".into());
    }
    (mean / self.config.consistency_target_overlap).min(1.0) * 100.0
  }

  fn transparency(
    &self,
    evidence: &Evidence<'_>,
    cited: &[&SourceItem],
    issues: &mut Vec<String>,
  ) -> f64 {
    if cited.is_empty() {
      return 0.0;
    }
    let quoted: BTreeSet<Uuid> = evidence.facts.iter().map(|f| f.source_id).collect();
    let mut total = 0.0;
    for source in cited {
      let attributed = source.author.as_deref().is_some_and(|a| !a.trim().is_empty());
      if !attributed {
        issues.push(format!("source {} has no author attribution", source.source_id));
      }
      let has_quotes = quoted.contains(&source.source_id);
      total += (if attributed { 50.0 } else { 0.0 }) + (if has_quotes { 50.0 } else { 0.0 });
    }
    total / cited.len() as f64
  }

  fn model_confidence(&self, analysis: &Analysis, issues: &mut Vec<String>) -> Result<f64> {
    let confidence = analysis.confidence.ok_or_else(|| {
      Error::Computation(format!(
        "analysis {} carries no model confidence",
        analysis.analysis_id
      ))
    })?;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
      return Err(Error::Computation(format!(
        "analysis {} model confidence out of range: {confidence}",
        analysis.analysis_id
      )));
    }
    if confidence < 0.5 {
      issues.push(format!("low model confidence ({confidence:.2})"));
    }
    Ok(confidence * 100.0)
  }

  fn fact_check(
    &self,
    evidence: &Evidence<'_>,
    cited: &[&SourceItem],
    issues: &mut Vec<String>,
  ) -> f64 {
    let cited_ids: BTreeSet<Uuid> = cited.iter().map(|s| s.source_id).collect();
    let facts: Vec<&Fact> = evidence
      .facts
      .iter()
      .filter(|f| cited_ids.contains(&f.source_id))
      .collect();
    if facts.is_empty() {
      issues.push("no extracted facts to check".into());
      return 0.0;
    }
    let passing = facts
      .iter()
      .filter(|f| {
        f.confidence >= self.config.fact_confidence_floor
          && f.claim.as_deref().is_some_and(|c| !c.is_empty())
      })
      .count();
    let failing = facts.len() - passing;
    if failing > 0 {
      issues.push(format!("{failing} of {} facts below the confidence floor", facts.len()));
    }
    passing as f64 / facts.len() as f64 * 100.0
  }
}

/// The distinct sources cited by the analysis, in citation order. Every cited
/// source must be present in the evidence.
fn cited_sources<'a>(evidence: &Evidence<'a>) -> Result<Vec<&'a SourceItem>> {
  let mut seen = BTreeSet::new();
  let mut cited = Vec::new();
  for id in evidence.analysis.source_ids() {
    if !seen.insert(*id) {
      continue;
    }
    let source = evidence
      .sources
      .iter()
      .find(|s| s.source_id == *id)
      .ok_or_else(|| {
        Error::Computation(format!(
          "source {id} cited by analysis {} is missing",
          evidence.analysis.analysis_id
        ))
      })?;
    cited.push(source);
  }
  Ok(cited)
}

fn scenario_issues(analysis: &Analysis, issues: &mut Vec<String>) {
  if analysis.scenarios.is_empty() {
    return;
  }
  for s in &analysis.scenarios {
    if !(0.0..=1.0).contains(&s.likelihood) {
      issues.push(format!("scenario {} has likelihood outside [0, 1]", s.case));
    }
  }
  let total: f64 = analysis.scenarios.iter().map(|s| s.likelihood).sum();
  if (total - 1.0).abs() > SCENARIO_TOLERANCE {
    issues.push(format!("scenario likelihoods sum to {total:.2}"));
  }
}
