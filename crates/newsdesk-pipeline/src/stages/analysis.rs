use newsdesk_core::{
  Entity, Error, Result,
  analysis::NewAnalysis,
  store::PipelineStore,
  verification::Verification,
  verify::Evidence,
};
use tracing::{info, warn};

use super::{AnalysisRef, AnalyzeInput, Stages, StoreResultExt as _};

impl<S: PipelineStore + 'static> Stages<S> {
  pub async fn analyze(&self, input: AnalyzeInput) -> Result<AnalysisRef> {
    let AnalyzeInput { topic, source_ids } = input;
    let sources = self.store.get_sources(&source_ids).await.db()?;
    if let Some(missing) = source_ids
      .iter()
      .find(|id| !sources.iter().any(|s| s.source_id == **id))
    {
      return Err(Error::not_found(Entity::Source, *missing));
    }
    let facts = self.store.facts_for_sources(&source_ids).await.db()?;

    let draft = self.analyst.analyze(topic, &sources, &facts).await?;
    let analysis = self
      .store
      .insert_analysis(NewAnalysis { topic, source_ids, draft })
      .await
      .db()?;

    info!(
      analysis_id = %analysis.analysis_id,
      %topic,
      sources = analysis.source_ids().len(),
      "analysis committed"
    );
    Ok(AnalysisRef { analysis_id: analysis.analysis_id })
  }

  /// Re-verification is rejected: a verified analysis keeps its row.
  pub async fn verify(&self, input: AnalysisRef) -> Result<Verification> {
    let analysis = self.require_analysis(input.analysis_id).await?;
    if self.store.get_verification(analysis.analysis_id).await.db()?.is_some() {
      return Err(Error::Conflict(format!(
        "analysis {} is already verified",
        analysis.analysis_id
      )));
    }

    let sources = self.store.get_sources(analysis.source_ids()).await.db()?;
    let facts = self.store.facts_for_sources(analysis.source_ids()).await.db()?;

    let assessment = self
      .verifier
      .assess(&Evidence { analysis: &analysis, sources: &sources, facts: &facts })
      .inspect_err(|e| {
        warn!(analysis_id = %analysis.analysis_id, error = %e, "verification aborted")
      })?;

    let verification = self
      .store
      .insert_verification(assessment.into_new_verification(analysis.analysis_id))
      .await
      .db()?;

    info!(
      analysis_id = %analysis.analysis_id,
      score = verification.reliability_score,
      status = %verification.status,
      "verification committed"
    );
    Ok(verification)
  }
}
