use chrono::Duration as ChronoDuration;
use newsdesk_core::{
  Error, Result,
  dedupe::{Verdict, find_duplicate, fingerprint},
  extract::extract_facts,
  normalize::{collapse_whitespace, detect_language, domain_of, excerpt as excerpt_of, strip_markup},
  source::{NewSource, NormalizedFields, SourceItem},
  store::PipelineStore,
};
use tracing::{info, warn};

use super::{
  IndexOutput, IngestInput, IngestOutput, MAX_WINDOW_HOURS, MIN_WINDOW_HOURS, SourceRef, Stages,
  StoreResultExt as _,
};

const EXCERPT_CHARS: usize = 280;

impl<S: PipelineStore + 'static> Stages<S> {
  /// All accepted items are stored in one transaction: a failure leaves
  /// nothing committed. An item whose URL is already known is counted and
  /// skipped, so re-running an ingest is harmless.
  pub async fn ingest(&self, input: IngestInput) -> Result<IngestOutput> {
    let IngestInput { topic, window_hours } = input;
    if !(MIN_WINDOW_HOURS..=MAX_WINDOW_HOURS).contains(&window_hours) {
      return Err(Error::Invalid(format!(
        "window_hours must be between {MIN_WINDOW_HOURS} and {MAX_WINDOW_HOURS}, got {window_hours}"
      )));
    }

    let items = self.research.fetch(topic, window_hours).await?;
    let mut out = IngestOutput::default();
    let mut batch = Vec::with_capacity(items.len());

    for item in items {
      if item.url.trim().is_empty() || item.title.trim().is_empty() {
        warn!(%topic, url = %item.url, "dropping item without url or title");
        out.rejected += 1;
        continue;
      }
      let hashes = fingerprint(&item.title, item.content.as_deref());
      batch.push(NewSource {
        topic,
        domain: domain_of(&item.url),
        url: item.url,
        title: item.title,
        excerpt: item.excerpt,
        content: item.content,
        published_at: item.published_at,
        event_at: item.event_at,
        language: item.language,
        author: item.author,
        hashes,
      });
    }

    let stored = self.store.insert_sources(batch).await.db()?;
    out.source_ids = stored.inserted.iter().map(|s| s.source_id).collect();
    out.skipped_existing = stored.skipped;

    info!(
      %topic,
      window_hours,
      stored = out.source_ids.len(),
      skipped = out.skipped_existing,
      "ingest committed"
    );
    Ok(out)
  }

  /// Idempotent: normalising clean text again yields the same fields.
  pub async fn normalize(&self, input: SourceRef) -> Result<SourceItem> {
    let source = self.require_source(input.source_id).await?;

    let title = strip_markup(&source.title);
    let content = source
      .content
      .as_deref()
      .map(strip_markup)
      .filter(|c| !c.is_empty());
    let excerpt = source
      .excerpt
      .as_deref()
      .map(|e| collapse_whitespace(&strip_markup(e)))
      .filter(|e| !e.is_empty())
      .or_else(|| content.as_deref().map(|c| excerpt_of(c, EXCERPT_CHARS)));
    let language = source.language.clone().or_else(|| {
      let sample = format!("{title} {}", content.as_deref().unwrap_or_default());
      Some(detect_language(&sample).to_owned())
    });
    let domain = source.domain.clone().or_else(|| domain_of(&source.url));
    let hashes = fingerprint(&title, content.as_deref());

    let updated = self
      .store
      .update_normalized(source.source_id, NormalizedFields {
        domain,
        title,
        excerpt,
        content,
        language,
        hashes,
      })
      .await
      .db()?;
    info!(source_id = %updated.source_id, language = ?updated.language, "source normalized");
    Ok(updated)
  }

  /// Compare against sources of the same topic ingested earlier within the
  /// dedupe window. Read-only.
  pub async fn dedupe(&self, input: SourceRef) -> Result<Verdict> {
    let source = self.require_source(input.source_id).await?;
    let Some(hashes) = source.hashes.as_ref() else {
      return Err(Error::PreconditionFailed(format!(
        "source {} has no content hashes",
        source.source_id
      )));
    };

    let since = source.fetched_at - ChronoDuration::hours(i64::from(self.dedupe.window_hours));
    let candidates = self
      .store
      .hash_candidates(source.topic, since, source.source_id)
      .await
      .db()?;
    let verdict = find_duplicate(hashes, &candidates, self.dedupe.max_simhash_distance);

    match &verdict {
      Verdict::Unique => info!(source_id = %source.source_id, "source is unique"),
      Verdict::Duplicate { of, reason } => {
        info!(source_id = %source.source_id, duplicate_of = %of, ?reason, "source is a duplicate")
      }
    }
    Ok(verdict)
  }

  /// Re-running replaces the previous facts rather than adding to them.
  pub async fn index_facts(&self, input: SourceRef) -> Result<IndexOutput> {
    let source = self.require_source(input.source_id).await?;
    if source.normalized_at.is_none() {
      return Err(Error::PreconditionFailed(format!(
        "source {} has not been normalized",
        source.source_id
      )));
    }

    let facts = extract_facts(source.content.as_deref().unwrap_or_default(), self.max_facts);
    let stored = self.store.replace_facts(source.source_id, facts).await.db()?;
    info!(source_id = %source.source_id, facts = stored.len(), "facts indexed");
    Ok(IndexOutput { source_id: source.source_id, facts: stored.len() })
  }
}
