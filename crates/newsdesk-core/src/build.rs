//! Deterministic post-builder transforms: slug, title, TL;DR, summary and
//! SEO metadata. The long-form body is rendered elsewhere from a
//! [`PostPlan`].

use chrono::NaiveDate;
use serde_json::json;

use crate::{
  Topic,
  analysis::{Analysis, Scenario},
  normalize::truncate_chars,
  post::Seo,
};

pub const SEO_TITLE_MAX: usize = 60;
pub const SEO_DESCRIPTION_MAX: usize = 155;
/// Placeholder in [`PostPlan::summary`] replaced by the post URL at delivery.
pub const LINK_PLACEHOLDER: &str = "{link}";

const MISSING: &str = "n/a";

/// Lowercase, replace every run of characters outside `[a-z0-9-]` with a
/// single hyphen, collapse repeated hyphens and trim them from both ends.
pub fn slugify(value: &str) -> String {
  let mut slug = String::with_capacity(value.len());
  for c in value.to_lowercase().chars() {
    let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' };
    if c == '-' && slug.ends_with('-') {
      continue;
    }
    slug.push(c);
  }
  slug.trim_matches('-').to_owned()
}

pub fn slug_for(analysis: &Analysis, date: NaiveDate) -> String {
  slugify(&format!(
    "{}-{}-{}",
    analysis.topic.code(),
    analysis.analysis_id,
    date.format("%Y-%m-%d")
  ))
}

pub fn title_for(topic: Topic, date: NaiveDate) -> String {
  format!("{} market analysis for {}", topic.label(), date.format("%Y-%m-%d"))
}

fn or_missing(value: Option<&str>) -> &str {
  value.filter(|v| !v.trim().is_empty()).unwrap_or(MISSING)
}

/// Three bullets: thesis, market impact, winners and losers.
pub fn tldr(analysis: &Analysis) -> [String; 3] {
  [
    or_missing(analysis.thesis.as_deref()).to_owned(),
    or_missing(analysis.impact_market.as_deref()).to_owned(),
    format!(
      "Winners: {}; Losers: {}",
      or_missing(analysis.winners.as_deref()),
      or_missing(analysis.losers.as_deref())
    ),
  ]
}

pub fn summary(title: &str, bullets: &[String]) -> String {
  let mut out = format!("{title}\n\n");
  for bullet in bullets {
    out.push_str("• ");
    out.push_str(bullet);
    out.push('\n');
  }
  out.push_str("\nFull analysis: ");
  out.push_str(LINK_PLACEHOLDER);
  out
}

pub fn seo(title: &str, analysis: &Analysis, date: NaiveDate) -> Seo {
  let day = date.format("%Y-%m-%d").to_string();
  Seo {
    title:       truncate_chars(title, SEO_TITLE_MAX),
    description: truncate_chars(analysis.thesis.as_deref().unwrap_or_default(), SEO_DESCRIPTION_MAX),
    keywords:    vec![analysis.topic.code().to_owned()],
    og_image:    None,
    schema:      json!({
      "@context": "https://schema.org",
      "@type": "NewsArticle",
      "headline": title,
      "datePublished": day,
      "dateModified": day,
    }),
  }
}

/// Everything derived from an analysis before the body is rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct PostPlan {
  pub slug:      String,
  pub title:     String,
  pub tldr:      [String; 3],
  pub summary:   String,
  pub seo:       Seo,
  pub thesis:    String,
  pub impact:    String,
  pub winners:   String,
  pub losers:    String,
  pub scenarios: Vec<Scenario>,
  pub risks:     Vec<String>,
}

impl PostPlan {
  pub fn new(analysis: &Analysis, date: NaiveDate) -> Self {
    let title = title_for(analysis.topic, date);
    let tldr = tldr(analysis);
    Self {
      slug: slug_for(analysis, date),
      summary: summary(&title, &tldr),
      seo: seo(&title, analysis, date),
      thesis: or_missing(analysis.thesis.as_deref()).to_owned(),
      impact: or_missing(analysis.impact_market.as_deref()).to_owned(),
      winners: or_missing(analysis.winners.as_deref()).to_owned(),
      losers: or_missing(analysis.losers.as_deref()).to_owned(),
      scenarios: analysis.scenarios.clone(),
      risks: analysis.risks.clone(),
      title,
      tldr,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::analysis::AnalysisItems;

  fn analysis(topic: Topic, thesis: Option<&str>) -> Analysis {
    Analysis {
      analysis_id: Uuid::new_v4(),
      topic,
      items: AnalysisItems::default(),
      thesis: thesis.map(Into::into),
      impact_market: Some("Margins compress".into()),
      winners: Some("Marketplaces".into()),
      losers: None,
      scenarios: vec![],
      risks: vec!["Regulation".into()],
      confidence: Some(0.7),
      created_at: Utc::now(),
    }
  }

  fn date() -> NaiveDate { NaiveDate::from_ymd_opt(2026, 10, 17).unwrap() }

  #[test]
  fn slugify_collapses_punctuation() {
    assert_eq!(slugify("Ecom News!!"), "ecom-news");
    assert_eq!(slugify("--a  b--c--"), "a-b-c");
    assert_eq!(slugify("o&g"), "o-g");
    assert_eq!(slugify("Нефть"), "");
  }

  #[test]
  fn slug_is_deterministic_and_distinct() {
    let a = analysis(Topic::OilGas, None);
    let b = analysis(Topic::OilGas, None);
    assert_eq!(slug_for(&a, date()), slug_for(&a, date()));
    assert_ne!(slug_for(&a, date()), slug_for(&b, date()));
    let next_day = date().succ_opt().unwrap();
    assert_ne!(slug_for(&a, date()), slug_for(&a, next_day));
    let slug = slug_for(&a, date());
    assert!(slug.starts_with("o-g-"));
    assert!(slug.ends_with("-2026-10-17"));
  }

  #[test]
  fn seo_truncates() {
    let long = "x".repeat(400);
    let a = analysis(Topic::It, Some(&long));
    let title = "t".repeat(100);
    let seo = seo(&title, &a, date());
    assert_eq!(seo.title.chars().count(), SEO_TITLE_MAX);
    assert_eq!(seo.description.chars().count(), SEO_DESCRIPTION_MAX);
    assert_eq!(seo.keywords, vec!["it"]);
    assert_eq!(seo.schema["@type"], "NewsArticle");
    assert_eq!(seo.schema["datePublished"], "2026-10-17");
  }

  #[test]
  fn summary_has_bullets_and_link() {
    let a = analysis(Topic::Ecom, Some("Demand recovers"));
    let plan = PostPlan::new(&a, date());
    assert_eq!(plan.title, "E-commerce market analysis for 2026-10-17");
    assert_eq!(plan.tldr[2], "Winners: Marketplaces; Losers: n/a");
    assert!(plan.summary.contains("• Demand recovers"));
    assert!(plan.summary.ends_with(LINK_PLACEHOLDER));
  }
}
