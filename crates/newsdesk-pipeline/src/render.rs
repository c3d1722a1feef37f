//! Long-form post body rendering.

use askama::Template;
use newsdesk_core::{Error, Result, build::PostPlan};

struct ScenarioRow<'a> {
  horizon:    &'a str,
  case:       &'a str,
  likelihood: String,
  text:       &'a str,
}

#[derive(Template)]
#[template(path = "post.html")]
struct PostBody<'a> {
  title:       &'a str,
  tldr:        &'a [String],
  thesis:      &'a str,
  impact:      &'a str,
  winners:     &'a str,
  losers:      &'a str,
  scenarios:   Vec<ScenarioRow<'a>>,
  risks:       &'a [String],
  reliability: String,
}

/// Render the HTML body of a post. Values are escaped by the template engine.
pub fn render_body(plan: &PostPlan, reliability_score: f64) -> Result<String> {
  let body = PostBody {
    title:       &plan.title,
    tldr:        &plan.tldr,
    thesis:      &plan.thesis,
    impact:      &plan.impact,
    winners:     &plan.winners,
    losers:      &plan.losers,
    scenarios:   plan
      .scenarios
      .iter()
      .map(|s| ScenarioRow {
        horizon:    &s.horizon,
        case:       &s.case,
        likelihood: format!("{:.0}%", s.likelihood * 100.0),
        text:       &s.text,
      })
      .collect(),
    risks:       &plan.risks,
    reliability: format!("{reliability_score:.1}"),
  };
  body
    .render()
    .map_err(|e| Error::Computation(format!("post body could not be rendered: {e}")))
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, Utc};
  use newsdesk_core::{
    Topic,
    analysis::{Analysis, AnalysisItems, Scenario},
  };
  use uuid::Uuid;

  use super::*;

  fn plan(thesis: &str) -> PostPlan {
    let analysis = Analysis {
      analysis_id:   Uuid::new_v4(),
      topic:         Topic::Ecom,
      items:         AnalysisItems { source_ids: vec![] },
      thesis:        Some(thesis.to_owned()),
      impact_market: None,
      winners:       None,
      losers:        None,
      scenarios:     vec![Scenario {
        horizon:    "1m".to_owned(),
        case:       "base".to_owned(),
        likelihood: 0.6,
        text:       "Stable".to_owned(),
      }],
      risks:         vec!["Rates".to_owned()],
      confidence:    Some(0.7),
      created_at:    Utc::now(),
    };
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    PostPlan::new(&analysis, date)
  }

  #[test]
  fn body_contains_sections() {
    let html = render_body(&plan("Margins recover"), 72.5).unwrap();
    assert!(html.contains("<h1>E-commerce market analysis for 2024-03-01</h1>"));
    assert!(html.contains("<p>Margins recover</p>"));
    assert!(html.contains("<td>60%</td>"));
    assert!(html.contains("<li>Rates</li>"));
    assert!(html.contains("72.5 / 100"));
  }

  #[test]
  fn markup_in_fields_is_escaped() {
    let html = render_body(&plan("<script>x</script>"), 50.0).unwrap();
    assert!(!html.contains("<script>"));
  }
}
