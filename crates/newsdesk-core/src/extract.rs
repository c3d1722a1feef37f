//! Heuristic fact extraction.
//!
//! Splits a normalised body into sentences and keeps those that carry a claim
//! signal: a number, a quotation, or an attribution phrase. Each kept
//! sentence becomes one [`NewFact`] with the entities found in it.

use crate::{
  fact::{Entities, NewFact},
  normalize::fold,
};

const MIN_WORDS: usize = 4;
const QUOTE_MARKS: [char; 5] = ['"', '\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'];
const ATTRIBUTION: [&str; 10] = [
  "said",
  "says",
  "according to",
  "reported",
  "announced",
  "told",
  "заявил",
  "сообщил",
  "по данным",
  "отметил",
];
const CURRENCY: [char; 4] = ['$', '€', '£', '₽'];

/// Split `text` into sentences on terminal punctuation followed by
/// whitespace, and on line breaks.
pub fn sentences(text: &str) -> Vec<String> {
  let mut out = Vec::new();
  let mut current = String::new();
  let mut chars = text.chars().peekable();

  while let Some(c) = chars.next() {
    if c == '\n' {
      push_sentence(&mut out, &mut current);
      continue;
    }
    current.push(c);
    if matches!(c, '.' | '!' | '?') && chars.peek().is_none_or(|n| n.is_whitespace()) {
      push_sentence(&mut out, &mut current);
    }
  }
  push_sentence(&mut out, &mut current);
  out
}

fn push_sentence(out: &mut Vec<String>, current: &mut String) {
  let trimmed = current.trim();
  if !trimmed.is_empty() {
    out.push(trimmed.to_owned());
  }
  current.clear();
}

fn has_quote(sentence: &str) -> bool { sentence.contains(QUOTE_MARKS) }

fn has_attribution(folded: &str) -> bool { ATTRIBUTION.iter().any(|p| folded.contains(p)) }

fn has_number(sentence: &str) -> bool { sentence.chars().any(|c| c.is_ascii_digit()) }

/// Entities found in one sentence.
pub fn entities(sentence: &str) -> Entities {
  let mut found = Entities::new();
  let mut name_run: Vec<&str> = Vec::new();

  let tokens: Vec<&str> = sentence.split_whitespace().collect();
  for (idx, raw) in tokens.iter().enumerate() {
    let token = raw.trim_matches(|c: char| {
      (c.is_ascii_punctuation() && !matches!(c, '%' | '$' | '&')) || QUOTE_MARKS.contains(&c)
    });
    if token.is_empty() {
      continue;
    }

    if token.ends_with('%') {
      push_entity(&mut found, "percent", token);
    } else if token.starts_with(CURRENCY) || token.ends_with(CURRENCY) {
      push_entity(&mut found, "money", token);
    } else if token.chars().any(|c| c.is_ascii_digit()) {
      push_entity(&mut found, "number", token);
    }

    let capitalised = token.chars().next().is_some_and(char::is_uppercase);
    // The first word of a sentence is capitalised anyway.
    if capitalised && idx > 0 {
      name_run.push(token);
    } else {
      flush_name(&mut found, &mut name_run);
    }
  }
  flush_name(&mut found, &mut name_run);
  found
}

fn flush_name(found: &mut Entities, run: &mut Vec<&str>) {
  if !run.is_empty() {
    push_entity(found, "name", &run.join(" "));
    run.clear();
  }
}

fn push_entity(found: &mut Entities, kind: &str, value: &str) {
  let values = found.entry(kind.to_owned()).or_default();
  if !values.iter().any(|v| v == value) {
    values.push(value.to_owned());
  }
}

/// Extract up to `max_facts` facts from a normalised body.
pub fn extract_facts(content: &str, max_facts: usize) -> Vec<NewFact> {
  sentences(content)
    .into_iter()
    .filter(|s| s.split_whitespace().count() >= MIN_WORDS)
    .filter_map(|sentence| {
      let folded = fold(&sentence);
      let quoted = has_quote(&sentence);
      let attributed = has_attribution(&folded);
      let numeric = has_number(&sentence);
      if !(quoted || attributed || numeric) {
        return None;
      }

      let mut confidence: f64 = 0.5;
      if quoted {
        confidence += 0.2;
      }
      if attributed {
        confidence += 0.2;
      }
      if numeric {
        confidence += 0.1;
      }

      let claim = folded
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_owned();
      Some(NewFact {
        entities:   entities(&sentence),
        quote:      sentence,
        claim:      (!claim.is_empty()).then_some(claim),
        confidence: confidence.min(1.0),
      })
    })
    .take(max_facts)
    .collect()
}
