//! Text normalisation helpers used by the ingest and normalize stages.

/// Case-fold and collapse all whitespace runs to a single space.
pub fn fold(text: &str) -> String {
  text
    .split_whitespace()
    .map(str::to_lowercase)
    .collect::<Vec<_>>()
    .join(" ")
}

/// Collapse whitespace runs without changing case.
pub fn collapse_whitespace(text: &str) -> String {
  text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip HTML tags, drop `<script>`/`<style>` bodies, decode the common
/// character entities and collapse whitespace.
pub fn strip_markup(input: &str) -> String {
  let mut out = String::with_capacity(input.len());
  let mut rest = input;

  while let Some(open) = rest.find('<') {
    out.push_str(&rest[..open]);
    let after = &rest[open..];
    let Some(close) = after.find('>') else {
      // Unterminated tag: keep the text verbatim.
      out.push_str(after);
      rest = "";
      break;
    };
    let tag = after[1..close].trim().to_ascii_lowercase();
    rest = &after[close + 1..];

    if let Some(name) = ["script", "style"]
      .into_iter()
      .find(|n| tag.starts_with(n))
    {
      let end = format!("</{name}");
      match rest.to_ascii_lowercase().find(&end) {
        Some(pos) => {
          let tail = &rest[pos..];
          rest = tail.find('>').map_or("", |gt| &tail[gt + 1..]);
        }
        None => rest = "",
      }
    }
    // Tags separate words.
    out.push(' ');
  }
  out.push_str(rest);

  collapse_whitespace(&decode_entities(&out))
}

fn decode_entities(text: &str) -> String {
  const ENTITIES: [(&str, &str); 8] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&mdash;", "-"),
    ("&amp;", "&"),
  ];
  ENTITIES
    .iter()
    .fold(text.to_owned(), |acc, (from, to)| acc.replace(from, to))
}

/// Guess the language from the dominant script: Cyrillic → `ru`, Latin →
/// `en`, anything else (or no letters) → `und`.
pub fn detect_language(text: &str) -> &'static str {
  let (mut cyrillic, mut latin) = (0usize, 0usize);
  for c in text.chars().filter(|c| c.is_alphabetic()) {
    if ('\u{0400}'..='\u{04FF}').contains(&c) {
      cyrillic += 1;
    } else if c.is_ascii_alphabetic() {
      latin += 1;
    }
  }
  match (cyrillic, latin) {
    (0, 0) => "und",
    (c, l) if c >= l => "ru",
    _ => "en",
  }
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(text: &str, max: usize) -> String {
  match text.char_indices().nth(max) {
    Some((idx, _)) => text[..idx].to_owned(),
    None => text.to_owned(),
  }
}

/// The first `max` characters of `text`, cut back to a word boundary and
/// suffixed with `...` when anything was removed.
pub fn excerpt(text: &str, max: usize) -> String {
  let text = collapse_whitespace(text);
  if text.chars().count() <= max {
    return text;
  }
  let cut = truncate_chars(&text, max);
  let cut = match cut.rfind(' ') {
    Some(idx) if idx > 0 => &cut[..idx],
    _ => cut.as_str(),
  };
  format!("{}...", cut.trim_end_matches(|c: char| c.is_ascii_punctuation()))
}

/// Host of `url` without a leading `www.`.
pub fn domain_of(url: &str) -> Option<String> {
  let parsed = url::Url::parse(url).ok()?;
  let host = parsed.host_str()?;
  Some(host.strip_prefix("www.").unwrap_or(host).to_owned())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_tags_and_scripts() {
    let html = "<p>Hello <b>world</b></p><script>var x = 1;</script><p>again&amp;again</p>";
    assert_eq!(strip_markup(html), "Hello world again&again");
  }

  #[test]
  fn unterminated_tag_is_kept() {
    assert_eq!(strip_markup("a < b"), "a < b");
  }

  #[test]
  fn language_by_script() {
    assert_eq!(detect_language("Рынок растёт на фоне новостей"), "ru");
    assert_eq!(detect_language("Markets rally after the news"), "en");
    assert_eq!(detect_language("12345 !!"), "und");
  }

  #[test]
  fn excerpt_cuts_on_word_boundary() {
    let text = "one two three four five";
    assert_eq!(excerpt(text, 100), text);
    assert_eq!(excerpt(text, 10), "one two...");
  }

  #[test]
  fn truncate_counts_chars_not_bytes() {
    assert_eq!(truncate_chars("привет", 3), "при");
    assert_eq!(truncate_chars("abc", 10), "abc");
  }

  #[test]
  fn domain_without_www() {
    assert_eq!(domain_of("https://www.example.com/a/b").as_deref(), Some("example.com"));
    assert_eq!(domain_of("not a url"), None);
  }
}
