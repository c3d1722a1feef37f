//! The fixed set of topics the newsroom covers.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

/// A coverage topic. Stored and sent on the wire as its short code.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
pub enum Topic {
  #[serde(rename = "ecom")]
  #[strum(serialize = "ecom")]
  Ecom,
  #[serde(rename = "it")]
  #[strum(serialize = "it")]
  It,
  #[serde(rename = "o&g")]
  #[strum(serialize = "o&g")]
  OilGas,
}

impl Topic {
  /// The short code (`"ecom"`, `"it"`, `"o&g"`).
  pub fn code(self) -> &'static str { self.into() }

  /// Human-readable name used in titles.
  pub fn label(self) -> &'static str {
    match self {
      Self::Ecom => "E-commerce",
      Self::It => "IT",
      Self::OilGas => "Oil & Gas",
    }
  }

  /// Parse a stored or wire code, rejecting anything outside the fixed set.
  pub fn parse(code: &str) -> crate::Result<Self> {
    code
      .parse()
      .map_err(|_| crate::Error::Invalid(format!("unknown topic: {code:?}")))
  }
}

impl std::fmt::Display for Topic {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.code())
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn codes_parse_back() {
    for topic in Topic::iter() {
      assert_eq!(Topic::parse(topic.code()).unwrap(), topic);
    }
  }

  #[test]
  fn serde_uses_short_code() {
    assert_eq!(serde_json::to_string(&Topic::OilGas).unwrap(), "\"o&g\"");
    let t: Topic = serde_json::from_str("\"ecom\"").unwrap();
    assert_eq!(t, Topic::Ecom);
  }

  #[test]
  fn unknown_code_is_invalid() {
    assert!(matches!(Topic::parse("sports"), Err(crate::Error::Invalid(_))));
  }
}
