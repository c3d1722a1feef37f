//! Content fingerprints and the duplicate verdict.
//!
//! A source is a duplicate of an earlier source in the same topic when the
//! titles or bodies hash identically, or when the body simhashes are within a
//! small Hamming distance (near-duplicate rewrites of the same wire story).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{normalize::fold, source::ContentHashes, store::HashCandidate};

const SHINGLE_WORDS: usize = 3;

/// Tunables for the dedupe stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeConfig {
  /// Only sources fetched within this many hours are compared.
  pub window_hours:         u32,
  /// Simhash Hamming distance at or below which bodies count as the same.
  pub max_simhash_distance: u32,
}

impl Default for DedupeConfig {
  fn default() -> Self { Self { window_hours: 72, max_simhash_distance: 3 } }
}

/// Why two sources were judged duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum MatchReason {
  Title,
  Content,
  NearContent { distance: u32 },
}

/// Result of the dedupe stage. Never mutates state; the caller decides
/// whether to skip downstream stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
  Unique,
  Duplicate { of: Uuid, reason: MatchReason },
}

impl Verdict {
  pub fn is_duplicate(&self) -> bool { matches!(self, Self::Duplicate { .. }) }
}

fn sha256_hex(text: &str) -> String { hex::encode(Sha256::digest(text.as_bytes())) }

/// Fingerprint a title/body pair.
pub fn fingerprint(title: &str, content: Option<&str>) -> ContentHashes {
  let body = fold(content.unwrap_or_default());
  ContentHashes {
    title:   sha256_hex(&fold(title)),
    content: sha256_hex(&body),
    simhash: format!("{:016x}", simhash(&body)),
  }
}

/// 64-bit simhash over word 3-shingles. Texts shorter than one shingle are
/// hashed as a single shingle; empty text hashes to 0.
pub fn simhash(text: &str) -> u64 {
  let words: Vec<String> = text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| !w.is_empty())
    .map(str::to_lowercase)
    .collect();
  if words.is_empty() {
    return 0;
  }

  let shingles: Vec<String> = if words.len() < SHINGLE_WORDS {
    vec![words.join(" ")]
  } else {
    words.windows(SHINGLE_WORDS).map(|w| w.join(" ")).collect()
  };

  let mut weights = [0i64; 64];
  for shingle in &shingles {
    let digest = Sha256::digest(shingle.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let h = u64::from_be_bytes(bytes);
    for (bit, weight) in weights.iter_mut().enumerate() {
      if h & (1 << bit) != 0 {
        *weight += 1;
      } else {
        *weight -= 1;
      }
    }
  }

  weights
    .iter()
    .enumerate()
    .filter(|(_, w)| **w > 0)
    .fold(0u64, |acc, (bit, _)| acc | (1 << bit))
}

pub fn hamming(a: u64, b: u64) -> u32 { (a ^ b).count_ones() }

fn parse_simhash(hex_str: &str) -> Option<u64> { u64::from_str_radix(hex_str, 16).ok() }

/// Compare `hashes` against earlier candidates (oldest first) and return the
/// first match. Empty bodies never match on content.
pub fn find_duplicate(
  hashes: &ContentHashes,
  candidates: &[HashCandidate],
  max_simhash_distance: u32,
) -> Verdict {
  let empty_body = sha256_hex("");
  let own_simhash = parse_simhash(&hashes.simhash).filter(|h| *h != 0);

  for candidate in candidates {
    let other = &candidate.hashes;
    if other.title == hashes.title {
      return Verdict::Duplicate { of: candidate.source_id, reason: MatchReason::Title };
    }
    if hashes.content == empty_body {
      continue;
    }
    if other.content == hashes.content {
      return Verdict::Duplicate { of: candidate.source_id, reason: MatchReason::Content };
    }
    if let (Some(own), Some(theirs)) = (own_simhash, parse_simhash(&other.simhash)) {
      let distance = hamming(own, theirs);
      if theirs != 0 && distance <= max_simhash_distance {
        return Verdict::Duplicate {
          of:     candidate.source_id,
          reason: MatchReason::NearContent { distance },
        };
      }
    }
  }
  Verdict::Unique
}
