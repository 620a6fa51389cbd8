//! Pairwise string similarity metrics for the exhaustive matcher.
//!
//! Every metric returns a value in `[0, 1]`; identical strings score `1.0`.
//! Edit-distance metrics come from `rapidfuzz`; the token-based composite ("weighted
//! ratio") and the character-set Jaccard are built on top of them here.
//!
//! References:
//! - Jaro (1989), Winkler (1990): record-linkage string comparators.
//! - Jaccard (1901): set overlap coefficient.

use std::fmt;
use std::str::FromStr;

use rapidfuzz::distance::{indel, jaro, jaro_winkler, levenshtein};

use crate::Error;

/// A named string similarity metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Normalised Levenshtein similarity: `1 - distance / max_len`.
    Levenshtein,
    /// Jaro similarity.
    Jaro,
    /// Jaro-Winkler similarity (Jaro with a common-prefix bonus).
    JaroWinkler,
    /// Normalised Indel similarity (insertions/deletions only), a.k.a. "ratio".
    Indel,
    /// Composite of ratio, token-sort/token-set and partial ratios, tolerant to word order.
    WeightedFuzzy,
    /// Jaccard similarity over the sets of characters of both strings.
    Jaccard,
}

impl Metric {
    /// All metrics, in a stable order.
    pub const ALL: [Metric; 6] = [
        Metric::Levenshtein,
        Metric::Jaro,
        Metric::JaroWinkler,
        Metric::Indel,
        Metric::WeightedFuzzy,
        Metric::Jaccard,
    ];

    /// Canonical name of the metric.
    pub fn name(self) -> &'static str {
        match self {
            Self::Levenshtein => "levenshtein",
            Self::Jaro => "jaro",
            Self::JaroWinkler => "jaro-winkler",
            Self::Indel => "indel",
            Self::WeightedFuzzy => "fuzzy-weighted",
            Self::Jaccard => "jaccard",
        }
    }

    /// Similarity of `a` and `b` in `[0, 1]`.
    pub fn compare(self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let s = match self {
            Self::Levenshtein => levenshtein::normalized_similarity(a.chars(), b.chars()),
            Self::Jaro => jaro::similarity(a.chars(), b.chars()),
            Self::JaroWinkler => jaro_winkler::similarity(a.chars(), b.chars()),
            Self::Indel => ratio(a, b),
            Self::WeightedFuzzy => weighted_ratio(a, b),
            Self::Jaccard => jaccard_chars(a, b),
        };
        if s.is_finite() {
            s.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "levenshtein" | "leven" | "edit-distance" => Ok(Self::Levenshtein),
            "jaro" => Ok(Self::Jaro),
            "jaro-winkler" | "jarowinkler" => Ok(Self::JaroWinkler),
            "indel" | "fuzzy" => Ok(Self::Indel),
            "fuzzy-weighted" | "fuzzyw" | "weighted-fuzzy" => Ok(Self::WeightedFuzzy),
            "jaccard" => Ok(Self::Jaccard),
            other => Err(Error::Configuration(format!(
                "unsupported similarity metric `{other}`"
            ))),
        }
    }
}

/// Normalised Indel similarity.
fn ratio(a: &str, b: &str) -> f64 {
    indel::normalized_similarity(a.chars(), b.chars())
}

/// Best `ratio` of the shorter string against every equally long window of the longer one.
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long): (Vec<char>, Vec<char>) = {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        if a.len() <= b.len() {
            (a, b)
        } else {
            (b, a)
        }
    };
    if short.is_empty() {
        return if long.is_empty() { 1.0 } else { 0.0 };
    }
    let mut best: f64 = 0.0;
    for window in long.windows(short.len()) {
        let s = indel::normalized_similarity(short.iter().copied(), window.iter().copied());
        if s > best {
            best = s;
            if best >= 1.0 {
                break;
            }
        }
    }
    best
}

fn process(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn sorted_tokens(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens
}

fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a).join(" "), &sorted_tokens(b).join(" "))
}

fn partial_token_sort_ratio(a: &str, b: &str) -> f64 {
    partial_ratio(&sorted_tokens(a).join(" "), &sorted_tokens(b).join(" "))
}

struct TokenSets {
    sect: String,
    diff_ab: String,
    diff_ba: String,
}

fn token_sets(a: &str, b: &str) -> TokenSets {
    let mut ta = sorted_tokens(a);
    ta.dedup();
    let mut tb = sorted_tokens(b);
    tb.dedup();
    let sect: Vec<&str> = ta.iter().copied().filter(|t| tb.contains(t)).collect();
    let diff_ab: Vec<&str> = ta.iter().copied().filter(|t| !tb.contains(t)).collect();
    let diff_ba: Vec<&str> = tb.iter().copied().filter(|t| !ta.contains(t)).collect();
    TokenSets {
        sect: sect.join(" "),
        diff_ab: diff_ab.join(" "),
        diff_ba: diff_ba.join(" "),
    }
}

fn joined(sect: &str, diff: &str) -> String {
    match (sect.is_empty(), diff.is_empty()) {
        (true, _) => diff.to_string(),
        (_, true) => sect.to_string(),
        _ => format!("{sect} {diff}"),
    }
}

fn token_set_ratio(a: &str, b: &str) -> f64 {
    let sets = token_sets(a, b);
    if !sets.sect.is_empty() && (sets.diff_ab.is_empty() || sets.diff_ba.is_empty()) {
        return 1.0;
    }
    let sect_ab = joined(&sets.sect, &sets.diff_ab);
    let sect_ba = joined(&sets.sect, &sets.diff_ba);
    let mut best = ratio(&sect_ab, &sect_ba);
    if !sets.sect.is_empty() {
        best = best
            .max(ratio(&sets.sect, &sect_ab))
            .max(ratio(&sets.sect, &sect_ba));
    }
    best
}

fn partial_token_set_ratio(a: &str, b: &str) -> f64 {
    let sets = token_sets(a, b);
    if !sets.sect.is_empty() {
        return 1.0;
    }
    partial_ratio(&sets.diff_ab, &sets.diff_ba)
}

/// Weighted combination of ratio variants, modelled on the classic `WRatio` heuristic.
fn weighted_ratio(a: &str, b: &str) -> f64 {
    const UNBASE_SCALE: f64 = 0.95;

    let a = process(a);
    let b = process(b);
    if a.is_empty() || b.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }
    let (len_a, len_b) = (a.chars().count() as f64, b.chars().count() as f64);
    let len_ratio = len_a.max(len_b) / len_a.min(len_b);

    let base = ratio(&a, &b);
    if len_ratio < 1.5 {
        let token = token_sort_ratio(&a, &b).max(token_set_ratio(&a, &b));
        return base.max(token * UNBASE_SCALE);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    let partial = partial_ratio(&a, &b) * partial_scale;
    let partial_token = partial_token_sort_ratio(&a, &b).max(partial_token_set_ratio(&a, &b))
        * UNBASE_SCALE
        * partial_scale;
    base.max(partial).max(partial_token)
}

/// Jaccard similarity over character sets: `|A ∩ B| / |A ∪ B|`.
fn jaccard_chars(a: &str, b: &str) -> f64 {
    let mut ca: Vec<char> = a.chars().collect();
    ca.sort_unstable();
    ca.dedup();
    let mut cb: Vec<char> = b.chars().collect();
    cb.sort_unstable();
    cb.dedup();
    jaccard_sorted(&ca, &cb)
}

/// Jaccard over two sorted, deduplicated slices (merge walk).
pub(crate) fn jaccard_sorted<T: Ord>(a: &[T], b: &[T]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let mut i = 0usize;
    let mut j = 0usize;
    let mut inter = 0usize;
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                inter += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - inter;
    inter as f64 / union as f64
}
