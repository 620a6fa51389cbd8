//! Text normalisation shared by source strings and target labels.
//!
//! Both sides of a TF-IDF comparison must go through the same [`Normalizer`], otherwise
//! the n-gram spaces drift apart.

use std::collections::BTreeSet;

/// Words dropped from every string before vectorisation.
///
/// Mostly qualifiers that appear in phenotype/trait catalogues (UK Biobank, FinnGen, ICD
/// chapters) and carry no meaning for the target concept.
pub const STOP_WORDS: &[&str] = &[
    "in", "the", "any", "all", "for", "and", "or", "dx", "on", "fh", "tx", "only", "qnorm",
    "w", "iqb", "s", "ds", "rd", "rdgwas", "icd", "excluded", "excluding", "unspecified",
    "certain", "also", "undefined", "ordinary", "least", "squares", "finngen", "elsewhere",
    "more", "classified", "classifeid", "unspcified", "unspesified", "specified", "acquired",
    "combined", "unspeficied", "not", "by", "strict", "wide", "definition", "definitions",
    "confirmed", "chapter", "chapters", "controls", "characterized", "main", "diagnosis",
    "hospital", "admissions", "other", "resulting", "from",
];

/// Lowercases, strips non-alphanumerics, drops stop words and collapses whitespace.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stop_words: BTreeSet<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_stop_words(STOP_WORDS.iter().copied())
    }
}

impl Normalizer {
    /// A normaliser with a custom stop-word list (matched case-insensitively).
    pub fn with_stop_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stop_words: words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// A normaliser that keeps every word.
    pub fn without_stop_words() -> Self {
        Self {
            stop_words: BTreeSet::new(),
        }
    }

    /// Normalise one string. Idempotent: `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let cleaned: String = lowered
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        cleaned
            .split_whitespace()
            .filter(|w| !self.stop_words.contains(*w))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Normalise every string of a list.
    pub fn normalize_all<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        texts.iter().map(|t| self.normalize(t.as_ref())).collect()
    }
}

/// Normalise with the default stop-word list.
pub fn normalize(text: &str) -> String {
    Normalizer::default().normalize(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_case_and_stop_words() {
        assert_eq!(normalize("Asthma (Diagnosis)"), "asthma");
        assert_eq!(normalize("  Type_2   diabetes, unspecified "), "type 2 diabetes");
        assert_eq!(normalize("Heart-Attack"), "heart attack");
    }

    #[test]
    fn normalisation_is_idempotent() {
        for s in [
            "Other diseases of the RESPIRATORY system",
            "İstanbul café / naïve",
            "x__y  z!!",
            "",
            "FinnGen ICD chapter",
        ] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input {s:?}");
        }
    }

    #[test]
    fn custom_stop_words() {
        let n = Normalizer::with_stop_words(["Level"]);
        assert_eq!(n.normalize("Glucose level"), "glucose");
        assert_eq!(Normalizer::without_stop_words().normalize("the end"), "the end");
    }
}
