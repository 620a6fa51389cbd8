//! Lexical index matcher: character n-gram TF-IDF with a bounded sparse cosine product.
//!
//! Source strings and every label/synonym of every target term are normalised the same
//! way, vectorised over one shared n-gram vocabulary, and compared with
//! [`top_n_product`]. One target term may own several rows (one per surface form); the
//! best-scoring row wins and later rows of the same term are skipped.
//!
//! References:
//! - Spärck Jones (1972): term specificity / IDF motivation.
//! - Salton & Buckley (1988): term-weighting approaches in automatic text retrieval.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::mapper::TermMapper;
use crate::mapping::{Candidate, SourceTerm};
use crate::normalize::Normalizer;
use crate::sparse::{top_n_product, CsrMatrix};
use crate::term::TermDictionary;
use crate::Result;

/// TF-IDF parameters.
#[derive(Debug, Clone, Copy)]
pub struct TfIdfParams {
    /// Term-frequency transform.
    pub tf_variant: TfVariant,
    /// IDF transform.
    pub idf_variant: IdfVariant,
    /// Character n-gram length.
    pub ngram: usize,
    /// How many label rows to keep per source before dedup by term.
    ///
    /// Several rows may belong to one term, so this must be comfortably larger than the
    /// final number of mappings per source.
    pub ntop: usize,
}

impl Default for TfIdfParams {
    fn default() -> Self {
        Self {
            tf_variant: TfVariant::Linear,
            idf_variant: IdfVariant::Smoothed,
            ngram: 3,
            ntop: 50,
        }
    }
}

/// Term-frequency transform variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TfVariant {
    /// Linear TF: `tf = f_{t,d}`.
    Linear,
    /// Log-scaled TF: `tf = 1 + ln(f_{t,d})` for `f_{t,d} > 0`.
    LogScaled,
}

/// IDF transform variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdfVariant {
    /// Standard IDF: `ln(N / df) + 1`.
    Standard,
    /// Smoothed IDF: `ln((1 + N) / (1 + df)) + 1` (as if one extra document held every gram).
    Smoothed,
}

fn compute_tf(count: u32, variant: TfVariant) -> f64 {
    match variant {
        TfVariant::Linear => count as f64,
        TfVariant::LogScaled if count > 0 => 1.0 + (count as f64).ln(),
        TfVariant::LogScaled => 0.0,
    }
}

fn compute_idf(num_docs: usize, doc_frequency: usize, variant: IdfVariant) -> f64 {
    let n = num_docs as f64;
    let df = doc_frequency as f64;
    match variant {
        IdfVariant::Standard if doc_frequency > 0 => (n / df).ln() + 1.0,
        IdfVariant::Standard => 0.0,
        IdfVariant::Smoothed => ((1.0 + n) / (1.0 + df)).ln() + 1.0,
    }
}

/// Boundary-aware character n-grams (`char_wb`): each word is padded with one space on
/// both sides and n-grams never cross words. A padded word shorter than `n` is emitted
/// whole.
pub fn char_wb_ngrams(text: &str, n: usize) -> Vec<String> {
    let mut grams = Vec::new();
    if n == 0 {
        return grams;
    }
    for word in text.split_whitespace() {
        let padded: Vec<char> = std::iter::once(' ')
            .chain(word.chars())
            .chain(std::iter::once(' '))
            .collect();
        if padded.len() <= n {
            grams.push(padded.iter().collect());
            continue;
        }
        for window in padded.windows(n) {
            grams.push(window.iter().collect());
        }
    }
    grams
}

/// Shared n-gram vocabulary with its IDF weights.
#[derive(Debug, Clone)]
pub struct Vectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    params: TfIdfParams,
}

impl Vectorizer {
    /// Fit vocabulary and document frequencies over every document.
    ///
    /// Gram indices follow the lexical order of the grams, so fitting is deterministic.
    /// Both sides of a comparison are later transformed with the same IDF weights, which
    /// keeps identical strings at cosine 1.
    pub fn fit<'a, I>(docs: I, params: TfIdfParams) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let per_doc: Vec<BTreeSet<String>> = docs
            .into_iter()
            .map(|d| char_wb_ngrams(d, params.ngram).into_iter().collect())
            .collect();
        let grams: BTreeSet<&String> = per_doc.iter().flatten().collect();
        let vocabulary: HashMap<String, usize> = grams
            .into_iter()
            .enumerate()
            .map(|(i, g)| (g.clone(), i))
            .collect();

        let mut df = vec![0usize; vocabulary.len()];
        for doc in &per_doc {
            for gram in doc {
                if let Some(&idx) = vocabulary.get(gram) {
                    df[idx] += 1;
                }
            }
        }
        let idf = df
            .iter()
            .map(|&d| compute_idf(per_doc.len(), d, params.idf_variant))
            .collect();
        Self {
            vocabulary,
            idf,
            params,
        }
    }

    /// Vocabulary size.
    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Whether the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    /// TF-IDF matrix (rows = documents), each row L2-normalised.
    ///
    /// Grams outside the vocabulary are ignored; a document without known grams becomes
    /// an empty row.
    pub fn transform<S: AsRef<str>>(&self, docs: &[S]) -> CsrMatrix {
        let rows = docs
            .iter()
            .map(|d| {
                let mut tf: HashMap<usize, u32> = HashMap::new();
                for gram in char_wb_ngrams(d.as_ref(), self.params.ngram) {
                    if let Some(&idx) = self.vocabulary.get(&gram) {
                        *tf.entry(idx).or_insert(0) += 1;
                    }
                }
                let mut row: Vec<(usize, f64)> = tf
                    .into_iter()
                    .map(|(idx, c)| (idx, compute_tf(c, self.params.tf_variant) * self.idf[idx]))
                    .collect();
                let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for (_, v) in &mut row {
                        *v /= norm;
                    }
                }
                row
            })
            .collect();
        CsrMatrix::from_rows(self.vocabulary.len(), rows)
    }
}

/// Lexical index over the labels and synonyms of a term dictionary.
#[derive(Debug, Clone)]
pub struct TfIdfMapper {
    params: TfIdfParams,
    normalizer: Normalizer,
    /// `(iri, display label)` per target term.
    terms: Vec<(String, String)>,
    /// Normalised surface forms, one row each.
    target_labels: Vec<String>,
    /// Owning index into `terms` for each row of `target_labels`.
    owners: Vec<usize>,
}

impl TfIdfMapper {
    /// Index every label and synonym of `dictionary` with default parameters.
    pub fn new(dictionary: &TermDictionary) -> Self {
        Self::with_params(dictionary, TfIdfParams::default(), Normalizer::default())
    }

    /// Index with explicit parameters and normaliser.
    pub fn with_params(
        dictionary: &TermDictionary,
        params: TfIdfParams,
        normalizer: Normalizer,
    ) -> Self {
        let mut terms = Vec::with_capacity(dictionary.len());
        let mut target_labels = Vec::with_capacity(dictionary.surface_form_count());
        let mut owners = Vec::with_capacity(dictionary.surface_form_count());
        for (owner, term) in dictionary.iter().enumerate() {
            terms.push((term.iri().to_string(), term.label().to_string()));
            for form in term.surface_forms() {
                target_labels.push(normalizer.normalize(form));
                owners.push(owner);
            }
        }
        Self {
            params,
            normalizer,
            terms,
            target_labels,
            owners,
        }
    }

    /// Number of indexed label/synonym rows.
    pub fn label_count(&self) -> usize {
        self.target_labels.len()
    }

    /// Rank the indexed terms for every source string.
    ///
    /// Returns at most `max_mappings` candidates per source, each with a distinct target
    /// IRI and a score in `[min_score, 1]`, in descending score order per source.
    pub fn rank<S: AsRef<str>>(
        &self,
        sources: &[S],
        max_mappings: usize,
        min_score: f64,
    ) -> Vec<Candidate> {
        info!("Mapping {} source terms...", sources.len());
        info!(
            "...against {} ontology terms ({} labels/synonyms)",
            self.terms.len(),
            self.target_labels.len()
        );
        if sources.is_empty() || self.target_labels.is_empty() || max_mappings == 0 {
            return Vec::new();
        }
        let start = Instant::now();

        let sources_norm = self.normalizer.normalize_all(sources);
        let vectorizer = Vectorizer::fit(
            sources_norm
                .iter()
                .chain(self.target_labels.iter())
                .map(String::as_str),
            self.params,
        );
        let src = vectorizer.transform(&sources_norm);
        let tgt = vectorizer.transform(&self.target_labels);
        let scores = top_n_product(&src, &tgt.transpose(), self.params.ntop, min_score);

        let mut out = Vec::new();
        for (row, source) in sources.iter().enumerate() {
            let mut seen: HashSet<usize> = HashSet::new();
            for (col, score) in scores.row(row) {
                if seen.len() == max_mappings {
                    break;
                }
                let owner = self.owners[col];
                if !seen.insert(owner) {
                    continue;
                }
                let (iri, label) = &self.terms[owner];
                debug!(
                    "Source term: {} maps to {} ({:.4})",
                    source.as_ref(),
                    label,
                    score
                );
                out.push(Candidate {
                    source: row,
                    iri: iri.clone(),
                    label: label.clone(),
                    score: score.clamp(0.0, 1.0),
                });
            }
        }
        info!(
            "...done (mapping time: {:.2}s)",
            start.elapsed().as_secs_f64()
        );
        out
    }
}

impl TermMapper for TfIdfMapper {
    fn name(&self) -> &'static str {
        "tfidf"
    }

    fn map(
        &self,
        sources: &[SourceTerm],
        max_mappings: usize,
        min_score: f64,
    ) -> Result<Vec<Candidate>> {
        let texts: Vec<&str> = sources.iter().map(|s| s.text.as_str()).collect();
        Ok(self.rank(&texts, max_mappings, min_score))
    }
}
