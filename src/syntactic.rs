//! Exhaustive matcher: every source against every surface form of every term.
//!
//! `O(sources x terms x surface forms)` metric evaluations. Meant for small target sets
//! or when one exact metric matters more than throughput; the TF-IDF index is the
//! scalable path. Strings are compared as given, without normalisation.

use std::time::Instant;

use tracing::{debug, info};

use crate::mapper::TermMapper;
use crate::mapping::{Candidate, SourceTerm};
use crate::similarity::Metric;
use crate::term::TermDictionary;
use crate::Result;

/// Progress is logged every this many source terms.
const PROGRESS_STRIDE: usize = 100;

/// One metric applied pairwise against a term dictionary.
#[derive(Debug, Clone)]
pub struct SyntacticMapper {
    metric: Metric,
    /// `(iri, display label, surface forms)` per target term.
    terms: Vec<(String, String, Vec<String>)>,
}

impl SyntacticMapper {
    /// Collect the surface forms of every term in `dictionary`.
    pub fn new(dictionary: &TermDictionary, metric: Metric) -> Self {
        let terms = dictionary
            .iter()
            .map(|t| {
                (
                    t.iri().to_string(),
                    t.label().to_string(),
                    t.surface_forms().map(str::to_string).collect(),
                )
            })
            .collect();
        Self { metric, terms }
    }

    /// The metric in use.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Best-scoring terms for one source string: the max over each term's surface forms,
    /// sorted descending (stable), truncated to `max_mappings`.
    pub fn best_matches(&self, source: &str, max_mappings: usize) -> Vec<(usize, f64)> {
        let mut scored: Vec<(usize, f64)> = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, (_, _, forms))| {
                let best = forms
                    .iter()
                    .map(|f| self.metric.compare(source, f))
                    .fold(0.0f64, f64::max);
                (i, best)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(max_mappings);
        scored
    }
}

impl TermMapper for SyntacticMapper {
    fn name(&self) -> &'static str {
        self.metric.name()
    }

    fn map(
        &self,
        sources: &[SourceTerm],
        max_mappings: usize,
        _min_score: f64,
    ) -> Result<Vec<Candidate>> {
        info!(
            "Mapping {} source terms against {} ontology terms with {}",
            sources.len(),
            self.terms.len(),
            self.metric
        );
        let start = Instant::now();
        let mut out = Vec::new();
        for (idx, source) in sources.iter().enumerate() {
            if idx > 0 && idx % PROGRESS_STRIDE == 0 {
                debug!("...{idx}/{} source terms compared", sources.len());
            }
            for (term, score) in self.best_matches(&source.text, max_mappings) {
                // no lower bound here; the ranker applies `min_score`
                if score <= 0.0 {
                    continue;
                }
                let (iri, label, _) = &self.terms[term];
                out.push(Candidate {
                    source: idx,
                    iri: iri.clone(),
                    label: label.clone(),
                    score,
                });
            }
        }
        info!(
            "...done (mapping time: {:.2}s)",
            start.elapsed().as_secs_f64()
        );
        Ok(out)
    }
}
