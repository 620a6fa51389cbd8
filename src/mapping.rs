//! Source terms, raw candidates, and the ranking policy that turns candidates into a
//! mapping table.
//!
//! [`rank`] applies, in order: the ignore filter, the score filter, dedup by target IRI
//! (highest score wins), the per-source fan-out cap, unmapped inclusion, and tag
//! propagation. Ordering is deterministic: sources keep their input order and each
//! source's records are sorted by score descending with ties in encounter order.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::curie::curie_from_iri;

/// Tag that excludes a source term from matching.
pub const IGNORE_TAG: &str = "ignore";

/// Tag attached to records of source terms without any surviving candidate.
pub const UNMAPPED_TAG: &str = "unmapped";

/// One input string to map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTerm {
    /// Text to map.
    pub text: String,
    /// Caller-supplied or generated identifier.
    pub id: String,
    /// Free-form tags, copied onto every record of this term.
    pub tags: Vec<String>,
}

impl SourceTerm {
    /// An untagged source term.
    pub fn new(text: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            id: id.into(),
            tags: Vec::new(),
        }
    }

    /// Append `tags` as given.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Whether the term carries the ignore tag (case-insensitive).
    pub fn is_ignored(&self) -> bool {
        self.tags.iter().any(|t| t.trim().eq_ignore_ascii_case(IGNORE_TAG))
    }
}

/// A raw `(source, target, score)` triple produced by a matcher.
///
/// `source` indexes the slice of source terms handed to the matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Index of the source term.
    pub source: usize,
    /// IRI of the target term.
    pub iri: String,
    /// Display label of the target term.
    pub label: String,
    /// Similarity in `[0, 1]`.
    pub score: f64,
}

/// A finalised row of the mapping table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRecord {
    /// Id of the source term.
    pub source_term_id: String,
    /// Source text as submitted.
    pub source_term: String,
    /// Label of the target term; empty when unmapped.
    pub mapped_term_label: String,
    /// CURIE of the target term; empty when unmapped.
    pub mapped_term_curie: String,
    /// IRI of the target term; empty when unmapped.
    pub mapped_term_iri: String,
    /// Score in `[0, 1]`, 0 when unmapped.
    pub mapping_score: f64,
    /// Source tags, plus [`UNMAPPED_TAG`] when unmapped.
    pub tags: Vec<String>,
}

impl MappingRecord {
    fn mapped(source: &SourceTerm, candidate: &Candidate) -> Self {
        Self {
            source_term_id: source.id.clone(),
            source_term: source.text.clone(),
            mapped_term_label: candidate.label.clone(),
            mapped_term_curie: curie_from_iri(&candidate.iri),
            mapped_term_iri: candidate.iri.clone(),
            mapping_score: candidate.score.clamp(0.0, 1.0),
            tags: source.tags.clone(),
        }
    }

    /// Record for a source term that found no target: empty target fields, score 0,
    /// and the [`UNMAPPED_TAG`] appended to its tags.
    pub fn unmapped(source: &SourceTerm) -> Self {
        let mut tags = source.tags.clone();
        tags.push(UNMAPPED_TAG.to_string());
        Self {
            source_term_id: source.id.clone(),
            source_term: source.text.clone(),
            mapped_term_label: String::new(),
            mapped_term_curie: String::new(),
            mapped_term_iri: String::new(),
            mapping_score: 0.0,
            tags,
        }
    }

    /// Whether this record points at a target term.
    pub fn is_mapped(&self) -> bool {
        !self.mapped_term_iri.is_empty()
    }

    /// Tags joined for tabular output.
    pub fn tags_joined(&self) -> String {
        self.tags.join(",")
    }
}

/// Parameters of [`rank`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankPolicy {
    /// Records kept per source term.
    pub max_mappings: usize,
    /// Lowest score kept when `score_filter` is set.
    pub min_score: f64,
    /// Emit an unmapped record for sources left without candidates.
    pub include_unmapped: bool,
    /// When false, candidates below `min_score` are kept. Used for annotators whose
    /// scores carry no meaning.
    pub score_filter: bool,
}

impl Default for RankPolicy {
    fn default() -> Self {
        Self {
            max_mappings: 3,
            min_score: 0.3,
            include_unmapped: false,
            score_filter: true,
        }
    }
}

/// Turn raw candidates into mapping records.
///
/// Candidates whose `source` is out of range or refers to an ignored source are
/// dropped. Ignored sources are never reported as unmapped.
pub fn rank(
    sources: &[SourceTerm],
    candidates: Vec<Candidate>,
    policy: &RankPolicy,
) -> Vec<MappingRecord> {
    let mut per_source: Vec<Vec<Candidate>> = vec![Vec::new(); sources.len()];
    for c in candidates {
        let Some(source) = sources.get(c.source) else {
            continue;
        };
        if source.is_ignored() || !c.score.is_finite() {
            continue;
        }
        if policy.score_filter && c.score < policy.min_score {
            continue;
        }
        per_source[c.source].push(c);
    }

    let mut records = Vec::new();
    for (source, found) in sources.iter().zip(per_source) {
        if source.is_ignored() {
            continue;
        }
        let kept = best_per_target(found, policy.max_mappings);
        if kept.is_empty() {
            if policy.include_unmapped {
                records.push(MappingRecord::unmapped(source));
            }
            continue;
        }
        records.extend(kept.iter().map(|c| MappingRecord::mapped(source, c)));
    }
    records
}

/// Dedup by IRI keeping the best score (first seen on ties), stable-sort by score
/// descending, and cap.
fn best_per_target(found: Vec<Candidate>, max_mappings: usize) -> Vec<Candidate> {
    let mut slot: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Candidate> = Vec::with_capacity(found.len());
    for c in found {
        match slot.get(&c.iri) {
            Some(&i) => {
                if c.score > unique[i].score {
                    unique[i].score = c.score;
                    unique[i].label = c.label;
                }
            }
            None => {
                slot.insert(c.iri.clone(), unique.len());
                unique.push(c);
            }
        }
    }
    unique.sort_by(|a, b| b.score.total_cmp(&a.score));
    unique.truncate(max_mappings);
    unique
}

/// Mapping records plus the counts reported in the output header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappingTable {
    records: Vec<MappingRecord>,
    source_count: usize,
    ignored_count: usize,
}

impl MappingTable {
    /// Table of `records` ranked for `sources`.
    pub fn new(sources: &[SourceTerm], records: Vec<MappingRecord>) -> Self {
        Self {
            records,
            source_count: sources.len(),
            ignored_count: sources.iter().filter(|s| s.is_ignored()).count(),
        }
    }

    /// Records in output order.
    pub fn records(&self) -> &[MappingRecord] {
        &self.records
    }

    /// Take the records, dropping the counts.
    pub fn into_records(self) -> Vec<MappingRecord> {
        self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of source terms submitted, ignored ones included.
    pub fn source_count(&self) -> usize {
        self.source_count
    }

    /// Number of ignore-tagged source terms.
    pub fn ignored_count(&self) -> usize {
        self.ignored_count
    }

    /// Number of distinct source terms with at least one mapped record.
    pub fn mapped_source_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.is_mapped())
            .map(|r| (r.source_term_id.as_str(), r.source_term.as_str()))
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Number of distinct target IRIs.
    pub fn unique_target_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.is_mapped())
            .map(|r| r.mapped_term_iri.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Whether any record carries tags (decides whether a Tags column is written).
    pub fn has_tags(&self) -> bool {
        self.records.iter().any(|r| !r.tags.is_empty())
    }

    /// `"N of M terms mapped to K unique targets"`.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} of {} terms mapped to {} unique targets",
            self.mapped_source_count(),
            self.source_count,
            self.unique_target_count()
        );
        if self.ignored_count > 0 {
            line.push_str(&format!(" ({} ignored)", self.ignored_count));
        }
        line
    }
}
