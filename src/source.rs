//! Source-term inputs and their resolution into [`SourceTerm`]s.
//!
//! Callers hand over terms in one of several shapes; [`SourceInput::resolve`] turns every
//! shape into the same `(text, id, tags)` triples once, at the boundary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::mapping::SourceTerm;
use crate::{Error, Result};

/// Namespace of generated source-term identifiers.
pub const SOURCE_ID_BASE: &str = "http://ccb.hms.harvard.edu/t2t/";

/// A fresh identifier for a source term that came without one:
/// [`SOURCE_ID_BASE`] + `R` + ten random alphanumerics.
pub fn generate_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{SOURCE_ID_BASE}R{}", &random[..10])
}

/// A term with tags, as produced by tagged preprocessing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaggedTerm {
    /// Text to map (possibly rewritten by preprocessing).
    pub term: String,
    pub tags: Vec<String>,
    /// Text before preprocessing.
    pub original: String,
    /// Caller-supplied identifier; generated when absent.
    pub id: Option<String>,
}

impl TaggedTerm {
    pub fn new(term: impl Into<String>) -> Self {
        let term = term.into();
        Self {
            original: term.clone(),
            term,
            tags: Vec::new(),
            id: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_tags(tags);
        self
    }

    /// Append tags, skipping blanks and ones already present.
    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into().trim().to_string();
            if !tag.is_empty() && !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }
}

/// Which columns of a delimited file hold the term text and (optionally) its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvColumns {
    pub term: String,
    pub id: Option<String>,
}

impl CsvColumns {
    /// Parse `"term_col"` or `"term_col,id_col"`.
    pub fn parse(list: &str) -> Result<Self> {
        let mut parts = list.split(',').map(str::trim);
        let term = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| {
            Error::Configuration(format!("empty CSV column list `{list}`"))
        })?;
        let id = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        if parts.next().is_some() {
            return Err(Error::Configuration(format!(
                "CSV column list `{list}` names more than two columns"
            )));
        }
        Ok(Self {
            term: term.to_string(),
            id,
        })
    }
}

/// Source terms in every shape a caller may supply them.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceInput {
    /// A file: one term per line, or a delimited table when `csv_columns` is set.
    File {
        path: PathBuf,
        csv_columns: Option<CsvColumns>,
        /// Field delimiter; defaults to tab for `.tsv` files and comma otherwise.
        separator: Option<u8>,
    },
    /// `(term text, tags)` pairs.
    Dict(Vec<(String, Vec<String>)>),
    /// Pre-tagged terms.
    List(Vec<TaggedTerm>),
    /// Bare strings.
    Plain(Vec<String>),
}

impl SourceInput {
    /// A plain list file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            csv_columns: None,
            separator: None,
        }
    }

    /// Canonical source terms, in input order.
    pub fn resolve(&self) -> Result<Vec<SourceTerm>> {
        let terms = match self {
            Self::File {
                path,
                csv_columns: None,
                ..
            } => read_list(path)?
                .into_iter()
                .map(|t| SourceTerm::new(t, generate_id()))
                .collect(),
            Self::File {
                path,
                csv_columns: Some(columns),
                separator,
            } => read_table(path, columns, separator.unwrap_or_else(|| default_separator(path)))?,
            Self::Dict(pairs) => pairs
                .iter()
                .map(|(term, tags)| {
                    SourceTerm::new(term.as_str(), generate_id()).with_tags(tags.iter().cloned())
                })
                .collect(),
            Self::List(tagged) => tagged
                .iter()
                .map(|t| {
                    let id = t.id.clone().unwrap_or_else(generate_id);
                    SourceTerm::new(t.term.as_str(), id).with_tags(t.tags.iter().cloned())
                })
                .collect(),
            Self::Plain(terms) => terms
                .iter()
                .map(|t| SourceTerm::new(t.as_str(), generate_id()))
                .collect(),
        };
        Ok(terms)
    }
}

fn default_separator(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

/// One term per non-blank line, trimmed.
pub fn read_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    let terms: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    info!("Read {} source terms from {}", terms.len(), path.display());
    Ok(terms)
}

/// Terms (and optional ids) from named columns of a delimited file with a header row.
/// Rows with an empty term are dropped; empty ids are generated.
pub fn read_table(path: &Path, columns: &CsvColumns, separator: u8) -> Result<Vec<SourceTerm>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let find = |name: &str| {
        headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
            Error::Configuration(format!(
                "column `{name}` not found in {} (columns: {})",
                path.display(),
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
        })
    };
    let term_idx = find(&columns.term)?;
    let id_idx = columns.id.as_deref().map(find).transpose()?;

    let mut terms = Vec::new();
    for row in reader.records() {
        let row = row?;
        let text = row.get(term_idx).unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }
        let id = id_idx
            .and_then(|i| row.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(generate_id);
        terms.push(SourceTerm::new(text, id));
    }
    info!("Read {} source terms from {}", terms.len(), path.display());
    Ok(terms)
}
