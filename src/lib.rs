//! `ontomap`: map free-text source terms onto controlled ontology terms.
//!
//! The crate takes uncontrolled vocabulary (survey field labels, trait descriptions, ...)
//! and ranks candidate terms from a target ontology for each input string:
//! - `tfidf` builds a character n-gram TF-IDF index over term labels and synonyms and
//!   ranks with a bounded top-N sparse cosine product (the default mapper).
//! - `syntactic` compares every source against every term with a single string metric.
//! - `remote` delegates to external annotation services (BioPortal, Zooma).
//!
//! Whatever produced the raw candidates, `mapping::rank` applies one ranking policy:
//! score threshold, dedup by target IRI, per-source fan-out cap, optional unmapped rows.
//!
//! Scope:
//! - Synchronous, batch-oriented mapping runs
//! - Deterministic ranking (score desc, then encounter order)
//! - On-disk snapshots of extracted term dictionaries (`cache`)
//!
//! Non-goals:
//! - OWL parsing / reasoning (behind `loader::OntologyLoader`; an OBO loader ships for convenience)
//! - Embedding-based similarity
//! - A persistent database
//!
//! References:
//! - Spärck Jones (1972): term specificity / IDF motivation
//! - Winkler (1990): string comparator metrics for record linkage

pub mod cache;
pub mod config;
pub mod curie;
pub mod graph;
pub mod loader;
pub mod mapper;
pub mod mapping;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod preprocess;
pub mod remote;
pub mod similarity;
pub mod source;
pub mod sparse;
pub mod syntactic;
pub mod term;
pub mod tfidf;

pub use error::{Error, Result};
pub use mapper::MapperKind;
pub use mapping::{MappingRecord, MappingTable, SourceTerm};
pub use term::{Term, TermDictionary, TermFilter, TermKind, TermKindFilter};

mod error {
    /// Errors for ontology term mapping.
    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        /// Invalid mapper name, term-type filter, or other caller-supplied setting.
        #[error("configuration error: {0}")]
        Configuration(String),
        /// The ontology document could not be read or parsed.
        #[error("could not load ontology `{location}`: {reason}")]
        OntologyLoad {
            /// Path or URL of the ontology document.
            location: String,
            /// What went wrong.
            reason: String,
        },
        /// A cached ontology was requested but is not on disk.
        #[error("ontology `{acronym}` is not cached (expected {path}); cache it first")]
        CacheMiss {
            /// Acronym the caller asked for.
            acronym: String,
            /// Snapshot path that was looked up.
            path: String,
        },
        /// Loading (and filtering) produced no terms to map against.
        #[error("could not find any terms in ontology `{location}`")]
        EmptyOntology {
            /// Path, URL or cache acronym of the ontology.
            location: String,
        },
        /// A remote annotation service failed.
        #[error("remote service error: {0}")]
        Remote(String),
        /// Snapshot encoding/decoding failed.
        #[error("serialization error: {0}")]
        Serialization(String),
        /// Filesystem failure.
        #[error(transparent)]
        Io(#[from] std::io::Error),
        /// CSV read/write failure.
        #[error(transparent)]
        Csv(#[from] csv::Error),
        /// A preprocessing template was not a valid regular expression.
        #[error(transparent)]
        Regex(#[from] regex::Error),
    }

    /// Result alias used across the crate.
    pub type Result<T, E = Error> = std::result::Result<T, E>;
}
