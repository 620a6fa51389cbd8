//! Ontology term records and the term dictionary consumed by every mapper.
//!
//! A [`Term`] is a flattened, immutable view of one class or property: its labels,
//! synonyms, definitions and named neighbours. Terms are identified by IRI alone.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::curie::label_from_iri;
use crate::Error;

/// Kind of ontology entity a term was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TermKind {
    /// An OWL class (or OBO `[Term]`).
    #[default]
    Class,
    /// An object/data/annotation property (or OBO `[Typedef]`).
    Property,
}

impl fmt::Display for TermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class => f.write_str("class"),
            Self::Property => f.write_str("property"),
        }
    }
}

/// Which term kinds survive filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TermKindFilter {
    /// Classes only.
    #[default]
    Class,
    /// Properties only.
    Property,
    /// Both classes and properties.
    Any,
}

impl TermKindFilter {
    /// Whether a term of `kind` passes this filter.
    pub fn accepts(self, kind: TermKind) -> bool {
        match self {
            Self::Class => kind == TermKind::Class,
            Self::Property => kind == TermKind::Property,
            Self::Any => true,
        }
    }
}

impl FromStr for TermKindFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "class" | "classes" => Ok(Self::Class),
            "property" | "properties" => Ok(Self::Property),
            "any" | "both" => Ok(Self::Any),
            other => Err(Error::Configuration(format!(
                "invalid term type `{other}` (expected class, property or any)"
            ))),
        }
    }
}

impl TryFrom<String> for TermKindFilter {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TermKindFilter> for String {
    fn from(value: TermKindFilter) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TermKindFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class => f.write_str("class"),
            Self::Property => f.write_str("property"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// One ontology term.
///
/// Equality and hashing consider only the IRI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    iri: String,
    labels: BTreeSet<String>,
    synonyms: BTreeSet<String>,
    definitions: BTreeSet<String>,
    parents: BTreeMap<String, String>,
    children: BTreeMap<String, String>,
    instances: BTreeMap<String, String>,
    restrictions: BTreeMap<String, String>,
    deprecated: bool,
    kind: TermKind,
}

impl Term {
    /// Start building a term with the given IRI.
    pub fn builder(iri: impl Into<String>) -> TermBuilder {
        TermBuilder::new(iri)
    }

    /// Term IRI.
    pub fn iri(&self) -> &str {
        &self.iri
    }

    /// Human-readable labels (never empty).
    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    /// A single label for display: the first label in lexical order.
    pub fn label(&self) -> &str {
        self.labels.iter().next().map(String::as_str).unwrap_or(&self.iri)
    }

    /// Synonyms (alternative labels).
    pub fn synonyms(&self) -> &BTreeSet<String> {
        &self.synonyms
    }

    /// Textual definitions.
    pub fn definitions(&self) -> &BTreeSet<String> {
        &self.definitions
    }

    /// Named superclasses: IRI -> label.
    pub fn parents(&self) -> &BTreeMap<String, String> {
        &self.parents
    }

    /// Direct subclasses: IRI -> label.
    pub fn children(&self) -> &BTreeMap<String, String> {
        &self.children
    }

    /// Instances: IRI -> label.
    pub fn instances(&self) -> &BTreeMap<String, String> {
        &self.instances
    }

    /// Unnamed superclass restrictions: property IRI -> filler description.
    pub fn restrictions(&self) -> &BTreeMap<String, String> {
        &self.restrictions
    }

    /// Whether the term is marked obsolete.
    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    /// Class or property.
    pub fn kind(&self) -> TermKind {
        self.kind
    }

    /// Labels followed by synonyms: every string the term can be matched through.
    pub fn surface_forms(&self) -> impl Iterator<Item = &str> + '_ {
        self.labels
            .iter()
            .chain(self.synonyms.iter())
            .map(String::as_str)
    }

    pub(crate) fn add_child(&mut self, iri: impl Into<String>, label: impl Into<String>) {
        self.children.insert(iri.into(), label.into());
    }

    /// Set the label of a known parent when it has none yet.
    pub(crate) fn name_parent(&mut self, iri: &str, label: &str) {
        if let Some(slot) = self.parents.get_mut(iri) {
            if slot.is_empty() {
                *slot = label.to_string();
            }
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.iri == other.iri
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.iri.hash(state);
    }
}

/// Builder for [`Term`].
#[derive(Debug, Clone)]
pub struct TermBuilder {
    term: Term,
}

impl TermBuilder {
    fn new(iri: impl Into<String>) -> Self {
        Self {
            term: Term {
                iri: iri.into(),
                labels: BTreeSet::new(),
                synonyms: BTreeSet::new(),
                definitions: BTreeSet::new(),
                parents: BTreeMap::new(),
                children: BTreeMap::new(),
                instances: BTreeMap::new(),
                restrictions: BTreeMap::new(),
                deprecated: false,
                kind: TermKind::Class,
            },
        }
    }

    /// Add a label. Blank labels are ignored.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if !label.trim().is_empty() {
            self.term.labels.insert(label);
        }
        self
    }

    /// Add a synonym. Blank synonyms are ignored.
    pub fn synonym(mut self, synonym: impl Into<String>) -> Self {
        let synonym = synonym.into();
        if !synonym.trim().is_empty() {
            self.term.synonyms.insert(synonym);
        }
        self
    }

    /// Add a definition.
    pub fn definition(mut self, definition: impl Into<String>) -> Self {
        self.term.definitions.insert(definition.into());
        self
    }

    /// Add a named superclass.
    pub fn parent(mut self, iri: impl Into<String>, label: impl Into<String>) -> Self {
        self.term.parents.insert(iri.into(), label.into());
        self
    }

    /// Add a direct subclass.
    pub fn child(mut self, iri: impl Into<String>, label: impl Into<String>) -> Self {
        self.term.children.insert(iri.into(), label.into());
        self
    }

    /// Add an instance.
    pub fn instance(mut self, iri: impl Into<String>, label: impl Into<String>) -> Self {
        self.term.instances.insert(iri.into(), label.into());
        self
    }

    /// Add a complex superclass restriction.
    pub fn restriction(mut self, property: impl Into<String>, filler: impl Into<String>) -> Self {
        self.term.restrictions.insert(property.into(), filler.into());
        self
    }

    /// Mark deprecated (or not).
    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.term.deprecated = deprecated;
        self
    }

    /// Set the term kind.
    pub fn kind(mut self, kind: TermKind) -> Self {
        self.term.kind = kind;
        self
    }

    /// Finish the term, synthesising a label from the IRI when none was given.
    pub fn build(mut self) -> Term {
        if self.term.labels.is_empty() {
            self.term.labels.insert(label_from_iri(&self.term.iri));
        }
        self.term
    }
}

/// Restricts which terms of a dictionary take part in mapping.
///
/// The three conditions are independent and combined with AND; they apply the same way
/// to freshly loaded and cached dictionaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermFilter {
    /// Keep only terms whose IRI starts with one of these prefixes (all terms when empty).
    pub base_iris: Vec<String>,
    /// Drop terms marked deprecated.
    pub exclude_deprecated: bool,
    /// Keep classes, properties, or both.
    pub kind: TermKindFilter,
}

impl TermFilter {
    /// Whether `term` passes every condition.
    pub fn accepts(&self, term: &Term) -> bool {
        let in_base = self.base_iris.is_empty()
            || self
                .base_iris
                .iter()
                .any(|base| term.iri().starts_with(base.trim()));
        let live = !self.exclude_deprecated || !term.is_deprecated();
        in_base && live && self.kind.accepts(term.kind())
    }
}

/// Mapping from term IRI to [`Term`].
///
/// Iteration is ordered by IRI so that every mapper sees terms in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermDictionary {
    terms: BTreeMap<String, Term>,
}

impl TermDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a term, returning the previous term with the same IRI.
    pub fn insert(&mut self, term: Term) -> Option<Term> {
        self.terms.insert(term.iri().to_string(), term)
    }

    /// Look up a term by IRI.
    pub fn get(&self, iri: &str) -> Option<&Term> {
        self.terms.get(iri)
    }

    pub(crate) fn get_mut(&mut self, iri: &str) -> Option<&mut Term> {
        self.terms.get_mut(iri)
    }

    /// Whether a term with this IRI exists.
    pub fn contains(&self, iri: &str) -> bool {
        self.terms.contains_key(iri)
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether there are no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Iterate terms in IRI order.
    pub fn iter(&self) -> impl Iterator<Item = &Term> + '_ {
        self.terms.values()
    }

    /// Total number of labels and synonyms across all terms.
    pub fn surface_form_count(&self) -> usize {
        self.iter().map(|t| t.labels().len() + t.synonyms().len()).sum()
    }

    /// Copy of this dictionary restricted to terms accepted by `filter`.
    pub fn filter(&self, filter: &TermFilter) -> TermDictionary {
        let terms = self
            .terms
            .iter()
            .filter(|(_, term)| filter.accepts(term))
            .map(|(iri, term)| (iri.clone(), term.clone()))
            .collect();
        TermDictionary { terms }
    }
}

impl FromIterator<Term> for TermDictionary {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        let mut dict = TermDictionary::new();
        for term in iter {
            dict.insert(term);
        }
        dict
    }
}
