//! Ontology loading boundary.
//!
//! Matching never depends on how an ontology document is parsed or reasoned over: a
//! loader turns a location into a [`TermDictionary`] and [`OntologyLoader::classify`]
//! derives whatever the loader can infer. Each load runs inside its own [`LoadSession`],
//! which is dropped once terms are extracted, so loads never share state.
//!
//! [`OboLoader`] reads OBO 1.4 flat files, from disk or over `http(s)`. OWL documents
//! need an external loader implementing the same trait.
//!
//! # OBO example
//!
//! ```obo
//! [Term]
//! id: GO:0008150
//! name: biological_process
//! synonym: "physiological process" EXACT []
//! is_a: BFO:0000015 ! process
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::curie::obo_iri;
use crate::remote::{HttpClient, ReqwestClient};
use crate::term::{Term, TermBuilder, TermDictionary, TermFilter, TermKind};
use crate::{Error, Result};

/// Per-load context. Records which documents were read while it lived.
#[derive(Debug, Default)]
pub struct LoadSession {
    documents: Vec<String>,
}

impl LoadSession {
    /// A session with no documents read yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that `location` was read in this session.
    pub fn record(&mut self, location: impl Into<String>) {
        self.documents.push(location.into());
    }

    /// Documents read so far.
    pub fn documents(&self) -> &[String] {
        &self.documents
    }
}

/// Turns an ontology location into a term dictionary.
pub trait OntologyLoader {
    /// Read and extract every term of the document at `location`.
    fn load(&self, session: &mut LoadSession, location: &str) -> Result<TermDictionary>;

    /// Complete the dictionary with inferred structure (at least the children of every
    /// term).
    fn classify(&self, session: &mut LoadSession, dictionary: &mut TermDictionary) -> Result<()>;
}

/// Load, classify and filter in a fresh session.
///
/// Fails with [`Error::EmptyOntology`] when no term survives the filter.
pub fn load_terms(
    loader: &dyn OntologyLoader,
    location: &str,
    filter: &TermFilter,
) -> Result<TermDictionary> {
    info!("Loading ontology {}...", location);
    let start = Instant::now();
    let mut session = LoadSession::new();
    let mut dictionary = loader.load(&mut session, location)?;
    loader.classify(&mut session, &mut dictionary)?;
    let filtered = dictionary.filter(filter);
    info!(
        "...done (ontology loading time: {:.2}s, {} of {} terms kept)",
        start.elapsed().as_secs_f64(),
        filtered.len(),
        dictionary.len()
    );
    if filtered.is_empty() {
        return Err(Error::EmptyOntology {
            location: location.to_string(),
        });
    }
    Ok(filtered)
}

/// Whole ontology documents can be large; the download timeout is generous.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Loader for OBO flat files.
///
/// Locations starting with `http://` or `https://` are downloaded; anything else is a
/// local path.
#[derive(Default)]
pub struct OboLoader {
    client: Option<Box<dyn HttpClient>>,
}

impl std::fmt::Debug for OboLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OboLoader")
            .field("client", &self.client.as_ref().map(|_| "custom"))
            .finish()
    }
}

impl OboLoader {
    /// A loader that builds a `reqwest` client whenever a location is a URL.
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader that downloads through `client`.
    pub fn with_client(client: impl HttpClient + 'static) -> Self {
        Self {
            client: Some(Box::new(client)),
        }
    }

    fn read(&self, location: &str) -> Result<String> {
        if !is_url(location) {
            return fs::read_to_string(Path::new(location)).map_err(|e| load_error(location, e));
        }
        debug!("Downloading {location}");
        let headers = [("Accept", "text/plain, */*")];
        let response = match &self.client {
            Some(client) => client.get(location, &[], &headers),
            None => ReqwestClient::new(DOWNLOAD_TIMEOUT)
                .and_then(|client| client.get(location, &[], &headers)),
        }
        .map_err(|e| load_error(location, e))?;
        if !(200..300).contains(&response.status) {
            return Err(load_error(location, format!("HTTP status {}", response.status)));
        }
        Ok(response.body)
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

fn load_error(location: &str, reason: impl ToString) -> Error {
    Error::OntologyLoad {
        location: location.to_string(),
        reason: reason.to_string(),
    }
}

impl OntologyLoader for OboLoader {
    fn load(&self, session: &mut LoadSession, location: &str) -> Result<TermDictionary> {
        let text = self.read(location)?;
        session.record(location);
        parse_obo(&text).map_err(|reason| load_error(location, reason))
    }

    fn classify(&self, _session: &mut LoadSession, dictionary: &mut TermDictionary) -> Result<()> {
        let mut links: Vec<(String, String, String)> = Vec::new();
        let mut names: BTreeMap<String, String> = BTreeMap::new();
        for term in dictionary.iter() {
            names.insert(term.iri().to_string(), term.label().to_string());
            for parent in term.parents().keys() {
                links.push((parent.clone(), term.iri().to_string(), term.label().to_string()));
            }
        }
        for (parent, child, child_label) in links {
            let parent_label = names.get(&parent).cloned();
            if let Some(p) = dictionary.get_mut(&parent) {
                p.add_child(child.as_str(), child_label);
            }
            if let (Some(label), Some(c)) = (parent_label, dictionary.get_mut(&child)) {
                c.name_parent(&parent, &label);
            }
        }
        Ok(())
    }
}

struct Pending {
    kind: TermKind,
    id: Option<String>,
    builder_ops: Vec<(String, String)>,
}

impl Pending {
    fn new(kind: TermKind) -> Self {
        Self {
            kind,
            id: None,
            builder_ops: Vec::new(),
        }
    }

    fn finish(self, line: usize) -> std::result::Result<Term, String> {
        let id = self
            .id
            .ok_or_else(|| format!("stanza ending at line {line} has no id"))?;
        let mut b: TermBuilder = Term::builder(expand_id(&id)).kind(self.kind);
        for (tag, value) in self.builder_ops {
            b = match tag.as_str() {
                "name" => b.label(value),
                "synonym" => b.synonym(quoted(&value)),
                "def" => b.definition(quoted(&value)),
                "is_a" => {
                    let (target, label) = target_and_comment(&value);
                    b.parent(expand_id(target), label)
                }
                "relationship" => match target_and_comment(&value).0.split_once(char::is_whitespace) {
                    Some((rel, target)) => b.restriction(expand_id(rel), expand_id(target.trim())),
                    None => b,
                },
                "is_obsolete" => b.deprecated(value.trim() == "true"),
                _ => b,
            };
        }
        Ok(b.build())
    }
}

/// Parse OBO text into a dictionary. `[Term]` stanzas become classes and `[Typedef]`
/// stanzas properties; other stanzas and unknown tags are skipped.
pub fn parse_obo(text: &str) -> std::result::Result<TermDictionary, String> {
    let mut dictionary = TermDictionary::new();
    let mut pending: Option<Pending> = None;

    for (n, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('!') {
            continue;
        }
        if line.starts_with('[') {
            if let Some(p) = pending.take() {
                dictionary.insert(p.finish(n)?);
            }
            pending = match line {
                "[Term]" => Some(Pending::new(TermKind::Class)),
                "[Typedef]" => Some(Pending::new(TermKind::Property)),
                _ => None,
            };
            continue;
        }
        let Some(p) = pending.as_mut() else {
            // header or unsupported stanza
            continue;
        };
        let (tag, value) = line
            .split_once(':')
            .ok_or_else(|| format!("line {}: expected `tag: value`, got `{line}`", n + 1))?;
        let (tag, value) = (tag.trim(), value.trim());
        if tag == "id" {
            p.id = Some(value.to_string());
        } else {
            p.builder_ops.push((tag.to_string(), value.to_string()));
        }
    }
    if let Some(p) = pending.take() {
        dictionary.insert(p.finish(text.lines().count())?);
    }
    debug!("Parsed {} OBO terms", dictionary.len());
    Ok(dictionary)
}

/// OBO ids become OBO PURLs; Typedef names without a prefix (`part_of`) are kept.
fn expand_id(id: &str) -> String {
    let id = id.trim();
    if is_url(id) {
        id.to_string()
    } else if id.contains(':') {
        obo_iri(id)
    } else {
        id.to_string()
    }
}

/// Split `GO:0001 ! label` into the target and the trailing comment.
fn target_and_comment(value: &str) -> (&str, &str) {
    match value.split_once('!') {
        Some((target, comment)) => (target.trim(), comment.trim()),
        None => (value.trim(), ""),
    }
}

/// Text between the first pair of double quotes, or the whole value.
fn quoted(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.split_once('"'))
        .map(|(inner, _)| inner.to_string())
        .unwrap_or_else(|| value.to_string())
}
