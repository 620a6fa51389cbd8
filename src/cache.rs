//! On-disk snapshots of extracted term dictionaries.
//!
//! Layout, one directory per acronym:
//!
//! ```text
//! <root>/<ACRONYM>/<ACRONYM>-term-details.bin   postcard-encoded TermDictionary
//! <root>/<ACRONYM>/<ACRONYM>-term-graphs.json   neighborhood graph of every term
//! ```
//!
//! Snapshots hold the *unfiltered* dictionary; [`TermCache::load`] applies the caller's
//! [`TermFilter`] exactly as a fresh load would. Writes go through a temp file in the
//! target directory followed by a rename. Concurrent writers for the same acronym are not
//! coordinated; callers must not cache one acronym from several processes at once.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::graph::term_graphs;
use crate::loader::{LoadSession, OntologyLoader};
use crate::term::{TermDictionary, TermFilter};
use crate::{Error, Result};

/// Default cache root, relative to the working directory.
pub const DEFAULT_CACHE_ROOT: &str = "cache";

/// A directory of cached ontologies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermCache {
    root: PathBuf,
}

impl Default for TermCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_ROOT)
    }
}

impl TermCache {
    /// A cache rooted at `root`; nothing is created until the first store.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one ontology's snapshot.
    pub fn entry_dir(&self, acronym: &str) -> PathBuf {
        self.root.join(acronym)
    }

    /// Path of the encoded dictionary.
    pub fn details_path(&self, acronym: &str) -> PathBuf {
        self.entry_dir(acronym)
            .join(format!("{acronym}-term-details.bin"))
    }

    /// Path of the graph export.
    pub fn graphs_path(&self, acronym: &str) -> PathBuf {
        self.entry_dir(acronym)
            .join(format!("{acronym}-term-graphs.json"))
    }

    /// Snapshot `dictionary` under `acronym`, replacing any previous snapshot.
    pub fn store(&self, dictionary: &TermDictionary, acronym: &str) -> Result<()> {
        check_acronym(acronym)?;
        let dir = self.entry_dir(acronym);
        fs::create_dir_all(&dir)?;

        let bytes =
            postcard::to_allocvec(dictionary).map_err(|e| Error::Serialization(e.to_string()))?;
        atomic_write(&dir, &self.details_path(acronym), &bytes)?;

        let graphs = serde_json::to_vec(&term_graphs(dictionary))
            .map_err(|e| Error::Serialization(e.to_string()))?;
        atomic_write(&dir, &self.graphs_path(acronym), &graphs)?;

        info!(
            "Cached {} terms of {} in {}",
            dictionary.len(),
            acronym,
            dir.display()
        );
        Ok(())
    }

    /// Whether a snapshot exists for `acronym`.
    pub fn exists(&self, acronym: &str) -> bool {
        check_acronym(acronym).is_ok() && self.details_path(acronym).is_file()
    }

    /// Read a snapshot and apply `filter`.
    pub fn load(&self, acronym: &str, filter: &TermFilter) -> Result<TermDictionary> {
        check_acronym(acronym)?;
        let path = self.details_path(acronym);
        if !path.is_file() {
            return Err(Error::CacheMiss {
                acronym: acronym.to_string(),
                path: path.display().to_string(),
            });
        }
        let start = Instant::now();
        let bytes = fs::read(&path)?;
        let dictionary: TermDictionary =
            postcard::from_bytes(&bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        let filtered = dictionary.filter(filter);
        info!(
            "Loaded {} of {} cached terms of {} ({:.2}s)",
            filtered.len(),
            dictionary.len(),
            acronym,
            start.elapsed().as_secs_f64()
        );
        Ok(filtered)
    }

    /// Delete one snapshot, or every snapshot when `acronym` is `None`.
    ///
    /// Clearing everything only removes entry directories (those holding their
    /// `-term-details.bin`); the root itself goes only if nothing else is left in it.
    /// Failures are logged, never returned.
    pub fn clear(&self, acronym: Option<&str>) {
        match acronym {
            Some(a) => match check_acronym(a) {
                Ok(()) => remove_entry(&self.entry_dir(a)),
                Err(e) => error!("Cannot clear cache entry: {e}"),
            },
            None => self.clear_all(),
        }
    }

    fn clear_all(&self) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Nothing to clear at {}", self.root.display());
                return;
            }
            Err(e) => {
                error!("Failed to read cache {}: {}", self.root.display(), e);
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            match name.to_str() {
                Some(acronym) if self.exists(acronym) => remove_entry(&entry.path()),
                _ => warn!("Leaving {} in place", entry.path().display()),
            }
        }
        let empty = fs::read_dir(&self.root)
            .map(|mut rest| rest.next().is_none())
            .unwrap_or(false);
        if !empty {
            return;
        }
        match fs::remove_dir(&self.root) {
            Ok(()) => info!("Removed empty cache root {}", self.root.display()),
            Err(e) => error!("Failed to remove {}: {}", self.root.display(), e),
        }
    }

    /// Load, classify and snapshot the ontology at `location`.
    pub fn cache_ontology(
        &self,
        loader: &dyn OntologyLoader,
        location: &str,
        acronym: &str,
    ) -> Result<TermDictionary> {
        check_acronym(acronym)?;
        let mut session = LoadSession::new();
        let mut dictionary = loader.load(&mut session, location)?;
        loader.classify(&mut session, &mut dictionary)?;
        if dictionary.is_empty() {
            return Err(Error::EmptyOntology {
                location: location.to_string(),
            });
        }
        self.store(&dictionary, acronym)?;
        Ok(dictionary)
    }

    /// Cache every ontology listed in a registry CSV with `acronym` and `url` columns.
    ///
    /// Rows that fail to load are logged and skipped. Returns the acronyms cached.
    pub fn store_set(&self, registry: &Path, loader: &dyn OntologyLoader) -> Result<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(registry)?;
        let mut cached = Vec::new();
        for row in reader.deserialize() {
            let entry: RegistryEntry = row?;
            if entry.acronym.is_empty() || entry.url.is_empty() {
                warn!("Skipping incomplete registry row {:?}", entry);
                continue;
            }
            match self.cache_ontology(loader, &entry.url, &entry.acronym) {
                Ok(_) => cached.push(entry.acronym),
                Err(e) => error!("Could not cache {} from {}: {}", entry.acronym, entry.url, e),
            }
        }
        Ok(cached)
    }
}

fn remove_entry(dir: &Path) {
    if !dir.exists() {
        info!("Nothing to clear at {}", dir.display());
        return;
    }
    match fs::remove_dir_all(dir) {
        Ok(()) => info!("Cleared cache {}", dir.display()),
        Err(e) => error!("Failed to clear cache {}: {}", dir.display(), e),
    }
}

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    acronym: String,
    url: String,
}

fn check_acronym(acronym: &str) -> Result<()> {
    let bad = acronym.is_empty()
        || acronym == "."
        || acronym == ".."
        || acronym.contains(|c: char| c == '/' || c == '\\');
    if bad {
        return Err(Error::Configuration(format!(
            "invalid ontology acronym `{acronym}`"
        )));
    }
    Ok(())
}

fn atomic_write(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::OboLoader;
    use crate::term::{Term, TermKind, TermKindFilter};

    fn dictionary() -> TermDictionary {
        [
            Term::builder("http://www.ebi.ac.uk/efo/EFO_0000270")
                .label("asthma")
                .synonym("asthmatic")
                .parent("http://www.ebi.ac.uk/efo/EFO_0000408", "disease")
                .build(),
            Term::builder("http://purl.obolibrary.org/obo/MONDO_0004979")
                .label("asthma")
                .deprecated(true)
                .build(),
            Term::builder("http://www.ebi.ac.uk/efo/has_property")
                .kind(TermKind::Property)
                .build(),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn store_then_load_round_trips_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TermCache::new(dir.path());
        cache.store(&dictionary(), "EFO").unwrap();
        assert!(cache.exists("EFO"));
        assert!(cache.graphs_path("EFO").is_file());

        let all = TermFilter {
            kind: TermKindFilter::Any,
            ..TermFilter::default()
        };
        let loaded = cache.load("EFO", &all).unwrap();
        assert_eq!(loaded, dictionary());
        let original = dictionary();
        for term in original.iter() {
            let back = loaded.get(term.iri()).unwrap();
            assert_eq!(back.labels(), term.labels());
            assert_eq!(back.synonyms(), term.synonyms());
            assert_eq!(back.parents(), term.parents());
            assert_eq!(back.kind(), term.kind());
            assert_eq!(back.is_deprecated(), term.is_deprecated());
        }
        let asthma = loaded.get("http://www.ebi.ac.uk/efo/EFO_0000270").unwrap();
        assert!(asthma.synonyms().contains("asthmatic"));
        assert_eq!(
            asthma.parents().get("http://www.ebi.ac.uk/efo/EFO_0000408"),
            Some(&"disease".to_string())
        );

        let strict = TermFilter {
            base_iris: vec!["http://www.ebi.ac.uk/efo/".into()],
            exclude_deprecated: true,
            kind: TermKindFilter::Class,
        };
        let loaded = cache.load("EFO", &strict).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded, dictionary().filter(&strict));
    }

    #[test]
    fn store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TermCache::new(dir.path());
        cache.store(&dictionary(), "EFO").unwrap();
        let one: TermDictionary = [Term::builder("http://x.org/a").build()].into_iter().collect();
        cache.store(&one, "EFO").unwrap();
        assert_eq!(cache.load("EFO", &TermFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn missing_entry_names_expected_path() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TermCache::new(dir.path());
        assert!(!cache.exists("NOPE"));
        match cache.load("NOPE", &TermFilter::default()) {
            Err(Error::CacheMiss { acronym, path }) => {
                assert_eq!(acronym, "NOPE");
                assert!(path.ends_with("NOPE-term-details.bin"));
            }
            other => panic!("expected cache miss, got {other:?}"),
        }
    }

    #[test]
    fn clear_removes_one_entry_or_everything() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        let cache = TermCache::new(&root);
        cache.store(&dictionary(), "EFO").unwrap();
        cache.store(&dictionary(), "MONDO").unwrap();

        cache.clear(Some("EFO"));
        assert!(!cache.exists("EFO"));
        assert!(cache.exists("MONDO"));

        cache.clear(None);
        assert!(!cache.exists("MONDO"));
        assert!(!root.exists());
        // clearing again is a logged no-op
        cache.clear(None);
    }

    #[test]
    fn clearing_everything_spares_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TermCache::new(dir.path());
        cache.store(&dictionary(), "EFO").unwrap();
        cache.store(&dictionary(), "MONDO").unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();

        cache.clear(None);
        assert!(!cache.exists("EFO"));
        assert!(!cache.exists("MONDO"));
        assert!(!cache.entry_dir("EFO").exists());
        assert!(dir.path().join("notes.txt").is_file());
        assert!(dir.path().join("src/main.rs").is_file());
    }

    #[test]
    fn acronyms_cannot_escape_the_root() {
        let cache = TermCache::new("unused");
        assert!(matches!(
            cache.store(&dictionary(), "../x"),
            Err(Error::Configuration(_))
        ));
        assert!(!cache.exists(".."));
    }

    #[test]
    fn store_set_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let obo = dir.path().join("tiny.obo");
        fs::write(&obo, "[Term]\nid: TST:1\nname: asthma\n").unwrap();
        let registry = dir.path().join("registry.csv");
        fs::write(
            &registry,
            format!(
                "acronym,version,url\nTST,1,{}\nBAD,1,{}\n",
                obo.display(),
                dir.path().join("missing.obo").display()
            ),
        )
        .unwrap();
        let cache = TermCache::new(dir.path().join("cache"));
        let cached = cache.store_set(&registry, &OboLoader::new()).unwrap();
        assert_eq!(cached, vec!["TST"]);
        assert!(cache.exists("TST"));
        assert!(!cache.exists("BAD"));
    }
}
