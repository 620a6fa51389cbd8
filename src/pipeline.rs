//! End-to-end mapping runs: resolve the target terms, build the configured mapper once,
//! map the non-ignored sources, and rank.

use std::time::Instant;

use tracing::info;

use crate::cache::TermCache;
use crate::config::Config;
use crate::loader::{load_terms, OntologyLoader};
use crate::mapper::{MapperContext, MapperKind};
use crate::mapping::{rank, MappingTable, SourceTerm};
use crate::term::TermDictionary;
use crate::{Error, Result};

/// What the sources are mapped against.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Terms already loaded (from a file or the cache).
    Terms(&'a TermDictionary),
    /// Ontology acronyms for a remote annotator; `["all"]` means no restriction.
    Remote(&'a [String]),
}

/// Load the target terms of a run: from the cache when `use_cache` is set (`location`
/// is then an acronym), otherwise by loading `location` with `loader`.
///
/// The configured [`TermFilter`](crate::TermFilter) is applied either way.
pub fn load_target(
    loader: &dyn OntologyLoader,
    location: &str,
    use_cache: bool,
    config: &Config,
) -> Result<TermDictionary> {
    let filter = config.term_filter();
    if !use_cache {
        return load_terms(loader, location, &filter);
    }
    let dictionary = TermCache::new(&config.cache.root).load(location, &filter)?;
    if dictionary.is_empty() {
        return Err(Error::EmptyOntology {
            location: location.to_string(),
        });
    }
    Ok(dictionary)
}

/// Load `location` and snapshot it under `acronym` in the configured cache.
pub fn cache_ontology(
    loader: &dyn OntologyLoader,
    location: &str,
    acronym: &str,
    config: &Config,
) -> Result<TermDictionary> {
    TermCache::new(&config.cache.root).cache_ontology(loader, location, acronym)
}

/// Map `sources` onto `target` with the mapper and policy of `config`.
///
/// Ignore-tagged sources never reach the mapper and are counted in the table summary.
pub fn map_terms(sources: &[SourceTerm], target: Target<'_>, config: &Config) -> Result<MappingTable> {
    let kind = config.mapping.mapper;
    let ctx = context(kind, target, config)?;
    let mapper = kind.build(&ctx)?;
    let policy = config.rank_policy();

    let active: Vec<usize> = (0..sources.len()).filter(|&i| !sources[i].is_ignored()).collect();
    let batch: Vec<SourceTerm> = active.iter().map(|&i| sources[i].clone()).collect();
    info!(
        "Running the {} mapper on {} source terms ({} ignored)",
        mapper.name(),
        batch.len(),
        sources.len() - batch.len()
    );
    let start = Instant::now();
    let mut candidates = if batch.is_empty() {
        Vec::new()
    } else {
        mapper.map(&batch, policy.max_mappings, policy.min_score)?
    };
    for c in &mut candidates {
        c.source = active[c.source];
    }
    let table = MappingTable::new(sources, rank(sources, candidates, &policy));
    info!(
        "{} ({:.2}s)",
        table.summary(),
        start.elapsed().as_secs_f64()
    );
    Ok(table)
}

fn context<'a>(kind: MapperKind, target: Target<'a>, config: &Config) -> Result<MapperContext<'a>> {
    let (dictionary, ontologies): (_, &'a [String]) = match (target, kind.is_remote()) {
        (Target::Terms(dict), false) => (Some(dict), &[]),
        (Target::Remote(ontologies), true) => (None, ontologies),
        (Target::Terms(_), true) => {
            return Err(Error::Configuration(format!(
                "mapper `{kind}` annotates against remote ontologies, not a loaded dictionary"
            )))
        }
        (Target::Remote(_), false) => {
            return Err(Error::Configuration(format!(
                "mapper `{kind}` needs a loaded target ontology"
            )))
        }
    };
    Ok(MapperContext {
        dictionary,
        ontologies,
        tfidf: config.tfidf_params(),
        remote: config.remote.clone(),
    })
}
