//! `ontomap` CLI: map term lists onto ontologies and manage the term cache.

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use ontomap::cache::TermCache;
#[cfg(feature = "cli")]
use ontomap::config::Config;
#[cfg(feature = "cli")]
use ontomap::graph::term_graphs;
#[cfg(feature = "cli")]
use ontomap::loader::OboLoader;
#[cfg(feature = "cli")]
use ontomap::output::{default_output_path, write_graphs, write_mappings, RunMetadata};
#[cfg(feature = "cli")]
use ontomap::pipeline::{cache_ontology, load_target, map_terms, Target};
#[cfg(feature = "cli")]
use ontomap::source::{CsvColumns, SourceInput};
#[cfg(feature = "cli")]
use ontomap::{MapperKind, TermKindFilter};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(author, version, about = "Map free-text terms onto ontology terms", long_about = None)]
struct Args {
    /// TOML configuration file; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory (overrides `cache.root`).
    #[arg(long, global = true)]
    cache_root: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Map the terms of a file onto a target ontology.
    Map {
        /// Source terms: one per line, or a CSV/TSV table with `--csv-input`.
        #[arg(short, long)]
        source: PathBuf,

        /// Ontology file or URL, cache acronym (with `--use-cache`), or comma-separated
        /// ontology acronyms for remote mappers.
        #[arg(short, long)]
        target: String,

        /// Output CSV (default: timestamped file in the working directory).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Read the source as a table: `term_column[,id_column]`.
        #[arg(long)]
        csv_input: Option<String>,

        /// Mapper key, e.g. tfidf, levenshtein, jaro-winkler, bioportal, zooma.
        #[arg(short, long, value_parser = parse_mapper)]
        mapper: Option<MapperKind>,

        /// Maximum mappings per source term.
        #[arg(long)]
        top: Option<usize>,

        #[arg(long)]
        min_score: Option<f64>,

        /// Comma-separated IRI prefixes target terms must start with.
        #[arg(long)]
        base_iris: Option<String>,

        #[arg(long, default_value_t = false)]
        exclude_deprecated: bool,

        /// class, property or any.
        #[arg(long, value_parser = parse_term_type)]
        term_type: Option<TermKindFilter>,

        /// Emit a row for source terms without mappings.
        #[arg(long, default_value_t = false)]
        include_unmapped: bool,

        /// Treat `--target` as the acronym of a cached ontology.
        #[arg(long, default_value_t = false)]
        use_cache: bool,

        /// Also write the neighborhood graphs of the target terms.
        #[arg(long, default_value_t = false)]
        save_graphs: bool,
    },
    /// Load an ontology and store its terms in the cache.
    Cache {
        /// Ontology file or URL.
        ontology: String,
        acronym: String,
    },
    /// Cache every ontology of a registry CSV (`acronym,url` header).
    CacheSet { registry: PathBuf },
    /// Print whether an acronym is cached.
    CacheStatus { acronym: String },
    /// Remove one cached ontology, or every cached ontology.
    ClearCache { acronym: Option<String> },
    /// Rewrite a term list with regex templates (`pattern[::tag,...]` per line).
    Preprocess { input: PathBuf, templates: PathBuf },
}

#[cfg(feature = "cli")]
fn parse_mapper(s: &str) -> Result<MapperKind, String> {
    s.parse().map_err(|e: ontomap::Error| e.to_string())
}

#[cfg(feature = "cli")]
fn parse_term_type(s: &str) -> Result<TermKindFilter, String> {
    s.parse().map_err(|e: ontomap::Error| e.to_string())
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "cli")]
    {
        let args = Args::parse();
        init_tracing(args.verbose);

        let mut config = match &args.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(root) = args.cache_root {
            config.cache.root = root;
        }

        match args.command {
            Commands::Map {
                source,
                target,
                output,
                csv_input,
                mapper,
                top,
                min_score,
                base_iris,
                exclude_deprecated,
                term_type,
                include_unmapped,
                use_cache,
                save_graphs,
            } => {
                let m = &mut config.mapping;
                if let Some(mapper) = mapper {
                    m.mapper = mapper;
                }
                if let Some(top) = top {
                    m.max_mappings = top;
                }
                if let Some(min_score) = min_score {
                    m.min_score = min_score;
                }
                if let Some(iris) = base_iris {
                    m.base_iris = split_list(&iris);
                }
                if let Some(term_type) = term_type {
                    m.term_type = term_type;
                }
                m.exclude_deprecated |= exclude_deprecated;
                m.include_unmapped |= include_unmapped;
                config.validate()?;

                let sources = SourceInput::File {
                    path: source,
                    csv_columns: csv_input.as_deref().map(CsvColumns::parse).transpose()?,
                    separator: None,
                }
                .resolve()?;
                let output = output.unwrap_or_else(default_output_path);

                let table = if config.mapping.mapper.is_remote() {
                    if save_graphs {
                        tracing::warn!("--save-graphs has no effect with remote mappers");
                    }
                    let ontologies = split_list(&target);
                    map_terms(&sources, Target::Remote(&ontologies), &config)?
                } else {
                    let dictionary = load_target(&OboLoader::new(), &target, use_cache, &config)?;
                    let table = map_terms(&sources, Target::Terms(&dictionary), &config)?;
                    if save_graphs {
                        let path = write_graphs(&output, &term_graphs(&dictionary))?;
                        println!("Term graphs written to {}", path.display());
                    }
                    table
                };
                write_mappings(&output, &table, &RunMetadata::new(target, &config))?;
                println!("{}", table.summary());
                println!("Mappings written to {}", output.display());
            }
            Commands::Cache { ontology, acronym } => {
                let dictionary = cache_ontology(&OboLoader::new(), &ontology, &acronym, &config)?;
                println!("Cached {} terms of {} as {}", dictionary.len(), ontology, acronym);
            }
            Commands::CacheSet { registry } => {
                let cached = TermCache::new(&config.cache.root).store_set(&registry, &OboLoader::new())?;
                println!("Cached {} ontologies: {}", cached.len(), cached.join(", "));
            }
            Commands::CacheStatus { acronym } => {
                let cache = TermCache::new(&config.cache.root);
                let status = if cache.exists(&acronym) { "exists" } else { "missing" };
                println!("{acronym}: {status}");
            }
            Commands::ClearCache { acronym } => {
                TermCache::new(&config.cache.root).clear(acronym.as_deref());
            }
            Commands::Preprocess { input, templates } => {
                let path = ontomap::preprocess::preprocess_file(&input, &templates)?;
                println!("Preprocessed terms written to {}", path.display());
            }
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(str::to_string)
        .collect()
}
