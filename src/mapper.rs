//! Mapper selection.
//!
//! [`MapperKind`] is the closed set of strategies. A name is parsed (and rejected) once,
//! up front; [`MapperKind::build`] then produces one [`TermMapper`] for the whole run.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::mapping::{Candidate, SourceTerm};
use crate::normalize::Normalizer;
use crate::remote::{BioPortalAnnotator, RemoteMapper, ReqwestClient, RetryPolicy, ZoomaAnnotator};
use crate::similarity::Metric;
use crate::syntactic::SyntacticMapper;
use crate::term::TermDictionary;
use crate::tfidf::{TfIdfMapper, TfIdfParams};
use crate::{Error, Result};

/// A strategy that produces raw candidates for a batch of source terms.
///
/// Implementations return at most `max_mappings` candidates per source. `min_score` is a
/// hint a mapper may use to prune early (the lexical index bounds its sparse product with
/// it, the exhaustive matcher ignores it); the ranker applies the threshold regardless.
pub trait TermMapper {
    fn name(&self) -> &'static str;

    fn map(
        &self,
        sources: &[SourceTerm],
        max_mappings: usize,
        min_score: f64,
    ) -> Result<Vec<Candidate>>;
}

/// Every supported mapping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MapperKind {
    #[default]
    TfIdf,
    Syntactic(Metric),
    BioPortal,
    Zooma,
}

impl MapperKind {
    /// Every mapper, in a stable order.
    pub fn all() -> Vec<MapperKind> {
        let mut all = vec![MapperKind::TfIdf];
        all.extend(Metric::ALL.iter().map(|m| MapperKind::Syntactic(*m)));
        all.extend([MapperKind::BioPortal, MapperKind::Zooma]);
        all
    }

    /// Canonical key.
    pub fn name(self) -> &'static str {
        match self {
            Self::TfIdf => "tfidf",
            Self::Syntactic(metric) => metric.name(),
            Self::BioPortal => "bioportal",
            Self::Zooma => "zooma",
        }
    }

    /// Whether candidates come from a web service rather than a local dictionary.
    pub fn is_remote(self) -> bool {
        matches!(self, Self::BioPortal | Self::Zooma)
    }

    /// Whether scores are meaningful enough to threshold. BioPortal scores every
    /// annotation 1.0.
    pub fn filters_scores(self) -> bool {
        self != Self::BioPortal
    }

    /// Instantiate the strategy.
    pub fn build(self, ctx: &MapperContext<'_>) -> Result<Box<dyn TermMapper>> {
        match self {
            Self::TfIdf => Ok(Box::new(TfIdfMapper::with_params(
                ctx.require_dictionary(self)?,
                ctx.tfidf,
                Normalizer::default(),
            ))),
            Self::Syntactic(metric) => Ok(Box::new(SyntacticMapper::new(
                ctx.require_dictionary(self)?,
                metric,
            ))),
            Self::BioPortal => {
                let key = ctx.remote.api_key().ok_or_else(|| {
                    Error::Configuration(
                        "bioportal mapper needs an API key (remote.bioportal_api_key or BIOPORTAL_API_KEY)"
                            .into(),
                    )
                })?;
                let annotator =
                    BioPortalAnnotator::new(ctx.http_client()?, &ctx.remote.bioportal_url, key)
                        .with_retry(ctx.retry());
                Ok(Box::new(RemoteMapper::new(annotator, ctx.ontologies.to_vec())))
            }
            Self::Zooma => {
                let annotator = ZoomaAnnotator::new(ctx.http_client()?, &ctx.remote.zooma_url)
                    .with_retry(ctx.retry());
                Ok(Box::new(RemoteMapper::new(annotator, ctx.ontologies.to_vec())))
            }
        }
    }
}

impl fmt::Display for MapperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MapperKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tfidf" | "tf-idf" | "lexical-index" => Ok(Self::TfIdf),
            "bioportal" | "remote-annotator-a" => Ok(Self::BioPortal),
            "zooma" | "remote-annotator-b" => Ok(Self::Zooma),
            other => other.parse::<Metric>().map(Self::Syntactic).map_err(|_| {
                Error::Configuration(format!(
                    "unsupported mapper `{other}` (expected one of: {})",
                    MapperKind::all()
                        .iter()
                        .map(|m| m.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            }),
        }
    }
}

impl serde::Serialize for MapperKind {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for MapperKind {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Everything a mapper may need at construction.
#[derive(Debug, Clone, Default)]
pub struct MapperContext<'a> {
    /// Target terms for local mappers.
    pub dictionary: Option<&'a TermDictionary>,
    /// Ontology acronyms for remote mappers (`"all"` for no restriction).
    pub ontologies: &'a [String],
    pub tfidf: TfIdfParams,
    pub remote: RemoteConfig,
}

impl MapperContext<'_> {
    fn require_dictionary(&self, kind: MapperKind) -> Result<&TermDictionary> {
        self.dictionary.ok_or_else(|| {
            Error::Configuration(format!("mapper `{kind}` needs a target ontology"))
        })
    }

    fn http_client(&self) -> Result<ReqwestClient> {
        ReqwestClient::new(Duration::from_secs(self.remote.timeout_secs))
    }

    fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_secs(self.remote.rate_limit_delay_secs),
            max_retries: self.remote.max_retries,
        }
    }
}
