//! Run configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid configuration.
//! Command-line flags override file values.
//!
//! ```toml
//! [mapping]
//! max_mappings = 3
//! min_score = 0.3
//! mapper = "tfidf"
//! base_iris = ["http://www.ebi.ac.uk/efo/"]
//! term_type = "class"
//!
//! [tfidf]
//! tf = "log-scaled"
//!
//! [remote]
//! rate_limit_delay_secs = 15
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_ROOT;
use crate::mapper::MapperKind;
use crate::mapping::RankPolicy;
use crate::remote::bioportal::DEFAULT_BIOPORTAL_URL;
use crate::remote::zooma::DEFAULT_ZOOMA_URL;
use crate::term::{TermFilter, TermKindFilter};
use crate::tfidf::{IdfVariant, TfIdfParams, TfVariant};
use crate::{Error, Result};

/// Environment variable consulted when no BioPortal API key is configured.
pub const BIOPORTAL_KEY_ENV: &str = "BIOPORTAL_API_KEY";

/// Every setting of a run, by TOML section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mapping: MappingConfig,
    pub tfidf: TfIdfConfig,
    pub cache: CacheConfig,
    pub remote: RemoteConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Config = content.parse()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check value ranges; run again after applying command-line overrides.
    pub fn validate(&self) -> Result<()> {
        let m = &self.mapping;
        if !(0.0..=1.0).contains(&m.min_score) {
            return Err(Error::Configuration(format!(
                "mapping.min_score must be within [0, 1], got {}",
                m.min_score
            )));
        }
        if m.max_mappings == 0 {
            return Err(Error::Configuration("mapping.max_mappings must be > 0".into()));
        }
        if self.tfidf.ngram == 0 || self.tfidf.ntop == 0 {
            return Err(Error::Configuration(
                "tfidf.ngram and tfidf.ntop must be > 0".into(),
            ));
        }
        if self.tfidf.ntop < m.max_mappings {
            tracing::warn!(
                "tfidf.ntop ({}) is below mapping.max_mappings ({}); fewer mappings may be returned",
                self.tfidf.ntop,
                m.max_mappings
            );
        }
        Ok(())
    }

    /// Term filter described by the `[mapping]` section.
    pub fn term_filter(&self) -> TermFilter {
        TermFilter {
            base_iris: self.mapping.base_iris.clone(),
            exclude_deprecated: self.mapping.exclude_deprecated,
            kind: self.mapping.term_type,
        }
    }

    /// Ranking policy for the configured mapper.
    pub fn rank_policy(&self) -> RankPolicy {
        RankPolicy {
            max_mappings: self.mapping.max_mappings,
            min_score: self.mapping.min_score,
            include_unmapped: self.mapping.include_unmapped,
            score_filter: self.mapping.mapper.filters_scores(),
        }
    }

    /// Lexical index parameters of the `[tfidf]` section.
    pub fn tfidf_params(&self) -> TfIdfParams {
        TfIdfParams {
            tf_variant: self.tfidf.tf,
            idf_variant: self.tfidf.idf,
            ngram: self.tfidf.ngram,
            ntop: self.tfidf.ntop,
        }
    }
}

impl FromStr for Config {
    type Err = Error;

    /// Parse and validate TOML.
    fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Maximum number of target terms per source term.
    pub max_mappings: usize,
    /// Minimum score a mapping must reach.
    pub min_score: f64,
    pub mapper: MapperKind,
    /// Only map to terms whose IRI starts with one of these.
    pub base_iris: Vec<String>,
    pub exclude_deprecated: bool,
    pub term_type: TermKindFilter,
    /// Emit a row for source terms without any mapping.
    pub include_unmapped: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            max_mappings: 3,
            min_score: 0.3,
            mapper: MapperKind::TfIdf,
            base_iris: Vec::new(),
            exclude_deprecated: false,
            term_type: TermKindFilter::Class,
            include_unmapped: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TfIdfConfig {
    /// `linear` or `log-scaled` term frequency.
    pub tf: TfVariant,
    /// `smoothed` or `standard` inverse document frequency.
    pub idf: IdfVariant,
    /// Character n-gram length.
    pub ngram: usize,
    /// Label rows kept per source before dedup.
    pub ntop: usize,
}

impl Default for TfIdfConfig {
    fn default() -> Self {
        let p = TfIdfParams::default();
        Self {
            tf: p.tf_variant,
            idf: p.idf_variant,
            ngram: p.ngram,
            ntop: p.ntop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub root: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_CACHE_ROOT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub bioportal_url: String,
    /// Falls back to the `BIOPORTAL_API_KEY` environment variable.
    pub bioportal_api_key: Option<String>,
    pub zooma_url: String,
    /// Wait before retrying a rate-limited request.
    pub rate_limit_delay_secs: u64,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            bioportal_url: DEFAULT_BIOPORTAL_URL.to_string(),
            bioportal_api_key: None,
            zooma_url: DEFAULT_ZOOMA_URL.to_string(),
            rate_limit_delay_secs: 15,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl RemoteConfig {
    /// Configured BioPortal key, else the environment's.
    pub fn api_key(&self) -> Option<String> {
        self.bioportal_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(BIOPORTAL_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}
