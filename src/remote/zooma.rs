//! EBI Zooma annotation service.
//!
//! Zooma grades each annotation HIGH / GOOD / MEDIUM / LOW; the grades are mapped onto
//! fixed scores so they can share a threshold with the other mappers.

use serde_json::Value;

use super::{get_json, ontology_scope, Annotation, HttpClient, RemoteAnnotator, RetryPolicy};
use crate::curie::label_from_iri;
use crate::Result;

pub const DEFAULT_ZOOMA_URL: &str = "https://www.ebi.ac.uk/spot/zooma/v2/api";

/// Numeric score of a Zooma confidence grade; unknown grades score 0.
pub fn confidence_score(confidence: &str) -> f64 {
    match confidence {
        "HIGH" => 1.0,
        "GOOD" => 0.75,
        "MEDIUM" => 0.5,
        "LOW" => 0.25,
        _ => 0.0,
    }
}

/// Client of the Zooma `services/annotate` endpoint.
pub struct ZoomaAnnotator<C> {
    client: C,
    base_url: String,
    retry: RetryPolicy,
}

impl<C: HttpClient> ZoomaAnnotator<C> {
    pub fn new(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn annotation(item: &Value) -> Option<Annotation> {
    let iri = item["semanticTags"][0].as_str()?;
    let label = item["annotatedProperty"]["propertyValue"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| label_from_iri(iri));
    Some(Annotation {
        iri: iri.to_string(),
        label,
        score: confidence_score(item["confidence"].as_str().unwrap_or_default()),
    })
}

impl<C: HttpClient> RemoteAnnotator for ZoomaAnnotator<C> {
    fn name(&self) -> &'static str {
        "zooma"
    }

    fn annotate(
        &self,
        text: &str,
        ontologies: &[String],
        max_mappings: usize,
    ) -> Result<Vec<Annotation>> {
        let filter = format!(
            "required:[none],ontologies:[{}]",
            ontology_scope(ontologies)
        );
        let url = format!("{}/services/annotate", self.base_url);
        let query = [("propertyValue", text), ("filter", filter.as_str())];
        let response = get_json(&self.client, &self.retry, &url, &query, &[])?;
        Ok(response
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(annotation)
            .take(max_mappings)
            .collect())
    }
}
