//! NCBO BioPortal Annotator.
//!
//! The annotator reports *which* terms occur in the text but no similarity, so every
//! annotation carries score `1.0` and a minimum-score threshold never removes one.

use serde_json::Value;
use tracing::warn;

use super::{get_json, ontology_scope, Annotation, HttpClient, RemoteAnnotator, RetryPolicy};
use crate::curie::label_from_iri;
use crate::Result;

/// Public BioPortal REST endpoint.
pub const DEFAULT_BIOPORTAL_URL: &str = "https://data.bioontology.org";

/// Score attached to every BioPortal annotation.
pub const BIOPORTAL_SCORE: f64 = 1.0;

/// Client of the BioPortal `/annotator` endpoint.
pub struct BioPortalAnnotator<C> {
    client: C,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl<C: HttpClient> BioPortalAnnotator<C> {
    pub fn new(client: C, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn auth(&self) -> String {
        format!("apikey token={}", self.api_key)
    }

    /// Preferred label of an annotated class, fetched from its `links.self` resource when
    /// the annotation did not embed it.
    fn class_label(&self, class: &Value, iri: &str) -> String {
        if let Some(label) = class["prefLabel"].as_str() {
            return unquote(label);
        }
        let Some(link) = class["links"]["self"].as_str() else {
            return label_from_iri(iri);
        };
        let auth = self.auth();
        let headers = [("Authorization", auth.as_str())];
        match get_json(&self.client, &self.retry, link, &[], &headers) {
            Ok(details) => details["prefLabel"]
                .as_str()
                .map(unquote)
                .unwrap_or_else(|| label_from_iri(iri)),
            Err(e) => {
                warn!("Could not fetch details of {}: {}", iri, e);
                label_from_iri(iri)
            }
        }
    }
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').to_string()
}

impl<C: HttpClient> RemoteAnnotator for BioPortalAnnotator<C> {
    fn name(&self) -> &'static str {
        "bioportal"
    }

    fn annotate(
        &self,
        text: &str,
        ontologies: &[String],
        max_mappings: usize,
    ) -> Result<Vec<Annotation>> {
        let scope = ontology_scope(ontologies);
        let mut query = vec![
            ("text", text),
            ("longest_only", "true"),
            ("expand_mappings", "true"),
        ];
        if !scope.is_empty() {
            query.push(("ontologies", scope.as_str()));
        }
        let auth = self.auth();
        let url = format!("{}/annotator", self.base_url);
        let response = get_json(
            &self.client,
            &self.retry,
            &url,
            &query,
            &[("Authorization", auth.as_str())],
        )?;

        let mut out = Vec::new();
        for item in response.as_array().into_iter().flatten() {
            if out.len() == max_mappings {
                break;
            }
            let class = &item["annotatedClass"];
            let Some(iri) = class["@id"].as_str() else {
                continue;
            };
            out.push(Annotation {
                iri: iri.to_string(),
                label: self.class_label(class, iri),
                score: BIOPORTAL_SCORE,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mapping::SourceTerm;
    use crate::remote::testing::ScriptedClient;

    fn annotator(client: ScriptedClient) -> BioPortalAnnotator<ScriptedClient> {
        BioPortalAnnotator::new(client, "http://bp.test/", "KEY").with_retry(RetryPolicy {
            delay: Duration::ZERO,
            max_retries: 1,
        })
    }

    #[test]
    fn annotates_with_fixed_score_and_follows_class_links() {
        let client = ScriptedClient::default();
        client
            .push(
                200,
                r#"[
                  {"annotatedClass": {"@id": "http://www.ebi.ac.uk/efo/EFO_0000270",
                                      "links": {"self": "http://bp.test/class/1"}}},
                  {"annotatedClass": {"@id": "http://purl.obolibrary.org/obo/HP_0002099",
                                      "prefLabel": "Asthma"}},
                  {"annotatedClass": {"@id": "http://x.org/skipped"}}
                ]"#,
            )
            .push(200, r#"{"prefLabel": "\"asthma\""}"#);
        let bp = annotator(client);
        let found = bp.annotate("asthma", &["EFO".into(), "HP".into()], 2).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].label, "asthma");
        assert_eq!(found[1].label, "Asthma");
        assert!(found.iter().all(|a| a.score == BIOPORTAL_SCORE));

        let requests = bp.client.requests.borrow();
        let (url, query, headers) = &requests[0];
        assert_eq!(url, "http://bp.test/annotator");
        assert!(query.contains(&("ontologies".into(), "EFO,HP".into())));
        assert!(query.contains(&("longest_only".into(), "true".into())));
        assert_eq!(
            headers[0],
            (String::from("Authorization"), String::from("apikey token=KEY"))
        );
        assert_eq!(requests[1].0, "http://bp.test/class/1");
    }

    #[test]
    fn failing_terms_do_not_abort_the_batch() {
        let client = ScriptedClient::default();
        client
            .push(500, r#"{"errors":["boom"]}"#)
            .push(
                200,
                r#"[{"annotatedClass": {"@id": "http://x.org/T1", "prefLabel": "cough"}}]"#,
            );
        let bp = annotator(client);
        let sources = vec![SourceTerm::new("a", "s1"), SourceTerm::new("cough", "s2")];
        let out = bp.map_all(&sources, &["all".into()], 3);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, 1);
        let requests = bp.client.requests.borrow();
        assert!(requests[1].1.iter().all(|(k, _)| k != "ontologies"));
    }
}
