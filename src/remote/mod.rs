//! Remote annotation services.
//!
//! Each source term costs one blocking request (plus follow-ups for some services).
//! Rate limiting (HTTP 429) is the only failure that is retried: after a fixed delay, at
//! most [`RetryPolicy::max_retries`] times. Any other failure is logged and the term
//! simply gets no candidates; one bad request never aborts a batch.

use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::mapper::TermMapper;
use crate::mapping::{Candidate, SourceTerm};
use crate::{Error, Result};

pub mod bioportal;
pub mod zooma;

pub use bioportal::BioPortalAnnotator;
pub use zooma::ZoomaAnnotator;

/// Status code and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

/// Minimal blocking HTTP GET.
pub trait HttpClient {
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse>;
}

/// [`HttpClient`] backed by `reqwest::blocking`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// A client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ontomap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Remote(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        let mut request = self.client.get(url).query(query);
        if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("accept")) {
            request = request.header("Accept", "application/json");
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().map_err(|e| Error::Remote(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| Error::Remote(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// Retry schedule for rate-limited requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed wait before each retry.
    pub delay: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(15),
            max_retries: 5,
        }
    }
}

const TOO_MANY_REQUESTS: u16 = 429;

/// GET `url` and decode a JSON body, retrying on 429 per `policy`.
pub(crate) fn get_json(
    client: &dyn HttpClient,
    policy: &RetryPolicy,
    url: &str,
    query: &[(&str, &str)],
    headers: &[(&str, &str)],
) -> Result<Value> {
    let mut retries = 0u32;
    loop {
        let response = client.get(url, query, headers)?;
        match response.status {
            200..=299 => {
                return serde_json::from_str(&response.body)
                    .map_err(|e| Error::Remote(format!("invalid JSON from {url}: {e}")));
            }
            TOO_MANY_REQUESTS if retries < policy.max_retries => {
                retries += 1;
                info!(
                    "Too many requests to {}. Waiting {:?} (retry {}/{})",
                    url, policy.delay, retries, policy.max_retries
                );
                thread::sleep(policy.delay);
            }
            TOO_MANY_REQUESTS => {
                return Err(Error::Remote(format!(
                    "{url} still rate limited after {} retries",
                    policy.max_retries
                )));
            }
            status => {
                return Err(Error::Remote(format!(
                    "{url} returned {status}: {}",
                    error_message(&response.body)
                )));
            }
        }
    }
}

/// First entry of an `errors` array in a JSON error body, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["errors"][0].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Value of `ontologies` as sent to a service: comma-joined, empty for "all".
pub fn ontology_scope(ontologies: &[String]) -> String {
    if ontologies
        .iter()
        .any(|o| o.trim().eq_ignore_ascii_case("all"))
    {
        return String::new();
    }
    ontologies
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// One annotation returned by a service.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// IRI of the annotated class.
    pub iri: String,
    /// Its preferred label.
    pub label: String,
    /// Service-specific score mapped into `[0, 1]`.
    pub score: f64,
}

/// A service that annotates free text with ontology terms.
pub trait RemoteAnnotator {
    fn name(&self) -> &'static str;

    /// Annotations for one text, at most `max_mappings`.
    fn annotate(
        &self,
        text: &str,
        ontologies: &[String],
        max_mappings: usize,
    ) -> Result<Vec<Annotation>>;

    /// Annotate every source term. Failing terms are logged and contribute nothing.
    fn map_all(
        &self,
        sources: &[SourceTerm],
        ontologies: &[String],
        max_mappings: usize,
    ) -> Vec<Candidate> {
        info!(
            "Mapping {} source terms against ontologies: {}",
            sources.len(),
            ontologies.join(",")
        );
        let start = Instant::now();
        let mut out = Vec::new();
        for (idx, source) in sources.iter().enumerate() {
            match self.annotate(&source.text, ontologies, max_mappings) {
                Ok(found) => {
                    debug!("...found {} mappings for {}", found.len(), source.text);
                    out.extend(found.into_iter().take(max_mappings).map(|a| Candidate {
                        source: idx,
                        iri: a.iri,
                        label: a.label,
                        score: a.score,
                    }));
                }
                Err(e) => error!("{} failed for `{}`: {}", self.name(), source.text, e),
            }
        }
        info!(
            "...done (mapping time: {:.2}s)",
            start.elapsed().as_secs_f64()
        );
        out
    }
}

/// Adapts a [`RemoteAnnotator`] with a fixed ontology scope to [`TermMapper`].
pub struct RemoteMapper<A> {
    annotator: A,
    ontologies: Vec<String>,
}

impl<A: RemoteAnnotator> RemoteMapper<A> {
    /// Restrict `annotator` to `ontologies`; `["all"]` or an empty list searches everything.
    pub fn new(annotator: A, ontologies: Vec<String>) -> Self {
        if ontology_scope(&ontologies).is_empty() {
            warn!("No ontology scope given; {} will search all ontologies", annotator.name());
        }
        Self {
            annotator,
            ontologies,
        }
    }
}

impl<A: RemoteAnnotator> TermMapper for RemoteMapper<A> {
    fn name(&self) -> &'static str {
        self.annotator.name()
    }

    fn map(
        &self,
        sources: &[SourceTerm],
        max_mappings: usize,
        _min_score: f64,
    ) -> Result<Vec<Candidate>> {
        Ok(self.annotator.map_all(sources, &self.ontologies, max_mappings))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;

    /// Replays canned responses and records requested URLs with their query.
    #[derive(Default)]
    pub(crate) struct ScriptedClient {
        responses: RefCell<VecDeque<HttpResponse>>,
        pub(crate) requests: RefCell<Vec<(String, Vec<(String, String)>, Vec<(String, String)>)>>,
    }

    impl ScriptedClient {
        pub(crate) fn push(&self, status: u16, body: &str) -> &Self {
            self.responses.borrow_mut().push_back(HttpResponse {
                status,
                body: body.to_string(),
            });
            self
        }
    }

    fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    impl HttpClient for ScriptedClient {
        fn get(
            &self,
            url: &str,
            query: &[(&str, &str)],
            headers: &[(&str, &str)],
        ) -> Result<HttpResponse> {
            self.requests
                .borrow_mut()
                .push((url.to_string(), owned(query), owned(headers)));
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| Error::Remote("connection refused".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedClient;
    use super::*;

    fn no_wait(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::ZERO,
            max_retries,
        }
    }

    #[test]
    fn retries_rate_limited_requests_then_succeeds() {
        let client = ScriptedClient::default();
        client.push(429, "").push(429, "").push(200, "[1]");
        let v = get_json(&client, &no_wait(5), "http://svc/x", &[], &[]).unwrap();
        assert_eq!(v, serde_json::json!([1]));
        assert_eq!(client.requests.borrow().len(), 3);
    }

    #[test]
    fn retry_budget_is_bounded() {
        let client = ScriptedClient::default();
        for _ in 0..10 {
            client.push(429, "");
        }
        let err = get_json(&client, &no_wait(2), "http://svc/x", &[], &[]).unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
        assert_eq!(client.requests.borrow().len(), 3);
    }

    #[test]
    fn other_failures_are_not_retried() {
        let client = ScriptedClient::default();
        client.push(401, r#"{"errors":["bad api key"]}"#).push(200, "[]");
        let err = get_json(&client, &no_wait(5), "http://svc/x", &[], &[]).unwrap_err();
        assert!(err.to_string().contains("bad api key"));
        assert_eq!(client.requests.borrow().len(), 1);
    }

    #[test]
    fn all_scope_is_empty() {
        assert_eq!(ontology_scope(&["EFO".into(), " HP ".into()]), "EFO,HP");
        assert_eq!(ontology_scope(&["EFO".into(), "all".into()]), "");
        assert_eq!(ontology_scope(&[]), "");
    }
}
