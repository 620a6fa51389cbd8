//! IRI helpers: compact identifiers (CURIEs) and fallback labels.

const OBO_BASE_IRI: &str = "http://purl.obolibrary.org/obo/";
const BIOPORTAL_BASE_IRI: &str = "http://purl.bioontology.org/ontology/";
const ORPHANET_IRI: &str = "http://www.orpha.net/ORDO/";

/// Known namespace IRIs whose local names are `PREFIX_LOCAL`.
const NAMESPACES: &[(&str, &str)] = &[
    ("http://www.ebi.ac.uk/efo/", "EFO"),
    (ORPHANET_IRI, "ORPHA"),
    (OBO_BASE_IRI, ""),
    ("http://snomed.info/id/", "SNOMED"),
    ("http://purl.bioontology.org/ontology/OMIM/", "OMIM"),
];

/// Base IRI prepended to an OBO-style CURIE such as `GO:0008150`.
pub fn obo_iri(curie: &str) -> String {
    format!("{OBO_BASE_IRI}{}", curie.trim().replacen(':', "_", 1))
}

/// Compact an IRI into an upper-cased `PREFIX:LOCAL` CURIE.
///
/// Returns an empty string when no prefix can be derived, mirroring how mapping tables
/// leave the column blank rather than inventing one.
pub fn curie_from_iri(iri: &str) -> String {
    for (base, prefix) in NAMESPACES {
        let Some(local) = iri.strip_prefix(base) else {
            continue;
        };
        if prefix.is_empty() || local.contains('_') {
            if let Some(curie) = split_local(local) {
                return curie;
            }
        }
        if base.starts_with(BIOPORTAL_BASE_IRI) || *prefix == "SNOMED" {
            return format!("{prefix}:{local}");
        }
    }
    fragment(iri).and_then(split_local).unwrap_or_default()
}

fn split_local(local: &str) -> Option<String> {
    let (prefix, id) = local.split_once('_')?;
    if prefix.is_empty() || id.is_empty() {
        return None;
    }
    let prefix = if prefix.eq_ignore_ascii_case("Orphanet") {
        "ORPHA"
    } else {
        prefix
    };
    Some(format!("{}:{}", prefix.to_uppercase(), id.to_uppercase()))
}

fn fragment(iri: &str) -> Option<&str> {
    match iri.rsplit_once('#') {
        Some((_, frag)) => Some(frag),
        None => iri.rsplit_once('/').map(|(_, last)| last),
    }
}

/// Label of last resort: the IRI fragment after `#`, else the last path segment.
pub fn label_from_iri(iri: &str) -> String {
    fragment(iri)
        .filter(|f| !f.is_empty())
        .unwrap_or(iri)
        .to_string()
}
