//! Neighborhood graphs of ontology terms, exported as JSON next to cached dictionaries.
//!
//! A term's neighborhood is the term itself, all of its named ancestors (followed
//! transitively through the dictionary), its direct children and its direct instances.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::curie::label_from_iri;
use crate::term::{Term, TermDictionary};

/// Kind of a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeLabel {
    #[serde(rename = "IS_A")]
    IsA,
    #[serde(rename = "INSTANCE_OF")]
    InstanceOf,
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IsA => "IS_A",
            Self::InstanceOf => "INSTANCE_OF",
        })
    }
}

/// A term in a neighborhood graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Node {
    /// Term IRI.
    pub id: String,
    /// Term label.
    pub label: String,
}

/// A directed link from a child or instance to its parent or class.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// IRI of the child or instance.
    pub from: String,
    /// IRI of the parent or class.
    pub to: String,
    pub label: EdgeLabel,
}

/// The neighborhood of one term. Nodes and edges are sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermGraph {
    /// IRI of the term the graph is centred on.
    pub iri: String,
    /// Every term in the neighborhood, the centre included.
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl TermGraph {
    /// Node with IRI `id`, if present.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[derive(Default)]
struct Builder {
    nodes: BTreeMap<String, String>,
    edges: BTreeSet<Edge>,
}

impl Builder {
    fn node(&mut self, iri: &str, label: &str) {
        if iri.is_empty() {
            debug!("Skipping graph node without IRI");
            return;
        }
        let label = if label.is_empty() {
            label_from_iri(iri)
        } else {
            label.to_string()
        };
        self.nodes.entry(iri.to_string()).or_insert(label);
    }

    fn edge(&mut self, from: &str, to: &str, label: EdgeLabel) {
        self.edges.insert(Edge {
            from: from.to_string(),
            to: to.to_string(),
            label,
        });
    }

    fn finish(self, iri: &str) -> TermGraph {
        TermGraph {
            iri: iri.to_string(),
            nodes: self
                .nodes
                .into_iter()
                .map(|(id, label)| Node { id, label })
                .collect(),
            edges: self.edges.into_iter().collect(),
        }
    }
}

/// Build the neighborhood graph of `term`, resolving ancestors through `dictionary`.
pub fn term_graph(term: &Term, dictionary: &TermDictionary) -> TermGraph {
    let mut b = Builder::default();
    b.node(term.iri(), term.label());

    let mut visited = BTreeSet::new();
    let mut stack: Vec<(String, String, String)> = term
        .parents()
        .iter()
        .map(|(p, l)| (term.iri().to_string(), p.clone(), l.clone()))
        .collect();
    while let Some((child, parent, label)) = stack.pop() {
        b.node(&parent, &label);
        b.edge(&child, &parent, EdgeLabel::IsA);
        if !visited.insert(parent.clone()) {
            continue;
        }
        match dictionary.get(&parent) {
            Some(p) => stack.extend(
                p.parents()
                    .iter()
                    .map(|(gp, l)| (parent.clone(), gp.clone(), l.clone())),
            ),
            None => debug!(
                "Ancestor {} is not in the term dictionary (possibly filtered by base IRIs)",
                parent
            ),
        }
    }

    for (child, label) in term.children() {
        b.node(child, label);
        b.edge(child, term.iri(), EdgeLabel::IsA);
    }
    for (instance, label) in term.instances() {
        b.node(instance, label);
        b.edge(instance, term.iri(), EdgeLabel::InstanceOf);
    }
    b.finish(term.iri())
}

/// Graphs of every term of the dictionary, in IRI order.
pub fn term_graphs(dictionary: &TermDictionary) -> Vec<TermGraph> {
    dictionary
        .iter()
        .map(|t| term_graph(t, dictionary))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> TermDictionary {
        [
            Term::builder("http://x.org/disease").label("disease").build(),
            Term::builder("http://x.org/lung_disease")
                .label("lung disease")
                .parent("http://x.org/disease", "disease")
                .build(),
            Term::builder("http://x.org/asthma")
                .label("asthma")
                .parent("http://x.org/lung_disease", "lung disease")
                .child("http://x.org/allergic_asthma", "allergic asthma")
                .instance("http://x.org/case_1", "")
                .build(),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn includes_transitive_ancestors_children_and_instances() {
        let dict = dictionary();
        let g = term_graph(dict.get("http://x.org/asthma").unwrap(), &dict);
        assert_eq!(g.nodes.len(), 5);
        assert_eq!(g.node("http://x.org/case_1").unwrap().label, "case_1");
        assert!(g.edges.contains(&Edge {
            from: "http://x.org/lung_disease".into(),
            to: "http://x.org/disease".into(),
            label: EdgeLabel::IsA,
        }));
        assert!(g.edges.contains(&Edge {
            from: "http://x.org/case_1".into(),
            to: "http://x.org/asthma".into(),
            label: EdgeLabel::InstanceOf,
        }));
        assert_eq!(g.edges.len(), 4);
    }

    #[test]
    fn json_uses_edge_label_names() {
        let dict = dictionary();
        let g = term_graph(dict.get("http://x.org/lung_disease").unwrap(), &dict);
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["iri"], "http://x.org/lung_disease");
        assert_eq!(json["edges"][0]["label"], "IS_A");
        assert_eq!(json["nodes"][0]["id"], "http://x.org/disease");
    }

    #[test]
    fn cyclic_parents_terminate() {
        let dict: TermDictionary = [
            Term::builder("http://x.org/a").parent("http://x.org/b", "b").build(),
            Term::builder("http://x.org/b").parent("http://x.org/a", "a").build(),
        ]
        .into_iter()
        .collect();
        let g = term_graph(dict.get("http://x.org/a").unwrap(), &dict);
        assert_eq!(g.nodes.len(), 2);
        assert_eq!(g.edges.len(), 2);
    }
}
