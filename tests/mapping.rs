//! End-to-end mapping behaviour over the public API.

use std::fs;
use std::path::Path;

use ontomap::cache::TermCache;
use ontomap::config::Config;
use ontomap::loader::OboLoader;
use ontomap::mapping::{rank, Candidate, RankPolicy, UNMAPPED_TAG};
use ontomap::normalize::normalize;
use ontomap::pipeline::{cache_ontology, load_target, map_terms, Target};
use ontomap::similarity::Metric;
use ontomap::{Error, MapperKind, SourceTerm, Term, TermDictionary, TermFilter, TermKind, TermKindFilter};

const ONTOLOGY: &str = r#"format-version: 1.4
ontology: dis

[Term]
id: DIS:0000001
name: disease

[Term]
id: DIS:0000002
name: asthma
is_a: DIS:0000001 ! disease

[Term]
id: DIS:0000003
name: childhood asthma
synonym: "pediatric asthma" EXACT []
is_a: DIS:0000002 ! asthma

[Term]
id: DIS:0000004
name: myocardial infarction
synonym: "heart attack" EXACT []
is_a: DIS:0000001 ! disease

[Term]
id: DIS:0000005
name: asthmatic bronchitis
is_obsolete: true
is_a: DIS:0000001 ! disease
"#;

fn write_ontology(dir: &Path) -> String {
    let path = dir.join("dis.obo");
    fs::write(&path, ONTOLOGY).unwrap();
    path.to_str().unwrap().to_string()
}

fn dictionary() -> TermDictionary {
    [
        Term::builder("http://purl.obolibrary.org/obo/DIS_0000002").label("asthma").build(),
        Term::builder("http://purl.obolibrary.org/obo/DIS_0000003")
            .label("childhood asthma")
            .synonym("pediatric asthma")
            .build(),
        Term::builder("http://purl.obolibrary.org/obo/DIS_0000004")
            .label("myocardial infarction")
            .synonym("heart attack")
            .build(),
        Term::builder("http://purl.obolibrary.org/obo/DIS_0000006").label("asthma attack").build(),
        Term::builder("http://purl.obolibrary.org/obo/DIS_0000007").label("severe asthma").build(),
    ]
    .into_iter()
    .collect()
}

fn sources(texts: &[&str]) -> Vec<SourceTerm> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| SourceTerm::new(*t, format!("S{i}")))
        .collect()
}

fn local_mappers() -> Vec<MapperKind> {
    MapperKind::all().into_iter().filter(|k| !k.is_remote()).collect()
}

#[test]
fn exact_label_scores_one() {
    let dict = dictionary();
    for kind in local_mappers() {
        let mut config = Config::default();
        config.mapping.mapper = kind;
        let table = map_terms(&sources(&["asthma"]), Target::Terms(&dict), &config).unwrap();
        let top = &table.records()[0];
        assert_eq!(top.mapped_term_label, "asthma", "{kind}");
        assert!((top.mapping_score - 1.0).abs() < 1e-9, "{kind}: {}", top.mapping_score);
        assert_eq!(top.mapped_term_curie, "DIS:0000002");
    }
}

#[test]
fn nonsense_yields_nothing_or_one_unmapped_row() {
    let dict = dictionary();
    let src = sources(&["xyzxyz-nonsense-123"]);
    let mut config = Config::default();
    config.mapping.min_score = 0.5;
    let table = map_terms(&src, Target::Terms(&dict), &config).unwrap();
    assert!(table.is_empty());

    config.mapping.include_unmapped = true;
    let table = map_terms(&src, Target::Terms(&dict), &config).unwrap();
    assert_eq!(table.len(), 1);
    let row = &table.records()[0];
    assert!(!row.is_mapped());
    assert_eq!(row.mapping_score, 0.0);
    assert_eq!(row.tags, vec![UNMAPPED_TAG.to_string()]);
}

#[test]
fn synonym_match_reports_the_term_once() {
    let dict = dictionary();
    let table = map_terms(
        &sources(&["myocardial infarction"]),
        Target::Terms(&dict),
        &Config::default(),
    )
    .unwrap();
    let hits: Vec<_> = table
        .records()
        .iter()
        .filter(|r| r.mapped_term_iri.ends_with("DIS_0000004"))
        .collect();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].mapping_score > 0.99);
    assert_eq!(hits[0].mapped_term_label, "myocardial infarction");
}

#[test]
fn single_mapping_keeps_the_best_candidate() {
    let src = sources(&["asthma attack"]);
    let candidates = vec![
        Candidate {
            source: 0,
            iri: "http://x.org/B".into(),
            label: "b".into(),
            score: 0.85,
        },
        Candidate {
            source: 0,
            iri: "http://x.org/A".into(),
            label: "a".into(),
            score: 0.9,
        },
    ];
    let policy = RankPolicy {
        max_mappings: 1,
        ..RankPolicy::default()
    };
    let records = rank(&src, candidates, &policy);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].mapped_term_iri, "http://x.org/A");
    assert_eq!(records[0].mapping_score, 0.9);
}

#[test]
fn cleared_entry_no_longer_exists() {
    let dir = tempfile::tempdir().unwrap();
    let cache = TermCache::new(dir.path().join("cache"));
    cache.store(&dictionary(), "DIS").unwrap();
    assert!(cache.exists("DIS"));
    cache.clear(Some("DIS"));
    assert!(!cache.exists("DIS"));
}

#[test]
fn scores_fan_out_and_dedup_hold_for_every_local_mapper() {
    let dict = dictionary();
    let src = sources(&["asthma", "childhood asthma", "pediatric asthma attack", "heart"]);
    for kind in local_mappers() {
        let mut config = Config::default();
        config.mapping.mapper = kind;
        config.mapping.max_mappings = 2;
        config.mapping.min_score = 0.2;
        let table = map_terms(&src, Target::Terms(&dict), &config).unwrap();
        for s in &src {
            let rows: Vec<_> = table
                .records()
                .iter()
                .filter(|r| r.source_term_id == s.id && r.is_mapped())
                .collect();
            assert!(rows.len() <= 2, "{kind}: {} rows for {}", rows.len(), s.text);
            let mut iris: Vec<&str> = rows.iter().map(|r| r.mapped_term_iri.as_str()).collect();
            iris.sort_unstable();
            iris.dedup();
            assert_eq!(iris.len(), rows.len(), "{kind}: duplicate target for {}", s.text);
            for r in rows {
                assert!((0.0..=1.0).contains(&r.mapping_score), "{kind}");
                assert!(r.mapping_score >= 0.2, "{kind}");
            }
        }
    }
}

#[test]
fn cached_and_fresh_loads_map_identically() {
    let dir = tempfile::tempdir().unwrap();
    let location = write_ontology(dir.path());
    let mut config = Config::default();
    config.cache.root = dir.path().join("cache");
    config.mapping.exclude_deprecated = true;
    config.mapping.base_iris = vec!["http://purl.obolibrary.org/obo/DIS_".into()];

    cache_ontology(&OboLoader::new(), &location, "DIS", &config).unwrap();
    let fresh = load_target(&OboLoader::new(), &location, false, &config).unwrap();
    let cached = load_target(&OboLoader::new(), "DIS", true, &config).unwrap();
    assert_eq!(fresh, cached);
    assert_eq!(fresh.len(), 4);

    let src = sources(&["asthma", "paediatric asthma", "heart attack", "bronchitis"]);
    let a = map_terms(&src, Target::Terms(&fresh), &config).unwrap();
    let b = map_terms(&src, Target::Terms(&cached), &config).unwrap();
    assert_eq!(a, b);
    assert!(!a.is_empty());
}

#[test]
fn normalization_is_idempotent() {
    for s in [
        "Asthma (childhood), unspecified",
        "  Heart-attack; FH  ",
        "Type 2 diabetes mellitus",
        "",
        "the other",
    ] {
        let once = normalize(s);
        assert_eq!(normalize(&once), once, "{s:?}");
    }
}

#[test]
fn filter_conditions_combine_with_and() {
    let dict: TermDictionary = [
        Term::builder("http://a.org/1").label("kept").build(),
        Term::builder("http://a.org/2").label("old").deprecated(true).build(),
        Term::builder("http://a.org/3").label("prop").kind(TermKind::Property).build(),
        Term::builder("http://b.org/4").label("elsewhere").build(),
    ]
    .into_iter()
    .collect();
    let filter = TermFilter {
        base_iris: vec!["http://a.org/".into()],
        exclude_deprecated: true,
        kind: TermKindFilter::Class,
    };
    let kept = dict.filter(&filter);
    assert_eq!(kept.len(), 1);
    assert!(kept.contains("http://a.org/1"));

    let any_kind = TermFilter {
        kind: TermKindFilter::Any,
        ..filter.clone()
    };
    assert_eq!(dict.filter(&any_kind).len(), 2);
    let no_prefix = TermFilter {
        base_iris: Vec::new(),
        ..filter
    };
    assert_eq!(dict.filter(&no_prefix).len(), 2);
}

#[test]
fn unknown_mapper_key_is_rejected() {
    assert!(matches!(
        "word2vec".parse::<MapperKind>(),
        Err(Error::Configuration(_))
    ));
    assert_eq!(
        "jarowinkler".parse::<MapperKind>().unwrap(),
        MapperKind::Syntactic(Metric::JaroWinkler)
    );
}

#[test]
fn filtering_everything_out_is_an_empty_ontology() {
    let dir = tempfile::tempdir().unwrap();
    let location = write_ontology(dir.path());
    let mut config = Config::default();
    config.mapping.base_iris = vec!["http://nowhere.org/".into()];
    assert!(matches!(
        load_target(&OboLoader::new(), &location, false, &config),
        Err(Error::EmptyOntology { .. })
    ));
}
