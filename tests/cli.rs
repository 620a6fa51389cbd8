//! CLI contract tests for `ontomap`.
#![cfg(feature = "cli")]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const ONTOLOGY: &str = r#"format-version: 1.4

[Term]
id: DIS:0000001
name: disease

[Term]
id: DIS:0000002
name: asthma
is_a: DIS:0000001 ! disease

[Term]
id: DIS:0000004
name: myocardial infarction
synonym: "heart attack" EXACT []
is_a: DIS:0000001 ! disease
"#;

fn ontomap() -> assert_cmd::Command {
    cargo_bin_cmd!("ontomap")
}

fn fixture(root: &Path) -> (String, String) {
    let onto = root.join("dis.obo");
    fs::write(&onto, ONTOLOGY).unwrap();
    let terms = root.join("terms.txt");
    fs::write(&terms, "asthma\n\nheart attack\nzzzzqqqq\n").unwrap();
    (
        onto.to_str().unwrap().to_string(),
        terms.to_str().unwrap().to_string(),
    )
}

#[test]
fn map_writes_header_and_rows() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (onto, terms) = fixture(tmp.path());
    let out = tmp.path().join("out/mappings.csv");

    ontomap()
        .args(["map", "-s", &terms, "-t", &onto, "-o", out.to_str().unwrap()])
        .args(["--include-unmapped", "--top", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 of 3 terms mapped to 2 unique targets"));

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("# Date and time run: "));
    assert!(text.contains("# Mapper: tfidf"));
    assert!(text.contains("# Max mappings: 1"));
    assert!(text.contains(",asthma,asthma,DIS:0000002,http://purl.obolibrary.org/obo/DIS_0000002,1.000"));
    assert!(text.contains(",Mapping Score,Tags"));
    assert!(text.contains(",zzzzqqqq,,,,0.000,unmapped"));
}

#[test]
fn unknown_mapper_fails_before_any_work() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (onto, terms) = fixture(tmp.path());

    ontomap()
        .args(["map", "-s", &terms, "-t", &onto, "-m", "word2vec"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported mapper"));
}

#[test]
fn cache_lifecycle() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (onto, terms) = fixture(tmp.path());
    let cache_root = tmp.path().join("cache");
    let cache_root = cache_root.to_str().unwrap();

    ontomap()
        .args(["--cache-root", cache_root, "cache", &onto, "DIS"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cached 3 terms"));

    ontomap()
        .args(["--cache-root", cache_root, "cache-status", "DIS"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DIS: exists"));

    let out = tmp.path().join("cached.csv");
    ontomap()
        .args(["--cache-root", cache_root, "map", "-s", &terms, "-t", "DIS"])
        .args(["--use-cache", "--save-graphs", "-m", "jaro-winkler"])
        .args(["-o", out.to_str().unwrap()])
        .assert()
        .success();
    assert!(fs::read_to_string(&out).unwrap().contains("DIS:0000002"));
    assert!(tmp.path().join("cached.csv-term-graphs.json").is_file());

    ontomap()
        .args(["--cache-root", cache_root, "clear-cache", "DIS"])
        .assert()
        .success();

    ontomap()
        .args(["--cache-root", cache_root, "cache-status", "DIS"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DIS: missing"));
}

#[test]
fn csv_input_keeps_supplied_ids() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (onto, _) = fixture(tmp.path());
    let table = tmp.path().join("fields.csv");
    fs::write(&table, "label,code\nasthma,F-1\nheart attack,F-2\n").unwrap();
    let out = tmp.path().join("fields-mapped.csv");

    ontomap()
        .args(["map", "-s", table.to_str().unwrap(), "-t", &onto])
        .args(["--csv-input", "label,code", "-o", out.to_str().unwrap()])
        .assert()
        .success();

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.contains("F-1,asthma,asthma,DIS:0000002"));
    assert!(text.contains("F-2,heart attack,myocardial infarction,DIS:0000004"));
    assert!(!text.contains(",Tags"));
}

#[test]
fn preprocess_rewrites_with_templates() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let terms = tmp.path().join("fields.txt");
    fs::write(&terms, "Asthma (self-reported)\nheart attack\n").unwrap();
    let templates = tmp.path().join("templates.txt");
    fs::write(&templates, r"(.*) \(self-reported\)").unwrap();

    ontomap()
        .args(["preprocess", terms.to_str().unwrap(), templates.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("fields-preprocessed.txt"));

    let out = fs::read_to_string(tmp.path().join("fields-preprocessed.txt")).unwrap();
    assert_eq!(out, "Asthma\nheart attack");
}
