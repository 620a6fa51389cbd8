//! CSV export of mapping tables and JSON export of term graphs.
//!
//! A mapping file starts with `# `-prefixed metadata lines describing the run, followed
//! by a regular CSV table with a header row.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::config::Config;
use crate::graph::TermGraph;
use crate::mapper::MapperKind;
use crate::mapping::MappingTable;
use crate::term::TermKindFilter;
use crate::{Error, Result};

const COLUMNS: [&str; 6] = [
    "Source Term ID",
    "Source Term",
    "Mapped Term Label",
    "Mapped Term CURIE",
    "Mapped Term IRI",
    "Mapping Score",
];
const TAGS_COLUMN: &str = "Tags";

/// Run parameters recorded in the file header.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    pub ontology: String,
    pub mapper: MapperKind,
    pub min_score: f64,
    pub max_mappings: usize,
    pub base_iris: Vec<String>,
    pub term_type: TermKindFilter,
    pub exclude_deprecated: bool,
    pub include_unmapped: bool,
}

impl RunMetadata {
    pub fn new(ontology: impl Into<String>, config: &Config) -> Self {
        let m = &config.mapping;
        Self {
            ontology: ontology.into(),
            mapper: m.mapper,
            min_score: m.min_score,
            max_mappings: m.max_mappings,
            base_iris: m.base_iris.clone(),
            term_type: m.term_type,
            exclude_deprecated: m.exclude_deprecated,
            include_unmapped: m.include_unmapped,
        }
    }

    /// Header lines (without the `# ` prefix) for `table`.
    pub fn header_lines(&self, table: &MappingTable) -> Vec<String> {
        let base_iris = if self.base_iris.is_empty() {
            "(none)".to_string()
        } else {
            self.base_iris.join(", ")
        };
        vec![
            format!("Date and time run: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
            format!("Target ontology: {}", self.ontology),
            format!("ontomap version: {}", env!("CARGO_PKG_VERSION")),
            format!("Minimum score: {}", self.min_score),
            format!("Mapper: {}", self.mapper),
            format!("Base IRIs: {base_iris}"),
            format!("Max mappings: {}", self.max_mappings),
            format!("Term type: {}", self.term_type),
            format!("Exclude deprecated: {}", self.exclude_deprecated),
            format!("Include unmapped: {}", self.include_unmapped),
            table.summary(),
        ]
    }
}

/// Default output path: `ontomap-mappings-<timestamp>.csv` in the working directory.
pub fn default_output_path() -> PathBuf {
    PathBuf::from(format!(
        "ontomap-mappings-{}.csv",
        Local::now().format("%d-%m-%YT%H-%M-%S")
    ))
}

/// Write the metadata header and the table.
pub fn write_table<W: Write>(
    mut out: W,
    table: &MappingTable,
    metadata: &RunMetadata,
) -> Result<()> {
    for line in metadata.header_lines(table) {
        writeln!(out, "# {line}")?;
    }
    let with_tags = table.has_tags();
    let mut writer = csv::Writer::from_writer(out);
    let mut header: Vec<&str> = COLUMNS.to_vec();
    if with_tags {
        header.push(TAGS_COLUMN);
    }
    writer.write_record(&header)?;
    for r in table.records() {
        let score = format!("{:.3}", r.mapping_score);
        let mut row = vec![
            r.source_term_id.as_str(),
            r.source_term.as_str(),
            r.mapped_term_label.as_str(),
            r.mapped_term_curie.as_str(),
            r.mapped_term_iri.as_str(),
            score.as_str(),
        ];
        let tags = r.tags_joined();
        if with_tags {
            row.push(tags.as_str());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write a mapping file, creating parent directories.
pub fn write_mappings(path: &Path, table: &MappingTable, metadata: &RunMetadata) -> Result<()> {
    create_parent(path)?;
    let file = fs::File::create(path)?;
    write_table(std::io::BufWriter::new(file), table, metadata)?;
    tracing::info!("Saved {} mappings to {}", table.len(), path.display());
    Ok(())
}

/// Write term graphs next to a mapping file as `<output>-term-graphs.json`.
pub fn write_graphs(output: &Path, graphs: &[TermGraph]) -> Result<PathBuf> {
    let mut name = output.as_os_str().to_owned();
    name.push("-term-graphs.json");
    let path = PathBuf::from(name);
    create_parent(&path)?;
    let json =
        serde_json::to_string_pretty(graphs).map_err(|e| Error::Serialization(e.to_string()))?;
    fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{rank, Candidate, RankPolicy, SourceTerm};

    fn table(tagged: bool) -> MappingTable {
        let mut s = SourceTerm::new("asthma, childhood", "S1");
        if tagged {
            s = s.with_tags(["resp", "kids"]);
        }
        let sources = vec![s, SourceTerm::new("zzz", "S2")];
        let cands = vec![Candidate {
            source: 0,
            iri: "http://purl.obolibrary.org/obo/MONDO_0004979".into(),
            label: "asthma".into(),
            score: 0.87654,
        }];
        let policy = RankPolicy {
            include_unmapped: true,
            ..RankPolicy::default()
        };
        MappingTable::new(&sources, rank(&sources, cands, &policy))
    }

    fn render(table: &MappingTable) -> String {
        let meta = RunMetadata::new("mondo.obo", &Config::default());
        let mut buf = Vec::new();
        write_table(&mut buf, table, &meta).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn header_precedes_csv() {
        let text = render(&table(false));
        let comments: Vec<&str> = text.lines().filter(|l| l.starts_with("# ")).collect();
        assert_eq!(comments.len(), 11);
        assert!(text.contains("# Target ontology: mondo.obo"));
        assert!(text.contains("# Mapper: tfidf"));
        assert!(text.contains("# 1 of 2 terms mapped to 1 unique targets"));
        assert!(text.contains(
            "\"asthma, childhood\",asthma,MONDO:0004979,http://purl.obolibrary.org/obo/MONDO_0004979,0.877"
        ));
    }

    #[test]
    fn tags_column_follows_tag_usage() {
        let text = render(&table(true));
        assert!(text.contains(",Mapping Score,Tags"));
        assert!(text.contains("\"resp,kids\""));
        assert!(text.contains("S2,zzz,,,,0.000,unmapped"));
    }

    #[test]
    fn files_and_graphs_land_in_new_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/map.csv");
        let meta = RunMetadata::new("x", &Config::default());
        write_mappings(&path, &table(false), &meta).unwrap();
        assert!(path.is_file());
        let graphs = write_graphs(&path, &[]).unwrap();
        assert_eq!(graphs, dir.path().join("out/nested/map.csv-term-graphs.json"));
        assert_eq!(fs::read_to_string(graphs).unwrap(), "[]");
    }
}
