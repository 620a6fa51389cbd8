//! Template-based rewriting of source terms before mapping.
//!
//! A template is a regular expression that must match the *whole* term; the capture
//! groups, joined by single spaces, replace the term. Templates are tried in order and a
//! final catch-all `(.*)` keeps terms no template matched. A template line may carry a
//! `::tag1,tag2` suffix whose tags are attached to every term it rewrites.
//!
//! Blocklist patterns mark terms that must not be mapped: they receive the
//! [`IGNORE_TAG`] and, optionally, a replacement text.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::info;

use crate::mapping::IGNORE_TAG;
use crate::source::TaggedTerm;
use crate::Result;

const TAG_SEPARATOR: &str = "::";

/// A compiled whole-term template.
#[derive(Debug, Clone)]
pub struct Template {
    regex: Regex,
    tags: Vec<String>,
}

impl Template {
    /// Compile one template line (`pattern` or `pattern::tag1,tag2`).
    pub fn parse(line: &str) -> Result<Self> {
        let (pattern, tags) = match line.rsplit_once(TAG_SEPARATOR) {
            Some((pattern, tags)) => (
                pattern,
                tags.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            None => (line, Vec::new()),
        };
        Ok(Self {
            regex: full_match(pattern)?,
            tags,
        })
    }

    fn catch_all() -> Result<Self> {
        Self::parse("(.*)")
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The rewritten term when the template matches all of `term` and captures some text.
    pub fn apply(&self, term: &str) -> Option<String> {
        let caps = self.regex.captures(term)?;
        let combined = caps
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        (!combined.is_empty()).then_some(combined)
    }
}

fn full_match(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{pattern})$"))?)
}

/// Non-blank lines of a file.
fn read_lines(path: &Path) -> Result<Vec<String>> {
    Ok(fs::read_to_string(path)?
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// Compile every template line of a file, followed by the catch-all.
pub fn load_templates(path: &Path) -> Result<Vec<Template>> {
    let mut templates = read_lines(path)?
        .iter()
        .map(|l| Template::parse(l))
        .collect::<Result<Vec<_>>>()?;
    templates.push(Template::catch_all()?);
    Ok(templates)
}

/// Compile every blocklist line of a file into a whole-term pattern.
pub fn load_blocklist(path: &Path) -> Result<Vec<Regex>> {
    read_lines(path)?.iter().map(|l| full_match(l)).collect()
}

/// Rewrite each term with the first matching template. Terms no template turns into
/// non-empty text are dropped.
pub fn preprocess_terms<S: AsRef<str>>(terms: &[S], templates: &[Template]) -> Vec<String> {
    terms
        .iter()
        .filter_map(|t| templates.iter().find_map(|tpl| tpl.apply(t.as_ref())))
        .collect()
}

/// Tagged preprocessing: blocklisted terms are tagged [`IGNORE_TAG`] (and replaced by
/// `blocklist_char` when it is non-empty); other terms are rewritten by the first
/// matching template and pick up its tags. Unmatched terms are kept as they are.
pub fn preprocess_tagged_terms<S: AsRef<str>>(
    terms: &[S],
    templates: &[Template],
    blocklist: &[Regex],
    blocklist_char: &str,
) -> Vec<TaggedTerm> {
    let mut out = Vec::with_capacity(terms.len());
    for term in terms {
        let term = term.as_ref();
        let mut tagged = TaggedTerm::new(term);
        if blocklist.iter().any(|b| b.is_match(term)) {
            tagged.add_tags([IGNORE_TAG]);
            if !blocklist_char.is_empty() {
                tagged.term = blocklist_char.to_string();
            }
            out.push(tagged);
            continue;
        }
        if let Some((rewritten, tpl)) = templates
            .iter()
            .find_map(|tpl| tpl.apply(term).map(|r| (r, tpl)))
        {
            tagged.term = rewritten;
            tagged.add_tags(tpl.tags().iter().cloned());
        }
        out.push(tagged);
    }
    out
}

/// Preprocess a list file and write `<stem>-preprocessed.txt` next to it.
pub fn preprocess_file(path: &Path, template_path: &Path) -> Result<PathBuf> {
    let terms = read_lines(path)?;
    let processed = preprocess_terms(&terms, &load_templates(template_path)?);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let output = path.with_file_name(format!("{stem}-preprocessed.txt"));
    fs::write(&output, processed.join("\n"))?;
    info!(
        "Preprocessed {} terms into {}",
        processed.len(),
        output.display()
    );
    Ok(output)
}
