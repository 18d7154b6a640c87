//! Final field shaping before a document is written to the index.
//!
//! [`shape`] takes a document straight out of [`ShapedDocument::from_row`]
//! and returns the document the index should store:
//!
//! 1. `body`: the original markup is kept in `__body` as a keyword field and
//!    `body` is replaced by the markup-free text, analyzed with term vectors.
//! 2. `versions`, `minimumVersionStrict`, `compatVersions`: each
//!    comma-delimited field becomes one keyword field per token, same name,
//!    in the original token order. Duplicates within a field are kept.
//! 3. `num_version`: one numeric field per distinct token across all three
//!    fields, using the sortable version encoding. Unparsable tokens are
//!    skipped. Tokens with components above 999 are skipped with a warning.
//!
//! Only fields still carrying [`FieldOptions::SOURCE`] are touched, so
//! shaping an already shaped document returns it unchanged.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::document::{fields, FieldOptions, IndexField, ShapedDocument};
use crate::version;

/// Outcome counters for one shaped document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapeReport {
    /// Distinct version tokens encoded into `num_version`.
    pub encoded: usize,
    /// Tokens dropped because they did not parse as a version.
    pub unparsable: usize,
    /// Tokens dropped because a component would overflow the encoding.
    pub out_of_range: usize,
}

/// Shape a document for the index.
pub fn shape(doc: ShapedDocument) -> ShapedDocument {
    shape_with_report(doc).0
}

/// Shape a document and report what happened to its version tokens.
pub fn shape_with_report(doc: ShapedDocument) -> (ShapedDocument, ShapeReport) {
    let doc = shape_body(doc);
    let (mut doc, tokens) = expand_delimited(doc);
    let report = add_numeric_versions(&mut doc, &tokens);
    (doc, report)
}

fn shape_body(mut doc: ShapedDocument) -> ShapedDocument {
    let Some(raw) = doc.source_text(fields::BODY).map(str::to_string) else {
        return doc;
    };

    doc.add(IndexField::text(
        format!("{}{}", fields::RAW_PREFIX, fields::BODY),
        raw.as_str(),
        FieldOptions::KEYWORD,
    ));
    doc.remove_field(fields::BODY);
    doc.add(IndexField::text(
        fields::BODY,
        strip_markup(&raw),
        FieldOptions::FULL_TEXT,
    ));
    doc
}

/// Split the delimited version fields. Returns the distinct tokens seen,
/// in first-seen order.
fn expand_delimited(mut doc: ShapedDocument) -> (ShapedDocument, Vec<String>) {
    let mut seen = HashSet::new();
    let mut distinct = Vec::new();

    for name in fields::DELIMITED_VERSION_FIELDS {
        let Some(value) = doc.source_text(name).map(str::to_string) else {
            continue;
        };

        let tokens: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        for token in &tokens {
            if seen.insert(token.to_string()) {
                distinct.push(token.to_string());
            }
        }

        doc.remove_field(name);
        for token in tokens {
            doc.add(IndexField::text(name, token, FieldOptions::KEYWORD));
        }
    }

    (doc, distinct)
}

fn add_numeric_versions(doc: &mut ShapedDocument, tokens: &[String]) -> ShapeReport {
    let mut report = ShapeReport::default();

    for token in tokens {
        let Some(parsed) = version::normalize(token) else {
            tracing::debug!(node_id = doc.node_id, token = %token, "skipping unparsable version");
            report.unparsable += 1;
            continue;
        };

        match parsed.encode() {
            Ok(encoded) => {
                doc.add(IndexField::numeric(fields::NUM_VERSION, encoded));
                report.encoded += 1;
            }
            Err(e) => {
                tracing::warn!(
                    node_id = doc.node_id,
                    token = %token,
                    error = %e,
                    "version cannot be range-encoded"
                );
                report.out_of_range += 1;
            }
        }
    }

    report
}

const MARKUP_PATTERN: &str = r"(?is)<!--.*?-->|<(script|style)\b.*?</(script|style)\s*>|<[^>]*>";

fn tag_pattern() -> Option<&'static Regex> {
    static TAGS: OnceLock<Option<Regex>> = OnceLock::new();
    TAGS.get_or_init(|| match Regex::new(MARKUP_PATTERN) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(error = %e, "markup pattern failed to compile, body text left as-is");
            None
        }
    })
    .as_ref()
}

/// Remove markup tags and decode the common character entities.
///
/// Tags become spaces so adjacent block elements do not glue words together;
/// runs of whitespace collapse to one space.
pub fn strip_markup(html: &str) -> String {
    let text = match tag_pattern() {
        Some(re) => re.replace_all(html, " "),
        None => Cow::Borrowed(html),
    };
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
