//! Index rows and shaped documents.
//!
//! A project passes through two representations on its way to the index:
//!
//! 1. [`IndexRow`]: a node id, the index type tag, and a [`FlatFieldMap`]
//!    of string values. This is what the transformer produces.
//! 2. [`ShapedDocument`]: an ordered list of [`IndexField`]s, each carrying
//!    its own storage and indexing flags. Field names may repeat, which is
//!    how multi-valued fields are expressed.
//!
//! [`ShapedDocument::from_row`] converts every flat field into a single
//! [`FieldOptions::SOURCE`] field. The shaper then rewrites those source
//! fields into their final form.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Field names written by the transformer.
pub mod fields {
    pub const BODY: &str = "body";
    pub const NODE_NAME: &str = "nodeName";
    pub const CATEGORY_FOLDER: &str = "categoryFolder";
    pub const UPDATE_DATE: &str = "updateDate";
    pub const CREATE_DATE: &str = "createDate";
    pub const NODE_TYPE_ALIAS: &str = "nodeTypeAlias";
    pub const URL: &str = "url";
    pub const UNIQUE_ID: &str = "uniqueId";
    pub const WORKS_ON_UAAS: &str = "worksOnUaaS";
    pub const POPULARITY: &str = "popularity";
    pub const KARMA: &str = "karma";
    pub const DOWNLOADS: &str = "downloads";
    pub const IMAGE: &str = "image";
    pub const PACKAGE_FILES: &str = "packageFiles";
    pub const PROJECT_LIVE: &str = "projectLive";
    pub const APPROVED: &str = "approved";
    pub const VERSIONS: &str = "versions";
    pub const COMPAT_VERSIONS: &str = "compatVersions";
    pub const MINIMUM_VERSION_STRICT: &str = "minimumVersionStrict";

    /// Multi-valued range field holding every encoded version on a document.
    ///
    /// Other index consumers query this name directly.
    pub const NUM_VERSION: &str = "num_version";

    /// Prefix for fields that keep an unprocessed copy of another field.
    pub const RAW_PREFIX: &str = "__";

    /// Comma-delimited version fields, in the order the shaper expands them.
    pub const DELIMITED_VERSION_FIELDS: [&str; 3] =
        [VERSIONS, MINIMUM_VERSION_STRICT, COMPAT_VERSIONS];
}

/// Ordered string map making up one index row.
///
/// Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatFieldMap {
    entries: Vec<(String, String)>,
}

impl FlatFieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// True when the key is missing or holds only whitespace.
    pub fn is_blank(&self, key: &str) -> bool {
        self.get(key).map_or(true, |v| v.trim().is_empty())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FlatFieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FlatFieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for FlatFieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// One record on its way to the index, before shaping.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRow {
    pub node_id: i64,
    pub index_type: String,
    pub fields: FlatFieldMap,
}

/// How a field participates in search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indexing {
    /// Tokenized for full-text search.
    Analyzed,
    /// Indexed as a single exact term, without length norms.
    NotAnalyzedNoNorms,
    /// Indexed as a number for range queries only.
    Numeric,
}

impl Indexing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Indexing::Analyzed => "analyzed",
            Indexing::NotAnalyzedNoNorms => "not_analyzed_no_norms",
            Indexing::Numeric => "numeric",
        }
    }
}

/// Storage and indexing flags of a single field occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldOptions {
    pub stored: bool,
    pub indexing: Indexing,
    pub term_vectors: bool,
}

impl FieldOptions {
    /// A flat field copied into the document as-is, not yet shaped.
    pub const SOURCE: Self = Self {
        stored: true,
        indexing: Indexing::Analyzed,
        term_vectors: false,
    };

    /// Markup-free body text for full-text search.
    pub const FULL_TEXT: Self = Self {
        stored: true,
        indexing: Indexing::Analyzed,
        term_vectors: true,
    };

    /// Exact, stored value not used for text search.
    pub const KEYWORD: Self = Self {
        stored: true,
        indexing: Indexing::NotAnalyzedNoNorms,
        term_vectors: false,
    };

    /// Stored number for range queries.
    pub const NUMERIC: Self = Self {
        stored: true,
        indexing: Indexing::Numeric,
        term_vectors: false,
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    Text(String),
    I64(i64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::I64(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::I64(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexField {
    pub name: String,
    pub value: FieldValue,
    pub options: FieldOptions,
}

impl IndexField {
    pub fn text(name: impl Into<String>, value: impl Into<String>, options: FieldOptions) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
            options,
        }
    }

    pub fn numeric(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::I64(value),
            options: FieldOptions::NUMERIC,
        }
    }
}

/// The multi-valued document handed to the index sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedDocument {
    pub node_id: i64,
    pub index_type: String,
    pub fields: Vec<IndexField>,
}

impl ShapedDocument {
    /// Copy every flat field into a single [`FieldOptions::SOURCE`] field.
    pub fn from_row(row: &IndexRow) -> Self {
        Self {
            node_id: row.node_id,
            index_type: row.index_type.clone(),
            fields: row
                .fields
                .iter()
                .map(|(k, v)| IndexField::text(k, v, FieldOptions::SOURCE))
                .collect(),
        }
    }

    /// All occurrences of a field name, in document order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a IndexField> + 'a {
        self.fields.iter().filter(move |f| f.name == name)
    }

    /// Text values of every occurrence of a field name.
    pub fn texts<'a>(&'a self, name: &'a str) -> Vec<&'a str> {
        self.get_all(name).filter_map(|f| f.value.as_text()).collect()
    }

    /// Numeric values of every occurrence of a field name.
    pub fn numbers(&self, name: &str) -> Vec<i64> {
        self.get_all(name).filter_map(|f| f.value.as_i64()).collect()
    }

    /// The unshaped source field with this name, if still present.
    pub fn source_text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name && f.options == FieldOptions::SOURCE)
            .and_then(|f| f.value.as_text())
    }

    /// Remove every occurrence of a field name.
    pub fn remove_field(&mut self, name: &str) {
        self.fields.retain(|f| f.name != name);
    }

    pub fn add(&mut self, field: IndexField) {
        self.fields.push(field);
    }
}
