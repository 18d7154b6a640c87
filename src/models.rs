//! Core data models read from the content store and the stats store.
//!
//! These types are read-only inputs to the transformation pipeline. Nothing
//! in this crate mutates them once loaded.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document type alias of a package project.
pub const PROJECT_DOC_TYPE: &str = "Project";

/// Document type alias of a project group (a category folder).
pub const PROJECT_GROUP_DOC_TYPE: &str = "ProjectGroup";

/// A published record in the content tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    pub id: i64,
    pub name: String,
    pub doc_type: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sort_order: i32,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

fn default_visible() -> bool {
    true
}

impl ContentNode {
    /// Property value rendered as a string.
    ///
    /// Strings come back as-is, numbers and booleans in their JSON text form.
    /// Missing and `null` properties return `None`.
    pub fn prop_str(&self, alias: &str) -> Option<String> {
        match self.properties.get(alias)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Property value with blank strings treated as missing.
    pub fn prop_non_blank(&self, alias: &str) -> Option<String> {
        self.prop_str(alias).filter(|s| !s.trim().is_empty())
    }

    /// Property value read as a checkbox.
    ///
    /// `true`, non-zero numbers, `"1"` and `"true"` (any case) are true.
    /// Everything else, including a missing property, is false.
    pub fn prop_bool(&self, alias: &str) -> bool {
        match self.properties.get(alias) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => {
                let s = s.trim();
                s == "1" || s.eq_ignore_ascii_case("true")
            }
            _ => false,
        }
    }
}

/// Type tag of a file attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileType {
    Package,
    Screenshot,
    Other(String),
}

impl FileType {
    pub fn as_str(&self) -> &str {
        match self {
            FileType::Package => "package",
            FileType::Screenshot => "screenshot",
            FileType::Other(s) => s,
        }
    }
}

impl From<&str> for FileType {
    fn from(s: &str) -> Self {
        match s {
            "package" => FileType::Package,
            "screenshot" => FileType::Screenshot,
            other => FileType::Other(other.to_string()),
        }
    }
}

impl From<String> for FileType {
    fn from(s: String) -> Self {
        FileType::from(s.as_str())
    }
}

impl From<FileType> for String {
    fn from(t: FileType) -> Self {
        t.as_str().to_string()
    }
}

/// A file uploaded against a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    pub id: i64,
    pub project_id: i64,
    pub file_type: FileType,
    pub path: String,
    /// Declared minimum host version for strict packages, as written by the uploader.
    #[serde(default)]
    pub min_version_strict: Option<String>,
}

/// Statistics joined onto one project for a single index pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectStats {
    pub votes: i64,
    pub downloads: i64,
    pub files: Vec<ProjectFile>,
    pub compat_versions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node_with(props: Value) -> ContentNode {
        serde_json::from_value(json!({
            "id": 1,
            "name": "Node",
            "docType": "Project",
            "createDate": "2024-01-01T00:00:00Z",
            "updateDate": "2024-01-02T00:00:00Z",
            "properties": props,
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults_on_deserialize() {
        let node = node_with(json!({}));
        assert!(node.visible);
        assert_eq!(node.parent_id, None);
        assert_eq!(node.url, "");
    }

    #[test]
    fn test_prop_bool_forms() {
        let node = node_with(json!({
            "a": true, "b": "1", "c": "True", "d": 1, "e": "0", "f": false, "g": null
        }));
        assert!(node.prop_bool("a"));
        assert!(node.prop_bool("b"));
        assert!(node.prop_bool("c"));
        assert!(node.prop_bool("d"));
        assert!(!node.prop_bool("e"));
        assert!(!node.prop_bool("f"));
        assert!(!node.prop_bool("g"));
        assert!(!node.prop_bool("missing"));
    }

    #[test]
    fn test_prop_str_forms() {
        let node = node_with(json!({"s": "text", "n": 42, "blank": "  ", "null": null}));
        assert_eq!(node.prop_str("s").as_deref(), Some("text"));
        assert_eq!(node.prop_str("n").as_deref(), Some("42"));
        assert_eq!(node.prop_str("null"), None);
        assert_eq!(node.prop_non_blank("blank"), None);
    }

    #[test]
    fn test_file_type_serde() {
        let f: ProjectFile = serde_json::from_value(json!({
            "id": 3, "projectId": 1, "fileType": "screenshot", "path": "/a.png"
        }))
        .unwrap();
        assert_eq!(f.file_type, FileType::Screenshot);

        let f: ProjectFile = serde_json::from_value(json!({
            "id": 4, "projectId": 1, "fileType": "docs", "path": "/readme.pdf"
        }))
        .unwrap();
        assert_eq!(f.file_type, FileType::Other("docs".to_string()));
        assert_eq!(f.file_type.as_str(), "docs");
    }
}
