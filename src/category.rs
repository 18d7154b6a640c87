//! Category backfill for rows that reach the writer without one.
//!
//! The transformer already derives `categoryFolder` from the parent name.
//! When that comes out blank, the resolver looks the node up again and
//! takes the parent's name only if the parent is a project group.

use crate::content::ContentTree;
use crate::document::{fields, IndexRow};
use crate::models::PROJECT_GROUP_DOC_TYPE;

/// Fill a blank `categoryFolder` from the node's project group.
///
/// Returns `true` when the field was set. Rows that already have a category,
/// nodes missing from the tree, and parents of any other type are left alone.
pub fn resolve_category(row: &mut IndexRow, tree: &ContentTree) -> bool {
    if !row.fields.is_blank(fields::CATEGORY_FOLDER) {
        return false;
    }

    let Some(parent) = tree.parent_of(row.node_id) else {
        return false;
    };

    if parent.doc_type != PROJECT_GROUP_DOC_TYPE {
        return false;
    }

    let category = parent.name.trim().to_lowercase();
    tracing::debug!(node_id = row.node_id, category = %category, "backfilled category");
    row.fields.insert(fields::CATEGORY_FOLDER, category);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::tests::node;
    use crate::document::FlatFieldMap;

    fn row(node_id: i64, category: Option<&str>) -> IndexRow {
        let mut fields = FlatFieldMap::new();
        if let Some(c) = category {
            fields.insert("categoryFolder", c);
        }
        IndexRow {
            node_id,
            index_type: "content".to_string(),
            fields,
        }
    }

    fn tree() -> ContentTree {
        ContentTree::new(vec![
            node(1, None, "Projects", "Projects"),
            node(10, Some(1), " Themes ", "ProjectGroup"),
            node(100, Some(10), "Dark Theme", "Project"),
            node(200, Some(1), "Loose", "Project"),
        ])
    }

    #[test]
    fn test_blank_category_filled_from_group() {
        let mut r = row(100, Some("  "));
        assert!(resolve_category(&mut r, &tree()));
        assert_eq!(r.fields.get("categoryFolder"), Some("themes"));
    }

    #[test]
    fn test_missing_field_is_treated_as_blank() {
        let mut r = row(100, None);
        assert!(resolve_category(&mut r, &tree()));
        assert_eq!(r.fields.get("categoryFolder"), Some("themes"));
    }

    #[test]
    fn test_existing_category_untouched() {
        let mut r = row(100, Some("editors"));
        assert!(!resolve_category(&mut r, &tree()));
        assert_eq!(r.fields.get("categoryFolder"), Some("editors"));
    }

    #[test]
    fn test_parent_not_a_group() {
        let mut r = row(200, Some(""));
        assert!(!resolve_category(&mut r, &tree()));
        assert_eq!(r.fields.get("categoryFolder"), Some(""));
    }

    #[test]
    fn test_unknown_node_is_a_no_op() {
        let mut r = row(9999, Some(""));
        let before = r.clone();
        assert!(!resolve_category(&mut r, &tree()));
        assert_eq!(r, before);
    }
}
