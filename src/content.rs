//! Read-only access to the published content tree.
//!
//! The content store is an external system. This module defines the
//! [`ContentStore`] boundary, an in-memory [`ContentTree`] that the whole pass
//! works against once loaded, a JSON snapshot store, and [`ContentSession`],
//! which acquires the tree lazily the first time a pass needs it.
//!
//! # Snapshot format
//!
//! ```json
//! { "nodes": [
//!     { "id": 1050, "name": "Projects", "docType": "Projects",
//!       "createDate": "2020-01-01T00:00:00Z", "updateDate": "2020-01-01T00:00:00Z" },
//!     { "id": 1100, "name": "Uploaders", "docType": "ProjectGroup", "parentId": 1050, ... },
//!     { "id": 2001, "name": "Media Uploader", "docType": "Project", "parentId": 1100,
//!       "properties": { "projectLive": true, "compatibleVersions": "v7,v8" }, ... }
//! ] }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::error::{IndexError, Result};
use crate::models::{ContentNode, PROJECT_DOC_TYPE};

/// Published content indexed by id and parent.
#[derive(Debug, Clone, Default)]
pub struct ContentTree {
    nodes: HashMap<i64, ContentNode>,
    children: HashMap<i64, Vec<i64>>,
    roots: Vec<i64>,
}

impl ContentTree {
    pub fn new(nodes: impl IntoIterator<Item = ContentNode>) -> Self {
        let nodes: HashMap<i64, ContentNode> = nodes.into_iter().map(|n| (n.id, n)).collect();

        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut roots = Vec::new();
        for node in nodes.values() {
            match node.parent_id.filter(|p| nodes.contains_key(p)) {
                Some(parent) => children.entry(parent).or_default().push(node.id),
                None => roots.push(node.id),
            }
        }

        let order = |ids: &mut Vec<i64>| {
            ids.sort_by_key(|id| (nodes[id].sort_order, *id));
        };
        order(&mut roots);
        for ids in children.values_mut() {
            order(ids);
        }

        Self {
            nodes,
            children,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&ContentNode> {
        self.nodes.get(&id)
    }

    pub fn parent_of(&self, id: i64) -> Option<&ContentNode> {
        self.get(id)?.parent_id.and_then(|p| self.get(p))
    }

    /// Direct children in sort order.
    pub fn children_of(&self, id: i64) -> impl Iterator<Item = &ContentNode> + '_ {
        self.children
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|c| self.nodes.get(c))
    }

    pub fn has_visible_children(&self, id: i64) -> bool {
        self.children_of(id).any(|c| c.visible)
    }

    /// Live projects in tree order, optionally limited to descendants of `root`.
    ///
    /// A project is live when its doc type is `Project` and its `projectLive`
    /// property is set. Projects nested below other projects are included.
    pub fn live_projects(&self, root: Option<i64>) -> Vec<&ContentNode> {
        let starts: Vec<i64> = match root {
            Some(id) => self.children.get(&id).cloned().unwrap_or_default(),
            None => self.roots.clone(),
        };

        let mut out = Vec::new();
        let mut stack: Vec<i64> = starts.into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if node.doc_type == PROJECT_DOC_TYPE && node.prop_bool("projectLive") {
                out.push(node);
            }
            if let Some(kids) = self.children.get(&id) {
                stack.extend(kids.iter().rev());
            }
        }
        out
    }
}

/// Boundary to the external content store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Load the published tree. Failure here aborts the pass.
    async fn load_tree(&self) -> Result<ContentTree>;
}

#[async_trait]
impl ContentStore for ContentTree {
    async fn load_tree(&self) -> Result<ContentTree> {
        Ok(self.clone())
    }
}

#[derive(Deserialize)]
struct Snapshot {
    nodes: Vec<ContentNode>,
}

/// Content store backed by a JSON snapshot file.
#[derive(Debug, Clone)]
pub struct JsonContentStore {
    path: PathBuf,
}

impl JsonContentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContentStore for JsonContentStore {
    async fn load_tree(&self) -> Result<ContentTree> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            IndexError::ContentUnavailable(format!("{}: {e}", self.path.display()))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&raw).map_err(|e| {
            IndexError::ContentUnavailable(format!("{}: {e}", self.path.display()))
        })?;
        tracing::debug!(
            path = %self.path.display(),
            nodes = snapshot.nodes.len(),
            "loaded content snapshot"
        );
        Ok(ContentTree::new(snapshot.nodes))
    }
}

/// A lazily acquired view of the content store.
///
/// The tree is loaded on first use and reused for the rest of the pass.
pub struct ContentSession {
    store: Box<dyn ContentStore>,
    tree: OnceCell<ContentTree>,
}

impl ContentSession {
    pub fn new(store: Box<dyn ContentStore>) -> Self {
        Self {
            store,
            tree: OnceCell::new(),
        }
    }

    /// Return the loaded tree, loading it first if needed.
    pub async fn acquire(&self) -> Result<&ContentTree> {
        self.tree.get_or_try_init(|| self.store.load_tree()).await
    }
}
