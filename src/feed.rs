//! The index feed: live projects joined with their statistics.
//!
//! Statistics come from an external [`StatsProvider`] as whole-pass maps
//! keyed by project id. They are gathered once, before the per-record loop,
//! so transforming a record never performs I/O. Missing entries default to
//! zero or empty.
//!
//! ```text
//! ContentTree ──live_projects()──┐
//!                                ├──▶ IndexFeed::rows() ──▶ IndexRow …
//! StatsProvider ──gather()───────┘
//! ```

use std::collections::HashMap;

use async_trait::async_trait;

use crate::content::ContentTree;
use crate::document::IndexRow;
use crate::error::Result;
use crate::models::{ContentNode, ProjectFile, ProjectStats};
use crate::transform::RecordTransformer;

/// Boundary to the external statistics store.
///
/// Each method returns one map for the whole pass.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Vote totals per project.
    async fn project_votes(&self) -> Result<HashMap<i64, i64>>;

    /// Lifetime package download totals per project.
    async fn project_downloads(&self) -> Result<HashMap<i64, i64>>;

    /// Current files for the given projects.
    async fn project_files(&self, project_ids: &[i64]) -> Result<HashMap<i64, Vec<ProjectFile>>>;

    /// Declared compatible version strings per project.
    async fn project_compat_versions(&self) -> Result<HashMap<i64, Vec<String>>>;
}

/// The joined statistics for one pass.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub votes: HashMap<i64, i64>,
    pub downloads: HashMap<i64, i64>,
    pub files: HashMap<i64, Vec<ProjectFile>>,
    pub compat_versions: HashMap<i64, Vec<String>>,
}

impl StatsSnapshot {
    pub async fn gather(provider: &dyn StatsProvider, project_ids: &[i64]) -> Result<Self> {
        let snapshot = Self {
            votes: provider.project_votes().await?,
            downloads: provider.project_downloads().await?,
            files: provider.project_files(project_ids).await?,
            compat_versions: provider.project_compat_versions().await?,
        };
        tracing::debug!(
            projects = project_ids.len(),
            with_votes = snapshot.votes.len(),
            with_downloads = snapshot.downloads.len(),
            "gathered project stats"
        );
        Ok(snapshot)
    }

    /// Stats for one project, defaulting anything missing.
    pub fn for_project(&self, id: i64) -> ProjectStats {
        ProjectStats {
            votes: self.votes.get(&id).copied().unwrap_or(0),
            downloads: self.downloads.get(&id).copied().unwrap_or(0),
            files: self.files.get(&id).cloned().unwrap_or_default(),
            compat_versions: self.compat_versions.get(&id).cloned().unwrap_or_default(),
        }
    }
}

/// In-memory provider, useful for fixtures and dry runs.
#[async_trait]
impl StatsProvider for StatsSnapshot {
    async fn project_votes(&self) -> Result<HashMap<i64, i64>> {
        Ok(self.votes.clone())
    }

    async fn project_downloads(&self) -> Result<HashMap<i64, i64>> {
        Ok(self.downloads.clone())
    }

    async fn project_files(&self, project_ids: &[i64]) -> Result<HashMap<i64, Vec<ProjectFile>>> {
        Ok(project_ids
            .iter()
            .filter_map(|id| self.files.get(id).map(|f| (*id, f.clone())))
            .collect())
    }

    async fn project_compat_versions(&self) -> Result<HashMap<i64, Vec<String>>> {
        Ok(self.compat_versions.clone())
    }
}

/// The ordered sequence of live projects for one pass.
pub struct IndexFeed<'a> {
    tree: &'a ContentTree,
    projects: Vec<&'a ContentNode>,
    stats: StatsSnapshot,
}

impl<'a> IndexFeed<'a> {
    /// Enumerate live projects and gather their stats.
    pub async fn open(
        tree: &'a ContentTree,
        provider: &dyn StatsProvider,
        root: Option<i64>,
    ) -> Result<IndexFeed<'a>> {
        let projects = tree.live_projects(root);
        let ids: Vec<i64> = projects.iter().map(|p| p.id).collect();
        let stats = StatsSnapshot::gather(provider, &ids).await?;
        Ok(Self {
            tree,
            projects,
            stats,
        })
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn tree(&self) -> &'a ContentTree {
        self.tree
    }

    /// Transform projects lazily, in feed order.
    pub fn rows<'f>(
        &'f self,
        transformer: &'f RecordTransformer,
        index_type: &'f str,
    ) -> impl Iterator<Item = IndexRow> + 'f {
        self.projects.iter().map(move |project| {
            tracing::debug!(project_id = project.id, name = %project.name, "indexing project");
            let stats = self.stats.for_project(project.id);
            transformer.transform(project, self.tree, &stats, index_type)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::tests::{node, with_props};
    use crate::models::FileType;
    use serde_json::json;

    fn live(id: i64, parent: i64, name: &str) -> ContentNode {
        with_props(node(id, Some(parent), name, "Project"), json!({"projectLive": true}))
    }

    fn tree() -> ContentTree {
        ContentTree::new(vec![
            node(1, None, "Projects", "Projects"),
            node(10, Some(1), "Themes", "ProjectGroup"),
            live(100, 10, "Dark"),
            live(101, 10, "Light"),
            node(102, Some(10), "Draft", "Project"),
        ])
    }

    fn stats() -> StatsSnapshot {
        StatsSnapshot {
            votes: HashMap::from([(100, 4)]),
            downloads: HashMap::from([(100, 50), (555, 9)]),
            files: HashMap::from([(
                100,
                vec![ProjectFile {
                    id: 1,
                    project_id: 100,
                    file_type: FileType::Package,
                    path: "/dark.zip".to_string(),
                    min_version_strict: None,
                }],
            )]),
            compat_versions: HashMap::from([(101, vec!["v8".to_string()])]),
        }
    }

    #[test]
    fn test_missing_stats_default_to_zero() {
        let s = stats().for_project(999);
        assert_eq!(s, ProjectStats::default());
    }

    #[tokio::test]
    async fn test_feed_joins_stats_in_order() {
        let tree = tree();
        let provider = stats();
        let feed = IndexFeed::open(&tree, &provider, None).await.unwrap();
        assert_eq!(feed.len(), 2);

        let transformer = RecordTransformer::default();
        let rows: Vec<IndexRow> = feed.rows(&transformer, "content").collect();
        assert_eq!(rows.iter().map(|r| r.node_id).collect::<Vec<_>>(), vec![100, 101]);

        assert_eq!(rows[0].fields.get("karma"), Some("4"));
        assert_eq!(rows[0].fields.get("downloads"), Some("50"));
        assert_eq!(rows[0].fields.get("packageFiles"), Some("1"));
        assert_eq!(rows[1].fields.get("karma"), Some("0"));
        assert_eq!(rows[1].fields.get("compatVersions"), Some("8.0.0"));
    }

    #[tokio::test]
    async fn test_snapshot_provider_filters_files_by_id() {
        let provider = stats();
        let files = provider.project_files(&[101]).await.unwrap();
        assert!(files.is_empty());
        let files = provider.project_files(&[100, 101]).await.unwrap();
        assert_eq!(files.len(), 1);
    }
}
