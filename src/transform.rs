//! Project record → flat index row.
//!
//! [`RecordTransformer::transform`] reads one live project from the content
//! tree plus its joined [`ProjectStats`] and produces an [`IndexRow`]. The
//! output is fully determined by the inputs except for the popularity recency
//! term, which depends on the clock passed to [`RecordTransformer::transform_at`].

use chrono::{DateTime, Utc};

use crate::content::ContentTree;
use crate::document::{fields, FlatFieldMap, IndexRow};
use crate::models::{ContentNode, FileType, ProjectFile, ProjectStats};
use crate::popularity::PopularityInputs;
use crate::version::{self, CanonicalVersion};

/// Date format used for every date field in a row.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `nodeTypeAlias` value written on every project row.
pub const PROJECT_NODE_TYPE_ALIAS: &str = "project";

/// A package file that declares an exact minimum supported host version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrictPackageVersion {
    pub file_id: i64,
    pub min_version: CanonicalVersion,
}

/// Picks the strict package files out of a project's file list.
pub trait StrictVersionClassifier: Send + Sync {
    fn strict_package_versions(&self, files: &[ProjectFile]) -> Vec<StrictPackageVersion>;
}

/// Treats every package file with a parseable declared minimum as strict.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredMinimumClassifier;

impl StrictVersionClassifier for DeclaredMinimumClassifier {
    fn strict_package_versions(&self, files: &[ProjectFile]) -> Vec<StrictPackageVersion> {
        files
            .iter()
            .filter(|f| f.file_type == FileType::Package)
            .filter_map(|f| {
                let declared = f.min_version_strict.as_deref()?;
                Some(StrictPackageVersion {
                    file_id: f.id,
                    min_version: version::normalize(declared)?,
                })
            })
            .collect()
    }
}

/// Builds flat index rows from project records.
pub struct RecordTransformer {
    classifier: Box<dyn StrictVersionClassifier>,
}

impl Default for RecordTransformer {
    fn default() -> Self {
        Self::new(Box::new(DeclaredMinimumClassifier))
    }
}

impl RecordTransformer {
    pub fn new(classifier: Box<dyn StrictVersionClassifier>) -> Self {
        Self { classifier }
    }

    pub fn transform(
        &self,
        project: &ContentNode,
        tree: &ContentTree,
        stats: &ProjectStats,
        index_type: &str,
    ) -> IndexRow {
        self.transform_at(project, tree, stats, index_type, Utc::now())
    }

    /// Like [`transform`](Self::transform), scoring popularity as of `now`.
    pub fn transform_at(
        &self,
        project: &ContentNode,
        tree: &ContentTree,
        stats: &ProjectStats,
        index_type: &str,
        now: DateTime<Utc>,
    ) -> IndexRow {
        let category = tree
            .parent_of(project.id)
            .map(|p| p.name.trim().to_lowercase())
            .unwrap_or_default();

        let versions = join_versions(
            project
                .prop_str("compatibleVersions")
                .unwrap_or_default()
                .to_lowercase()
                .trim_matches(',')
                .split(','),
        );
        let compat_versions = join_versions(stats.compat_versions.iter().map(String::as_str));
        let minimum_strict = self
            .classifier
            .strict_package_versions(&stats.files)
            .iter()
            .map(|s| s.min_version.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let popularity = PopularityInputs {
            create_date: project.create_date,
            update_date: project.update_date,
            works_on_cloud: project.prop_bool("worksOnUaaS"),
            has_forum: tree.has_visible_children(project.id),
            has_source_link: project.prop_non_blank("sourceUrl").is_some(),
            open_for_collab: project.prop_bool("openForCollab"),
            downloads: stats.downloads,
            votes: stats.votes,
        }
        .score_at(now);

        let package_files = stats
            .files
            .iter()
            .filter(|f| f.file_type == FileType::Package)
            .count();

        let mut row = FlatFieldMap::new();
        row.insert(fields::BODY, project.prop_str("description").unwrap_or_default());
        row.insert(fields::NODE_NAME, project.name.as_str());
        row.insert(fields::CATEGORY_FOLDER, category);
        row.insert(fields::UPDATE_DATE, project.update_date.format(DATE_FORMAT).to_string());
        row.insert(fields::CREATE_DATE, project.create_date.format(DATE_FORMAT).to_string());
        row.insert(fields::NODE_TYPE_ALIAS, PROJECT_NODE_TYPE_ALIAS);
        row.insert(fields::URL, project.url.as_str());
        row.insert(fields::UNIQUE_ID, project.prop_str("packageGuid").unwrap_or_default());
        row.insert(fields::WORKS_ON_UAAS, flag(project.prop_bool("worksOnUaaS")));
        row.insert(fields::POPULARITY, popularity.to_string());
        row.insert(fields::KARMA, stats.votes.to_string());
        row.insert(fields::DOWNLOADS, stats.downloads.to_string());
        row.insert(fields::IMAGE, select_image(project, &stats.files));
        row.insert(fields::PACKAGE_FILES, package_files.to_string());
        row.insert(fields::PROJECT_LIVE, flag(project.prop_bool("projectLive")));
        row.insert(fields::APPROVED, flag(project.prop_bool("approved")));
        // Versions the project has files tagged against.
        row.insert(fields::VERSIONS, versions);
        // Versions the project has been explicitly declared compatible with.
        row.insert(fields::COMPAT_VERSIONS, compat_versions);
        row.insert(fields::MINIMUM_VERSION_STRICT, minimum_strict);

        tracing::debug!(
            project_id = project.id,
            name = %project.name,
            popularity,
            "transformed project"
        );

        IndexRow {
            node_id: project.id,
            index_type: index_type.to_string(),
            fields: row,
        }
    }
}

fn flag(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

/// Explicit screenshot path first, then the first screenshot file, else empty.
fn select_image(project: &ContentNode, files: &[ProjectFile]) -> String {
    project
        .prop_non_blank("defaultScreenshotPath")
        .or_else(|| {
            files
                .iter()
                .find(|f| f.file_type == FileType::Screenshot)
                .map(|f| f.path.clone())
        })
        .unwrap_or_default()
}

/// Legacy-parse each token, drop the unparsable ones, keep order.
fn join_versions<'a>(raw: impl Iterator<Item = &'a str>) -> String {
    raw.filter_map(version::parse_legacy)
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
