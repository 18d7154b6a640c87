//! One full indexing pass.
//!
//! ```text
//! ContentSession::acquire ──▶ IndexFeed::open ──▶ rows()
//!     ──▶ resolve_category ──▶ ShapedDocument::from_row ──▶ shape
//!     ──▶ IndexSink::write ──▶ IndexSink::commit
//! ```
//!
//! The content tree is the one hard precondition: if it cannot be loaded the
//! pass fails before anything is written. Everything after that is handled
//! per record.
//!
//! A pass that covers the whole feed (no `limit` cutting it short, no `root`
//! narrowing it) also removes documents for projects that are no longer
//! live, so the index holds exactly what the feed reports.

use anyhow::{Context, Result as AnyResult};

use crate::category::resolve_category;
use crate::config::Config;
use crate::content::{ContentSession, JsonContentStore};
use crate::document::{IndexRow, ShapedDocument};
use crate::error::Result;
use crate::feed::{IndexFeed, StatsProvider};
use crate::project_stats::SqliteStatsProvider;
use crate::shaper;
use crate::sink::{IndexSink, SqliteIndexSink, WriteOutcome};
use crate::transform::RecordTransformer;
use crate::{db, migrate};

#[derive(Debug, Clone)]
pub struct PassOptions {
    /// Tag recorded on every document.
    pub index_type: String,
    /// Only process the first `limit` projects.
    pub limit: Option<usize>,
    /// Transform and shape, but write nothing.
    pub dry_run: bool,
    /// Only index projects below this node.
    pub root: Option<i64>,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            index_type: "project".to_string(),
            limit: None,
            dry_run: false,
            root: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Documents dropped because their project left the feed.
    pub removed: usize,
    pub categories_backfilled: usize,
    /// Version tokens that did not make it into `num_version`.
    pub skipped_versions: usize,
}

/// Run a pass with the default transformer.
pub async fn run_pass(
    session: &ContentSession,
    stats: &dyn StatsProvider,
    sink: &mut dyn IndexSink,
    options: &PassOptions,
) -> Result<PassSummary> {
    run_pass_with(&RecordTransformer::default(), session, stats, sink, options).await
}

pub async fn run_pass_with(
    transformer: &RecordTransformer,
    session: &ContentSession,
    stats: &dyn StatsProvider,
    sink: &mut dyn IndexSink,
    options: &PassOptions,
) -> Result<PassSummary> {
    let tree = session.acquire().await?;
    let feed = IndexFeed::open(tree, stats, options.root).await?;
    let limit = options.limit.unwrap_or(usize::MAX);

    tracing::info!(
        projects = feed.len(),
        index_type = %options.index_type,
        dry_run = options.dry_run,
        "starting index pass"
    );

    let mut summary = PassSummary::default();
    let mut seen = Vec::with_capacity(feed.len());
    for mut row in feed.rows(transformer, &options.index_type).take(limit) {
        summary.fetched += 1;
        seen.push(row.node_id);
        if resolve_category(&mut row, feed.tree()) {
            summary.categories_backfilled += 1;
        }

        let (doc, report) = shaper::shape_with_report(ShapedDocument::from_row(&row));
        summary.skipped_versions += report.unparsable + report.out_of_range;

        if options.dry_run {
            continue;
        }

        match sink.write(&doc).await? {
            WriteOutcome::Inserted => summary.inserted += 1,
            WriteOutcome::Updated => summary.updated += 1,
            WriteOutcome::Unchanged => summary.unchanged += 1,
        }
    }

    if !options.dry_run {
        if options.root.is_none() && summary.fetched == feed.len() {
            summary.removed = sink.retain(&seen).await?;
        }
        sink.commit().await?;
    }

    tracing::info!(
        fetched = summary.fetched,
        inserted = summary.inserted,
        updated = summary.updated,
        unchanged = summary.unchanged,
        removed = summary.removed,
        "index pass finished"
    );
    Ok(summary)
}

/// The flat rows a pass would produce, after category backfill.
pub async fn preview_rows(
    session: &ContentSession,
    stats: &dyn StatsProvider,
    options: &PassOptions,
) -> Result<Vec<IndexRow>> {
    let tree = session.acquire().await?;
    let feed = IndexFeed::open(tree, stats, options.root).await?;
    let transformer = RecordTransformer::default();
    let limit = options.limit.unwrap_or(usize::MAX);

    Ok(feed
        .rows(&transformer, &options.index_type)
        .take(limit)
        .map(|mut row| {
            resolve_category(&mut row, feed.tree());
            row
        })
        .collect())
}

/// `pkgidx index`: one pass from the configured snapshot into the SQLite index.
pub async fn run_index(config: &Config, dry_run: bool, limit: Option<usize>) -> AnyResult<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let session = ContentSession::new(Box::new(JsonContentStore::new(&config.content.snapshot)));
    let stats = SqliteStatsProvider::new(pool.clone());
    let options = PassOptions {
        index_type: config.index.index_type.clone(),
        limit,
        dry_run,
        root: config.content.root_id,
    };

    if dry_run {
        let rows = preview_rows(&session, &stats, &options)
            .await
            .context("index pass failed")?;
        println!("index {} (dry-run)", options.index_type);
        for row in &rows {
            println!("{}", serde_json::to_string(row)?);
        }
        println!("  fetched: {}", rows.len());
        println!("ok");
        pool.close().await;
        return Ok(());
    }

    let mut sink = SqliteIndexSink::new(pool.clone());
    let summary = run_pass(&session, &stats, &mut sink, &options)
        .await
        .context("index pass failed")?;

    println!("index {}", options.index_type);
    println!("  fetched: {}", summary.fetched);
    println!("  inserted: {}", summary.inserted);
    println!("  updated: {}", summary.updated);
    println!("  unchanged: {}", summary.unchanged);
    println!("  removed: {}", summary.removed);
    println!("  categories backfilled: {}", summary.categories_backfilled);
    println!("  skipped version tokens: {}", summary.skipped_versions);
    println!("ok");

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::tests::{node, with_props};
    use crate::content::{ContentStore, ContentTree};
    use crate::document::fields;
    use crate::error::IndexError;
    use crate::feed::StatsSnapshot;
    use crate::models::{FileType, ProjectFile};
    use crate::sink::MemoryIndexSink;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    fn tree() -> ContentTree {
        ContentTree::new(vec![
            node(1, None, "Projects", "Projects"),
            node(10, Some(1), "Uploaders", "ProjectGroup"),
            with_props(
                node(100, Some(10), "Fast Uploader", "Project"),
                json!({
                    "projectLive": true,
                    "description": "<p>Uploads <b>fast</b></p>",
                    "compatibleVersions": "v7,v8",
                }),
            ),
            with_props(
                node(101, Some(10), "Other", "Project"),
                json!({"projectLive": true, "compatibleVersions": "nonsense"}),
            ),
            with_props(node(102, Some(10), "Draft", "Project"), json!({"projectLive": false})),
        ])
    }

    fn stats() -> StatsSnapshot {
        StatsSnapshot {
            votes: HashMap::from([(100, 3)]),
            downloads: HashMap::from([(100, 20)]),
            files: HashMap::from([(
                100,
                vec![ProjectFile {
                    id: 1,
                    project_id: 100,
                    file_type: FileType::Package,
                    path: "/media/up.zip".to_string(),
                    min_version_strict: Some("7.5.0".to_string()),
                }],
            )]),
            compat_versions: HashMap::from([(100, vec!["8.1.0".to_string()])]),
        }
    }

    struct Offline;

    #[async_trait]
    impl ContentStore for Offline {
        async fn load_tree(&self) -> Result<ContentTree> {
            Err(IndexError::ContentUnavailable("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_pass_writes_shaped_documents() {
        let session = ContentSession::new(Box::new(tree()));
        let mut sink = MemoryIndexSink::new();
        let summary = run_pass(&session, &stats(), &mut sink, &PassOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.inserted, 2);
        assert_eq!(sink.commits, 1);

        let doc = &sink.documents[&100];
        assert_eq!(doc.index_type, "project");
        assert_eq!(doc.texts(fields::VERSIONS), vec!["7.0.0", "8.0.0"]);
        assert_eq!(doc.texts(fields::MINIMUM_VERSION_STRICT), vec!["7.5.0"]);
        assert_eq!(
            doc.numbers(fields::NUM_VERSION),
            vec![7_000_000, 8_000_000, 7_005_000, 8_001_000]
        );
        assert_eq!(doc.texts(fields::BODY), vec!["Uploads fast"]);
        assert_eq!(doc.texts(fields::CATEGORY_FOLDER), vec!["uploaders"]);
    }

    #[tokio::test]
    async fn test_second_pass_inserts_nothing() {
        let session = ContentSession::new(Box::new(tree()));
        let mut sink = MemoryIndexSink::new();
        let options = PassOptions::default();
        let transformer = RecordTransformer::default();

        run_pass_with(&transformer, &session, &stats(), &mut sink, &options)
            .await
            .unwrap();
        let before = sink.documents.clone();
        let second = run_pass_with(&transformer, &session, &stats(), &mut sink, &options)
            .await
            .unwrap();

        // popularity is time-based, so a document may legitimately be rewritten
        assert_eq!(second.fetched, 2);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.removed, 0);
        assert_eq!(second.updated + second.unchanged, 2);
        assert_eq!(sink.documents.keys().collect::<Vec<_>>(), before.keys().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_unpublished_project_is_removed() {
        let mut sink = MemoryIndexSink::new();
        let options = PassOptions::default();

        let first = ContentSession::new(Box::new(tree()));
        run_pass(&first, &stats(), &mut sink, &options).await.unwrap();
        assert_eq!(sink.documents.keys().copied().collect::<Vec<_>>(), vec![100, 101]);

        let mut nodes: Vec<_> = [1, 10, 100, 101, 102]
            .iter()
            .filter_map(|id| tree().get(*id).cloned())
            .collect();
        nodes[3]
            .properties
            .insert("projectLive".to_string(), json!(false));
        let second = ContentSession::new(Box::new(ContentTree::new(nodes)));
        let summary = run_pass(&second, &stats(), &mut sink, &options).await.unwrap();

        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(sink.documents.keys().copied().collect::<Vec<_>>(), vec![100]);
    }

    #[tokio::test]
    async fn test_partial_passes_keep_other_documents() {
        let session = ContentSession::new(Box::new(tree()));
        let mut sink = MemoryIndexSink::new();
        run_pass(&session, &stats(), &mut sink, &PassOptions::default())
            .await
            .unwrap();

        // an empty tree under a root, a limit and a dry run never remove anything
        let empty = ContentSession::new(Box::new(ContentTree::new(vec![node(
            1, None, "Projects", "Projects",
        )])));
        for options in [
            PassOptions {
                root: Some(1),
                ..PassOptions::default()
            },
            PassOptions {
                dry_run: true,
                ..PassOptions::default()
            },
        ] {
            let summary = run_pass(&empty, &stats(), &mut sink, &options).await.unwrap();
            assert_eq!(summary.removed, 0);
            assert_eq!(sink.documents.len(), 2);
        }

        let limited = PassOptions {
            limit: Some(1),
            ..PassOptions::default()
        };
        let summary = run_pass(&session, &stats(), &mut sink, &limited).await.unwrap();
        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.removed, 0);
        assert_eq!(sink.documents.len(), 2);
    }

    #[tokio::test]
    async fn test_limit_and_dry_run() {
        let session = ContentSession::new(Box::new(tree()));
        let mut sink = MemoryIndexSink::new();
        let options = PassOptions {
            limit: Some(1),
            dry_run: true,
            ..PassOptions::default()
        };
        let summary = run_pass(&session, &stats(), &mut sink, &options)
            .await
            .unwrap();
        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.inserted, 0);
        assert!(sink.documents.is_empty());
        assert_eq!(sink.commits, 0);
    }

    #[tokio::test]
    async fn test_unavailable_content_writes_nothing() {
        let session = ContentSession::new(Box::new(Offline));
        let mut sink = MemoryIndexSink::new();
        let err = run_pass(&session, &stats(), &mut sink, &PassOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::ContentUnavailable(_)));
        assert!(sink.documents.is_empty());
        assert_eq!(sink.commits, 0);
    }

    #[tokio::test]
    async fn test_preview_rows_are_flat() {
        let session = ContentSession::new(Box::new(tree()));
        let rows = preview_rows(&session, &stats(), &PassOptions::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields.get(fields::VERSIONS), Some("7.0.0,8.0.0"));
        assert_eq!(rows[1].fields.get(fields::VERSIONS), Some(""));
    }
}
