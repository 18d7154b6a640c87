//! SQLite-backed [`StatsProvider`].
//!
//! Aggregates the per-project totals the feed joins onto each record:
//!
//! | Map | Source table | Aggregate |
//! |-----|--------------|-----------|
//! | votes | `project_votes` | `SUM(points)` |
//! | downloads | `project_downloads` | `COUNT(*)` |
//! | files | `project_files` | current files only |
//! | compat versions | `project_compat_versions` | insertion order |

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::error::{IndexError, Result};
use crate::feed::StatsProvider;
use crate::models::{FileType, ProjectFile};

pub struct SqliteStatsProvider {
    pool: SqlitePool,
}

impl SqliteStatsProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn totals(&self, sql: &str) -> Result<HashMap<i64, i64>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(stats_error)?;
        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let project_id: i64 = row.try_get(0).map_err(stats_error)?;
            let total: i64 = row.try_get(1).map_err(stats_error)?;
            out.insert(project_id, total);
        }
        Ok(out)
    }
}

/// Query and decode failures alike surface as [`IndexError::Stats`].
fn stats_error(e: sqlx::Error) -> IndexError {
    IndexError::Stats(e.to_string())
}

#[async_trait]
impl StatsProvider for SqliteStatsProvider {
    async fn project_votes(&self) -> Result<HashMap<i64, i64>> {
        self.totals(
            "SELECT project_id, COALESCE(SUM(points), 0) FROM project_votes GROUP BY project_id",
        )
        .await
    }

    async fn project_downloads(&self) -> Result<HashMap<i64, i64>> {
        self.totals("SELECT project_id, COUNT(*) FROM project_downloads GROUP BY project_id")
            .await
    }

    async fn project_files(&self, project_ids: &[i64]) -> Result<HashMap<i64, Vec<ProjectFile>>> {
        let wanted: HashSet<i64> = project_ids.iter().copied().collect();
        let rows = sqlx::query(
            r#"
            SELECT id, project_id, file_type, path, min_version_strict
            FROM project_files
            WHERE is_current = 1
            ORDER BY project_id, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(stats_error)?;

        let mut out: HashMap<i64, Vec<ProjectFile>> = HashMap::new();
        for row in rows {
            let project_id: i64 = row.try_get("project_id").map_err(stats_error)?;
            if !wanted.contains(&project_id) {
                continue;
            }
            let file_type: String = row.try_get("file_type").map_err(stats_error)?;
            out.entry(project_id).or_default().push(ProjectFile {
                id: row.try_get("id").map_err(stats_error)?,
                project_id,
                file_type: FileType::from(file_type.as_str()),
                path: row.try_get("path").map_err(stats_error)?,
                min_version_strict: row.try_get("min_version_strict").map_err(stats_error)?,
            });
        }
        Ok(out)
    }

    async fn project_compat_versions(&self) -> Result<HashMap<i64, Vec<String>>> {
        let rows = sqlx::query(
            "SELECT project_id, version FROM project_compat_versions ORDER BY project_id, rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(stats_error)?;

        let mut out: HashMap<i64, Vec<String>> = HashMap::new();
        for row in rows {
            let project_id: i64 = row.try_get("project_id").map_err(stats_error)?;
            out.entry(project_id)
                .or_default()
                .push(row.try_get("version").map_err(stats_error)?);
        }
        Ok(out)
    }
}
