//! Schema for the index sink and the local stats tables.
//!
//! The stats tables mirror what the external statistics store exposes, so a
//! single SQLite file can serve both roles during local runs and tests.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Stats store
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_votes (
            project_id INTEGER NOT NULL,
            member_id INTEGER NOT NULL,
            points INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_downloads (
            project_id INTEGER NOT NULL,
            file_id INTEGER NOT NULL,
            downloaded_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_files (
            id INTEGER PRIMARY KEY,
            project_id INTEGER NOT NULL,
            file_type TEXT NOT NULL,
            path TEXT NOT NULL,
            min_version_strict TEXT,
            is_current INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_compat_versions (
            project_id INTEGER NOT NULL,
            version TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Index sink
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_documents (
            node_id INTEGER PRIMARY KEY,
            index_type TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_fields (
            node_id INTEGER NOT NULL,
            ordinal INTEGER NOT NULL,
            name TEXT NOT NULL,
            value_text TEXT,
            value_num INTEGER,
            stored INTEGER NOT NULL,
            indexing TEXT NOT NULL,
            term_vectors INTEGER NOT NULL,
            PRIMARY KEY (node_id, ordinal),
            FOREIGN KEY (node_id) REFERENCES index_documents(node_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_num_versions (
            node_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            value INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='index_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE index_fts USING fts5(
                node_id UNINDEXED,
                name UNINDEXED,
                value
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_index_fields_name ON index_fields(name)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_index_num_versions_value ON index_num_versions(name, value)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_project_files_project ON project_files(project_id)")
        .execute(pool)
        .await?;

    Ok(())
}
