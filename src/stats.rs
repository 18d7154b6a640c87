//! Index statistics.
//!
//! Summarises what the last passes left in the index: document and field
//! counts, how many documents carry at least one range-encoded version, and
//! a per-index-type breakdown. Used by `pkgidx stats`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTypeStats {
    pub index_type: String,
    pub doc_count: i64,
    pub last_indexed: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub documents: i64,
    pub fields: i64,
    pub versioned_documents: i64,
    pub num_versions: i64,
    pub by_type: Vec<IndexTypeStats>,
}

pub async fn collect(pool: &SqlitePool) -> Result<IndexStats> {
    let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_documents")
        .fetch_one(pool)
        .await?;

    let fields: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_fields")
        .fetch_one(pool)
        .await?;

    let versioned_documents: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT node_id) FROM index_num_versions")
            .fetch_one(pool)
            .await?;

    let num_versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_num_versions")
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(
        r#"
        SELECT index_type, COUNT(*) AS doc_count, MAX(indexed_at) AS last_indexed
        FROM index_documents
        GROUP BY index_type
        ORDER BY doc_count DESC, index_type
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_type = rows
        .iter()
        .map(|row| IndexTypeStats {
            index_type: row.get("index_type"),
            doc_count: row.get("doc_count"),
            last_indexed: row.get("last_indexed"),
        })
        .collect();

    Ok(IndexStats {
        documents,
        fields,
        versioned_documents,
        num_versions,
        by_type,
    })
}

/// Run the stats command: query the index and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Package Index Stats");
    println!("===================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", stats.documents);
    println!("  Fields:      {}", stats.fields);
    println!(
        "  Versioned:   {} / {} ({}%)",
        stats.versioned_documents,
        stats.documents,
        if stats.documents > 0 {
            (stats.versioned_documents * 100) / stats.documents
        } else {
            0
        }
    );
    println!("  num_version: {}", stats.num_versions);

    if !stats.by_type.is_empty() {
        println!();
        println!("  By index type:");
        println!("  {:<24} {:>6}   {}", "TYPE", "DOCS", "LAST INDEXED");
        println!("  {}", "-".repeat(50));

        for t in &stats.by_type {
            let indexed = match t.last_indexed {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!("  {:<24} {:>6}   {}", t.index_type, t.doc_count, indexed);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 || delta >= 86400 * 30 {
        return chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| ts.to_string());
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        format!("{} min ago", delta / 60)
    } else if delta < 86400 {
        format!("{} h ago", delta / 3600)
    } else {
        format!("{} d ago", delta / 86400)
    }
}
