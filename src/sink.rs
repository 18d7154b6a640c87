//! Where shaped documents end up.
//!
//! [`SqliteIndexSink`] persists each document as:
//!
//! - one `index_documents` row carrying a SHA-256 hash of the shaped fields,
//! - one `index_fields` row per field occurrence, with its storage flags,
//! - one `index_fts` row per analyzed text field,
//! - one `index_num_versions` row per numeric field.
//!
//! A document whose hash is unchanged is skipped. Otherwise all of its rows
//! are replaced inside one transaction, so a reader never sees a document
//! half-written. After a full pass, [`IndexSink::retain`] drops every
//! document whose project was not in the feed.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::document::{FieldOptions, FieldValue, IndexField, Indexing, ShapedDocument};
use crate::error::{IndexError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Destination for shaped documents.
#[async_trait]
pub trait IndexSink: Send {
    /// Add or replace the document keyed by its node id.
    async fn write(&mut self, doc: &ShapedDocument) -> Result<WriteOutcome>;

    /// Remove every document whose node id is not in `live`.
    ///
    /// Returns the number of documents removed.
    async fn retain(&mut self, live: &[i64]) -> Result<usize>;

    /// Make everything written so far visible to searchers.
    async fn commit(&mut self) -> Result<()>;
}

/// Stable hash over everything that affects how a document is indexed.
pub fn content_hash(doc: &ShapedDocument) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc.index_type.as_bytes());
    for field in &doc.fields {
        hasher.update([0u8]);
        hasher.update(field.name.as_bytes());
        hasher.update([0u8]);
        match &field.value {
            FieldValue::Text(s) => {
                hasher.update(b"t");
                hasher.update(s.as_bytes());
            }
            FieldValue::I64(n) => {
                hasher.update(b"n");
                hasher.update(n.to_le_bytes());
            }
        }
        hasher.update([
            field.options.stored as u8,
            field.options.term_vectors as u8,
        ]);
        hasher.update(field.options.indexing.as_str().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub struct SqliteIndexSink {
    pool: SqlitePool,
    written: usize,
}

impl SqliteIndexSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, written: 0 }
    }

    /// Read a stored document back, fields in their original order.
    pub async fn fetch(&self, node_id: i64) -> Result<Option<ShapedDocument>> {
        let header = sqlx::query("SELECT index_type FROM index_documents WHERE node_id = ?")
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(header) = header else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT name, value_text, value_num, stored, indexing, term_vectors
            FROM index_fields
            WHERE node_id = ?
            ORDER BY ordinal
            "#,
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;

        let mut fields = Vec::with_capacity(rows.len());
        for row in rows {
            let indexing: String = row.try_get("indexing")?;
            let value = match row.try_get::<Option<i64>, _>("value_num")? {
                Some(n) => FieldValue::I64(n),
                None => {
                    let text: Option<String> = row.try_get("value_text")?;
                    FieldValue::Text(text.unwrap_or_default())
                }
            };
            fields.push(IndexField {
                name: row.try_get("name")?,
                value,
                options: FieldOptions {
                    stored: row.try_get("stored")?,
                    indexing: parse_indexing(&indexing)?,
                    term_vectors: row.try_get("term_vectors")?,
                },
            });
        }

        Ok(Some(ShapedDocument {
            node_id,
            index_type: header.try_get("index_type")?,
            fields,
        }))
    }
}

fn parse_indexing(s: &str) -> Result<Indexing> {
    match s {
        "analyzed" => Ok(Indexing::Analyzed),
        "not_analyzed_no_norms" => Ok(Indexing::NotAnalyzedNoNorms),
        "numeric" => Ok(Indexing::Numeric),
        other => Err(IndexError::Sink(format!("unknown indexing mode '{}'", other))),
    }
}

#[async_trait]
impl IndexSink for SqliteIndexSink {
    async fn write(&mut self, doc: &ShapedDocument) -> Result<WriteOutcome> {
        let hash = content_hash(doc);

        let existing: Option<String> =
            sqlx::query_scalar("SELECT content_hash FROM index_documents WHERE node_id = ?")
                .bind(doc.node_id)
                .fetch_optional(&self.pool)
                .await?;

        if existing.as_deref() == Some(hash.as_str()) {
            return Ok(WriteOutcome::Unchanged);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO index_documents (node_id, index_type, content_hash, indexed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(node_id) DO UPDATE SET
                index_type = excluded.index_type,
                content_hash = excluded.content_hash,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(doc.node_id)
        .bind(&doc.index_type)
        .bind(&hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM index_fields WHERE node_id = ?")
            .bind(doc.node_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM index_fts WHERE node_id = ?")
            .bind(doc.node_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM index_num_versions WHERE node_id = ?")
            .bind(doc.node_id)
            .execute(&mut *tx)
            .await?;

        for (ordinal, field) in doc.fields.iter().enumerate() {
            let (text, num) = match &field.value {
                FieldValue::Text(s) => (Some(s.as_str()), None),
                FieldValue::I64(n) => (None, Some(*n)),
            };

            sqlx::query(
                r#"
                INSERT INTO index_fields
                    (node_id, ordinal, name, value_text, value_num, stored, indexing, term_vectors)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(doc.node_id)
            .bind(ordinal as i64)
            .bind(&field.name)
            .bind(text)
            .bind(num)
            .bind(field.options.stored)
            .bind(field.options.indexing.as_str())
            .bind(field.options.term_vectors)
            .execute(&mut *tx)
            .await?;

            match (field.options.indexing, &field.value) {
                (Indexing::Analyzed, FieldValue::Text(s)) => {
                    sqlx::query("INSERT INTO index_fts (node_id, name, value) VALUES (?, ?, ?)")
                        .bind(doc.node_id)
                        .bind(&field.name)
                        .bind(s)
                        .execute(&mut *tx)
                        .await?;
                }
                (Indexing::Numeric, FieldValue::I64(n)) => {
                    sqlx::query(
                        "INSERT INTO index_num_versions (node_id, name, value) VALUES (?, ?, ?)",
                    )
                    .bind(doc.node_id)
                    .bind(&field.name)
                    .bind(n)
                    .execute(&mut *tx)
                    .await?;
                }
                _ => {}
            }
        }

        tx.commit().await?;
        self.written += 1;

        Ok(if existing.is_some() {
            WriteOutcome::Updated
        } else {
            WriteOutcome::Inserted
        })
    }

    async fn retain(&mut self, live: &[i64]) -> Result<usize> {
        let live: HashSet<i64> = live.iter().copied().collect();
        let stored: Vec<i64> = sqlx::query_scalar("SELECT node_id FROM index_documents")
            .fetch_all(&self.pool)
            .await?;
        let stale: Vec<i64> = stored.into_iter().filter(|id| !live.contains(id)).collect();
        if stale.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for node_id in &stale {
            for sql in [
                "DELETE FROM index_fields WHERE node_id = ?",
                "DELETE FROM index_fts WHERE node_id = ?",
                "DELETE FROM index_num_versions WHERE node_id = ?",
                "DELETE FROM index_documents WHERE node_id = ?",
            ] {
                sqlx::query(sql).bind(node_id).execute(&mut *tx).await?;
            }
            tracing::debug!(node_id = *node_id, "removed document no longer in feed");
        }
        tx.commit().await?;

        self.written += stale.len();
        Ok(stale.len())
    }

    async fn commit(&mut self) -> Result<()> {
        if self.written == 0 {
            return Ok(());
        }
        sqlx::query("INSERT INTO index_fts(index_fts) VALUES('optimize')")
            .execute(&self.pool)
            .await?;
        tracing::debug!(documents = self.written, "index committed");
        self.written = 0;
        Ok(())
    }
}

/// Keeps documents in memory. Used by tests and previews.
#[derive(Debug, Default)]
pub struct MemoryIndexSink {
    pub documents: BTreeMap<i64, ShapedDocument>,
    pub commits: usize,
}

impl MemoryIndexSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexSink for MemoryIndexSink {
    async fn write(&mut self, doc: &ShapedDocument) -> Result<WriteOutcome> {
        let outcome = match self.documents.get(&doc.node_id) {
            Some(existing) if existing == doc => return Ok(WriteOutcome::Unchanged),
            Some(_) => WriteOutcome::Updated,
            None => WriteOutcome::Inserted,
        };
        self.documents.insert(doc.node_id, doc.clone());
        Ok(outcome)
    }

    async fn retain(&mut self, live: &[i64]) -> Result<usize> {
        let live: HashSet<i64> = live.iter().copied().collect();
        let before = self.documents.len();
        self.documents.retain(|id, _| live.contains(id));
        Ok(before - self.documents.len())
    }

    async fn commit(&mut self) -> Result<()> {
        self.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::document::fields;
    use crate::migrate;

    // Query-side lookups, only needed to check what a write left behind.
    impl SqliteIndexSink {
        /// Node ids whose documents carry a `num_version` in `[min, max]`.
        async fn nodes_with_version_between(&self, min: i64, max: i64) -> Result<Vec<i64>> {
            let ids = sqlx::query_scalar(
                r#"
                SELECT DISTINCT node_id FROM index_num_versions
                WHERE value BETWEEN ? AND ?
                ORDER BY node_id
                "#,
            )
            .bind(min)
            .bind(max)
            .fetch_all(&self.pool)
            .await?;
            Ok(ids)
        }

        /// Node ids matching an FTS5 query over analyzed text.
        async fn search_text(&self, query: &str) -> Result<Vec<i64>> {
            let ids = sqlx::query_scalar(
                "SELECT DISTINCT CAST(node_id AS INTEGER) FROM index_fts WHERE index_fts MATCH ? ORDER BY 1",
            )
            .bind(query)
            .fetch_all(&self.pool)
            .await?;
            Ok(ids)
        }
    }

    fn doc(node_id: i64, body: &str, versions: &[i64]) -> ShapedDocument {
        let mut d = ShapedDocument {
            node_id,
            index_type: "project".to_string(),
            fields: vec![
                IndexField::text(fields::NODE_NAME, "Uploader", FieldOptions::SOURCE),
                IndexField::text(fields::BODY, body, FieldOptions::FULL_TEXT),
                IndexField::text("__body", format!("<p>{}</p>", body), FieldOptions::KEYWORD),
                IndexField::text(fields::VERSIONS, "7.5.0", FieldOptions::KEYWORD),
            ],
        };
        for v in versions {
            d.add(IndexField::numeric(fields::NUM_VERSION, *v));
        }
        d
    }

    async fn sink() -> (tempfile::TempDir, SqliteIndexSink) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::connect_path(&dir.path().join("index.sqlite")).await.unwrap();
        migrate::apply(&pool).await.unwrap();
        (dir, SqliteIndexSink::new(pool))
    }

    #[test]
    fn test_hash_depends_on_options() {
        let a = doc(1, "fast uploader", &[7_005_000]);
        let mut b = a.clone();
        assert_eq!(content_hash(&a), content_hash(&b));
        b.fields[3].options = FieldOptions::SOURCE;
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[tokio::test]
    async fn test_write_then_unchanged_then_updated() {
        let (_dir, mut sink) = sink().await;
        let first = doc(100, "fast uploader", &[7_005_000]);

        assert_eq!(sink.write(&first).await.unwrap(), WriteOutcome::Inserted);
        assert_eq!(sink.write(&first).await.unwrap(), WriteOutcome::Unchanged);

        let second = doc(100, "faster uploader", &[7_005_000, 8_000_000]);
        assert_eq!(sink.write(&second).await.unwrap(), WriteOutcome::Updated);
        sink.commit().await.unwrap();

        let stored = sink.fetch(100).await.unwrap().unwrap();
        assert_eq!(stored, second);
    }

    #[tokio::test]
    async fn test_replace_drops_old_rows() {
        let (_dir, mut sink) = sink().await;
        sink.write(&doc(100, "alpha words", &[4_011_000])).await.unwrap();
        sink.write(&doc(100, "beta words", &[8_000_000])).await.unwrap();
        sink.commit().await.unwrap();

        assert!(sink.search_text("alpha").await.unwrap().is_empty());
        assert_eq!(sink.search_text("beta").await.unwrap(), vec![100]);
        assert!(sink
            .nodes_with_version_between(4_000_000, 4_999_999)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_version_range_query() {
        let (_dir, mut sink) = sink().await;
        sink.write(&doc(1, "one", &[4_011_000])).await.unwrap();
        sink.write(&doc(2, "two", &[7_005_000, 8_000_000])).await.unwrap();
        sink.write(&doc(3, "three", &[])).await.unwrap();
        sink.commit().await.unwrap();

        let ids = sink
            .nodes_with_version_between(7_000_000, 7_999_999)
            .await
            .unwrap();
        assert_eq!(ids, vec![2]);
        let ids = sink.nodes_with_version_between(0, 999_999_999).await.unwrap();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_keyword_fields_not_searchable_as_text() {
        let (_dir, mut sink) = sink().await;
        sink.write(&doc(5, "plain", &[])).await.unwrap();
        sink.commit().await.unwrap();
        assert!(sink.search_text("\"p\"").await.unwrap().is_empty());
        assert_eq!(sink.search_text("uploader").await.unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn test_retain_drops_documents_not_live() {
        let (_dir, mut sink) = sink().await;
        sink.write(&doc(1, "kept words", &[7_005_000])).await.unwrap();
        sink.write(&doc(2, "dropped words", &[8_000_000])).await.unwrap();
        sink.commit().await.unwrap();

        assert_eq!(sink.retain(&[1, 3]).await.unwrap(), 1);
        sink.commit().await.unwrap();

        assert!(sink.fetch(1).await.unwrap().is_some());
        assert!(sink.fetch(2).await.unwrap().is_none());
        assert!(sink.search_text("dropped").await.unwrap().is_empty());
        assert!(sink
            .nodes_with_version_between(8_000_000, 8_999_999)
            .await
            .unwrap()
            .is_empty());
        let fields: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_fields WHERE node_id = 2")
            .fetch_one(&sink.pool)
            .await
            .unwrap();
        assert_eq!(fields, 0);

        assert_eq!(sink.retain(&[1]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_missing() {
        let (_dir, sink) = sink().await;
        assert!(sink.fetch(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_sink_outcomes() {
        let mut sink = MemoryIndexSink::new();
        let d = doc(9, "x", &[]);
        assert_eq!(sink.write(&d).await.unwrap(), WriteOutcome::Inserted);
        assert_eq!(sink.write(&d).await.unwrap(), WriteOutcome::Unchanged);
        assert_eq!(
            sink.write(&doc(9, "y", &[])).await.unwrap(),
            WriteOutcome::Updated
        );
        sink.commit().await.unwrap();
        assert_eq!(sink.commits, 1);
        assert_eq!(sink.documents.len(), 1);

        sink.write(&doc(10, "z", &[])).await.unwrap();
        assert_eq!(sink.retain(&[10]).await.unwrap(), 1);
        assert_eq!(sink.documents.keys().copied().collect::<Vec<_>>(), vec![10]);
    }
}
