//! Embedded vector store backed by rusqlite + sqlite-vec.
//!
//! Documents live in a regular `documents` table; embeddings live in a
//! `documents_vec` vec0 virtual table keyed by the same id. Queries run a KNN
//! `MATCH` against the vec0 table and join back for the document fields.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;

use super::{embedding_to_bytes, metadata_matches, DocumentRecord, VectorStore};
use crate::config::StoreConfig;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// The default vector store: an embedded sqlite database with vec0 KNN.
pub struct SqliteStore {
    conn: Connection,
    collection: String,
    embedding_name: String,
    dimension: usize,
}

impl SqliteStore {
    /// Open (or create) the store at the configured path, with the extension
    /// loaded and schema initialized.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = crate::config::expand_tilde(&config.db_path);
        Self::open_at(&path, config)
    }

    /// Open at an explicit path. `:memory:` gives an ephemeral store.
    pub fn open_at(path: &Path, config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create directory {}", parent.display())
                })?;
            }
        }

        load_sqlite_vec();

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        init_schema(&conn, config.dimension).context("failed to initialize schema")?;

        tracing::info!(
            path = %path.display(),
            collection = %config.collection,
            "vector store ready"
        );

        Ok(Self {
            conn,
            collection: config.collection.clone(),
            embedding_name: config.embedding.clone(),
            dimension: config.dimension,
        })
    }
}

/// vec0 virtual table DDL takes the dimension inline, so the schema is built
/// per store instead of from a fixed constant.
fn init_schema(conn: &Connection, dimension: usize) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    document TEXT,
    uri TEXT,
    metadata TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
"#,
    )?;

    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS documents_vec USING vec0(
    id TEXT PRIMARY KEY,
    embedding FLOAT[{dimension}]
);"
    ))?;

    Ok(())
}

impl VectorStore for SqliteStore {
    fn is_valid(&self) -> bool {
        self.conn
            .query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
            .is_ok()
    }

    fn embedding_name(&self) -> &str {
        &self.embedding_name
    }

    fn count(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn learn_document(&mut self, doc: &DocumentRecord) -> Result<()> {
        let embedding = doc
            .embedding
            .as_ref()
            .context("document embedding missing")?;
        anyhow::ensure!(
            embedding.len() == self.dimension,
            "embedding has {} dimensions, store expects {}",
            embedding.len(),
            self.dimension
        );

        let now = chrono::Utc::now().to_rfc3339();
        let metadata_json = doc
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // Upsert as delete + insert; vec0 tables do not support OR REPLACE.
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM documents WHERE id = ?1", params![doc.id])?;
        tx.execute("DELETE FROM documents_vec WHERE id = ?1", params![doc.id])?;
        tx.execute(
            "INSERT INTO documents (id, collection, document, uri, metadata, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                doc.id,
                self.collection,
                doc.document,
                doc.uri,
                metadata_json,
                now
            ],
        )?;
        tx.execute(
            "INSERT INTO documents_vec (id, embedding) VALUES (?1, ?2)",
            params![doc.id, embedding_to_bytes(embedding)],
        )?;
        tx.commit()?;

        tracing::debug!(id = %doc.id, "document stored");
        Ok(())
    }

    fn query_documents(
        &self,
        max_records: usize,
        embedding: &[f32],
        filter: Option<&serde_json::Value>,
    ) -> Result<Vec<DocumentRecord>> {
        anyhow::ensure!(
            embedding.len() == self.dimension,
            "embedding has {} dimensions, store expects {}",
            embedding.len(),
            self.dimension
        );

        // KNN first, then collection/metadata filtering; over-fetch candidates
        // to compensate for rows the filter drops. Saturate and cap so a
        // wire-supplied max_records can neither overflow nor inflate k.
        let candidate_limit = max_records.max(1).saturating_mul(4).min(4096) as i64;
        let mut stmt = self.conn.prepare(
            "SELECT id, distance FROM documents_vec WHERE embedding MATCH ?1 AND k = ?2 \
             ORDER BY distance",
        )?;
        let candidates: Vec<String> = stmt
            .query_map(
                params![embedding_to_bytes(embedding), candidate_limit],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut results = Vec::new();
        for id in candidates {
            if results.len() >= max_records {
                break;
            }
            let row: Option<(Option<String>, Option<String>, Option<String>)> = self
                .conn
                .query_row(
                    "SELECT document, uri, metadata FROM documents \
                     WHERE id = ?1 AND collection = ?2",
                    params![id, self.collection],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let Some((document, uri, metadata_json)) = row else {
                continue;
            };
            let metadata = metadata_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("stored metadata is not valid JSON")?;
            if !metadata_matches(filter, metadata.as_ref()) {
                continue;
            }

            results.push(DocumentRecord {
                id,
                document,
                embedding: None,
                uri,
                metadata,
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_store() -> SqliteStore {
        let config = StoreConfig {
            dimension: 4,
            ..StoreConfig::default()
        };
        SqliteStore::open_at(Path::new(":memory:"), &config).unwrap()
    }

    fn doc(id: &str, text: &str, embedding: Vec<f32>, metadata: Option<serde_json::Value>) -> DocumentRecord {
        DocumentRecord {
            id: id.into(),
            document: Some(text.into()),
            embedding: Some(embedding),
            uri: None,
            metadata,
        }
    }

    #[test]
    fn store_probe_is_valid() {
        let store = test_store();
        assert!(store.is_valid());
        assert_eq!(store.embedding_name(), "default");
    }

    #[test]
    fn learn_and_count() {
        let mut store = test_store();
        assert_eq!(store.count().unwrap(), 0);
        store
            .learn_document(&doc("a", "alpha", vec![1.0, 0.0, 0.0, 0.0], None))
            .unwrap();
        store
            .learn_document(&doc("b", "beta", vec![0.0, 1.0, 0.0, 0.0], None))
            .unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn learn_is_an_upsert() {
        let mut store = test_store();
        store
            .learn_document(&doc("a", "first", vec![1.0, 0.0, 0.0, 0.0], None))
            .unwrap();
        store
            .learn_document(&doc("a", "second", vec![0.0, 1.0, 0.0, 0.0], None))
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);

        let results = store
            .query_documents(1, &[0.0, 1.0, 0.0, 0.0], None)
            .unwrap();
        assert_eq!(results[0].document.as_deref(), Some("second"));
    }

    #[test]
    fn query_orders_by_distance() {
        let mut store = test_store();
        store
            .learn_document(&doc("near", "near", vec![1.0, 0.0, 0.0, 0.0], None))
            .unwrap();
        store
            .learn_document(&doc("far", "far", vec![0.0, 0.0, 0.0, 1.0], None))
            .unwrap();

        let results = store
            .query_documents(2, &[0.9, 0.1, 0.0, 0.0], None)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "near");
        assert!(results[0].embedding.is_none());
    }

    #[test]
    fn query_respects_metadata_filter() {
        let mut store = test_store();
        store
            .learn_document(&doc(
                "en",
                "hello",
                vec![1.0, 0.0, 0.0, 0.0],
                Some(json!({"lang": "en"})),
            ))
            .unwrap();
        store
            .learn_document(&doc(
                "de",
                "hallo",
                vec![1.0, 0.1, 0.0, 0.0],
                Some(json!({"lang": "de"})),
            ))
            .unwrap();

        let results = store
            .query_documents(5, &[1.0, 0.0, 0.0, 0.0], Some(&json!({"lang": "de"})))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "de");
        assert_eq!(results[0].metadata, Some(json!({"lang": "de"})));
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let mut store = test_store();
        let err = store
            .learn_document(&doc("a", "alpha", vec![1.0, 0.0], None))
            .unwrap_err();
        assert!(err.to_string().contains("dimensions"));

        assert!(store.query_documents(1, &[1.0], None).is_err());
    }

    #[test]
    fn huge_max_records_is_handled() {
        let mut store = test_store();
        store
            .learn_document(&doc("a", "alpha", vec![1.0, 0.0, 0.0, 0.0], None))
            .unwrap();

        let results = store
            .query_documents(usize::MAX, &[1.0, 0.0, 0.0, 0.0], None)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn missing_embedding_is_rejected() {
        let mut store = test_store();
        let record = DocumentRecord {
            id: "a".into(),
            document: Some("alpha".into()),
            embedding: None,
            uri: None,
            metadata: None,
        };
        assert!(store.learn_document(&record).is_err());
    }

    #[test]
    fn open_on_disk_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            db_path: dir
                .path()
                .join("nested/documents.db")
                .to_string_lossy()
                .into_owned(),
            dimension: 4,
            ..StoreConfig::default()
        };
        let store = SqliteStore::open(&config).unwrap();
        assert!(store.is_valid());
    }
}
