//! Vector storage backends.
//!
//! Defines the [`VectorStore`] capability contract and two implementations:
//! an embedded sqlite-vec backend ([`sqlite`], the default) and a brute-force
//! in-memory backend ([`memory`]) for tests and development. At most one
//! store handle exists per process; it is created once at startup via
//! [`create_store`] and never replaced.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;

/// A document flowing through the storage layer. Per-call and transient:
/// the core never persists this type itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Capability contract for vector stores.
///
/// Synchronous by design, like the providers; any timeout belongs to the
/// backend's own transport. Query results carry id, document, uri, and
/// metadata — embeddings are stripped.
pub trait VectorStore: Send {
    /// Connection probe. Run once right after construction.
    fn is_valid(&self) -> bool;

    /// The model id used to synthesize embeddings for callers that supply
    /// none. Defaults to the literal `"default"` when unconfigured.
    fn embedding_name(&self) -> &str;

    /// Number of documents in the selected collection.
    fn count(&self) -> Result<u64>;

    /// Upsert a document by id. The record arrives with a resolved embedding.
    fn learn_document(&mut self, doc: &DocumentRecord) -> Result<()>;

    /// Nearest-neighbor query with an optional metadata equality filter.
    fn query_documents(
        &self,
        max_records: usize,
        embedding: &[f32],
        filter: Option<&serde_json::Value>,
    ) -> Result<Vec<DocumentRecord>>;
}

/// The finite set of supported store kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Embedded sqlite-vec backend.
    Default,
    /// In-memory brute-force backend.
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" | "sqlite" => Ok(Self::Default),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("unsupported store backend: {s}")),
        }
    }
}

/// Create a vector store from config.
pub fn create_store(config: &StoreConfig) -> Result<Box<dyn VectorStore>> {
    let kind: StoreKind = config
        .backend
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    match kind {
        StoreKind::Default => {
            let store = sqlite::SqliteStore::open(config)?;
            Ok(Box::new(store))
        }
        StoreKind::Memory => Ok(Box::new(memory::MemoryStore::new(&config.embedding))),
    }
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub(crate) fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}

/// Equality filter over document metadata. An absent or empty filter matches
/// everything; a filter against a document without metadata matches nothing.
pub(crate) fn metadata_matches(
    filter: Option<&serde_json::Value>,
    metadata: Option<&serde_json::Value>,
) -> bool {
    let Some(serde_json::Value::Object(want)) = filter else {
        return true;
    };
    if want.is_empty() {
        return true;
    }
    let Some(serde_json::Value::Object(have)) = metadata else {
        return false;
    };
    want.iter().all(|(key, value)| have.get(key) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn store_kind_parsing() {
        assert_eq!(StoreKind::from_str("default"), Ok(StoreKind::Default));
        assert_eq!(StoreKind::from_str("sqlite"), Ok(StoreKind::Default));
        assert_eq!(StoreKind::from_str("memory"), Ok(StoreKind::Memory));
        assert!(StoreKind::from_str("pinecone").is_err());
    }

    #[test]
    fn embedding_bytes_length() {
        let embedding = vec![1.0f32, 2.0, 3.0];
        assert_eq!(embedding_to_bytes(&embedding).len(), 12);
    }

    #[test]
    fn metadata_filter_semantics() {
        let doc = json!({"lang": "en", "source": "wiki"});
        assert!(metadata_matches(None, Some(&doc)));
        assert!(metadata_matches(Some(&json!({})), Some(&doc)));
        assert!(metadata_matches(Some(&json!({"lang": "en"})), Some(&doc)));
        assert!(!metadata_matches(Some(&json!({"lang": "de"})), Some(&doc)));
        assert!(!metadata_matches(Some(&json!({"lang": "en"})), None));
    }

    #[test]
    fn document_record_round_trips_through_json() {
        let doc: DocumentRecord = serde_json::from_value(json!({
            "id": "doc1",
            "document": "hello",
            "metadata": {"lang": "en"}
        }))
        .unwrap();
        assert_eq!(doc.id, "doc1");
        assert!(doc.embedding.is_none());

        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("embedding").is_none());
        assert_eq!(value["document"], "hello");
    }
}
