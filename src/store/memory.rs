//! In-memory vector store.
//!
//! Brute-force cosine similarity over an insertion-ordered list. Not meant
//! for production data; used by tests and for development without a database
//! file.

use anyhow::{Context, Result};

use super::{metadata_matches, DocumentRecord, VectorStore};

pub struct MemoryStore {
    embedding_name: String,
    documents: Vec<DocumentRecord>,
}

impl MemoryStore {
    pub fn new(embedding_name: &str) -> Self {
        Self {
            embedding_name: embedding_name.to_string(),
            documents: Vec::new(),
        }
    }
}

impl VectorStore for MemoryStore {
    fn is_valid(&self) -> bool {
        true
    }

    fn embedding_name(&self) -> &str {
        &self.embedding_name
    }

    fn count(&self) -> Result<u64> {
        Ok(self.documents.len() as u64)
    }

    fn learn_document(&mut self, doc: &DocumentRecord) -> Result<()> {
        doc.embedding
            .as_ref()
            .context("document embedding missing")?;
        match self.documents.iter().position(|d| d.id == doc.id) {
            Some(pos) => self.documents[pos] = doc.clone(),
            None => self.documents.push(doc.clone()),
        }
        Ok(())
    }

    fn query_documents(
        &self,
        max_records: usize,
        embedding: &[f32],
        filter: Option<&serde_json::Value>,
    ) -> Result<Vec<DocumentRecord>> {
        let mut scored: Vec<(f32, &DocumentRecord)> = self
            .documents
            .iter()
            .filter(|doc| metadata_matches(filter, doc.metadata.as_ref()))
            .filter_map(|doc| {
                let stored = doc.embedding.as_ref()?;
                Some((cosine_similarity(embedding, stored), doc))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(max_records)
            .map(|(_, doc)| DocumentRecord {
                embedding: None,
                ..doc.clone()
            })
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, embedding: Vec<f32>, metadata: Option<serde_json::Value>) -> DocumentRecord {
        DocumentRecord {
            id: id.into(),
            document: Some(format!("document {id}")),
            embedding: Some(embedding),
            uri: None,
            metadata,
        }
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn learn_count_and_upsert() {
        let mut store = MemoryStore::new("default");
        store.learn_document(&doc("a", vec![1.0, 0.0], None)).unwrap();
        store.learn_document(&doc("b", vec![0.0, 1.0], None)).unwrap();
        store.learn_document(&doc("a", vec![0.5, 0.5], None)).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn query_returns_most_similar_first() {
        let mut store = MemoryStore::new("default");
        store.learn_document(&doc("x", vec![1.0, 0.0], None)).unwrap();
        store.learn_document(&doc("y", vec![0.0, 1.0], None)).unwrap();
        store
            .learn_document(&doc("z", vec![0.7, 0.7], None))
            .unwrap();

        let results = store.query_documents(2, &[1.0, 0.1], None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "x");
        assert_eq!(results[1].id, "z");
        assert!(results[0].embedding.is_none());
    }

    #[test]
    fn query_applies_metadata_filter() {
        let mut store = MemoryStore::new("default");
        store
            .learn_document(&doc("a", vec![1.0, 0.0], Some(json!({"lang": "en"}))))
            .unwrap();
        store
            .learn_document(&doc("b", vec![1.0, 0.0], Some(json!({"lang": "de"}))))
            .unwrap();

        let results = store
            .query_documents(10, &[1.0, 0.0], Some(&json!({"lang": "en"})))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn missing_embedding_is_rejected() {
        let mut store = MemoryStore::new("default");
        let record = DocumentRecord {
            id: "a".into(),
            document: Some("alpha".into()),
            embedding: None,
            uri: None,
            metadata: None,
        };
        assert!(store.learn_document(&record).is_err());
    }
}
