use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{clamp_limit, rank_by_distance, validate_document, validate_query, VectorDocument, VectorStore};
use crate::error::StoreResult;

/// Process-local vector store with brute-force search.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    documents: RwLock<HashMap<String, VectorDocument>>,
    dimension: Option<usize>,
}

impl InMemoryVectorStore {
    /// Create a store accepting embeddings of any length
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects embeddings not of length `dimension`
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            dimension: Some(dimension),
        }
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the store holds no documents
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Fetch a document by id
    pub async fn get(&self, id: &str) -> Option<VectorDocument> {
        self.documents.read().await.get(id).cloned()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn init(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn store(&self, document: VectorDocument) -> StoreResult<()> {
        validate_document(&document, self.dimension)?;
        self.documents
            .write()
            .await
            .insert(document.id.clone(), document);
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: i32) -> StoreResult<Vec<VectorDocument>> {
        validate_query(vector, self.dimension)?;
        let documents = self.documents.read().await;
        Ok(rank_by_distance(
            vector,
            documents.values().cloned(),
            clamp_limit(limit),
        ))
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.documents.write().await.remove(id);
        Ok(())
    }
}
