//! Vector store abstraction.
//!
//! Stores [`VectorDocument`]s keyed by id (upsert) and answers
//! nearest-neighbour queries by Euclidean distance.

mod memory;

pub use memory::InMemoryVectorStore;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Result count used when a search asks for zero or fewer results.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// A stored piece of text with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl VectorDocument {
    /// Create a document without metadata.
    pub fn new(id: impl Into<String>, content: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding,
            metadata: HashMap::new(),
        }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Value of the `type` metadata tag, if any.
    pub fn kind(&self) -> Option<&str> {
        self.metadata.get("type").map(String::as_str)
    }
}

/// Persistent nearest-neighbour store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Prepare the backing storage. Idempotent.
    async fn init(&self) -> StoreResult<()>;

    /// Insert or replace a document by id.
    async fn store(&self, document: VectorDocument) -> StoreResult<()>;

    /// Closest documents to `vector`, ascending by L2 distance.
    ///
    /// A `limit` of zero or less means [`DEFAULT_SEARCH_LIMIT`].
    async fn search(&self, vector: &[f32], limit: i32) -> StoreResult<Vec<VectorDocument>>;

    /// Remove a document. Removing an absent id is not an error.
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Effective result count for a caller-supplied limit.
pub fn clamp_limit(limit: i32) -> usize {
    if limit <= 0 {
        DEFAULT_SEARCH_LIMIT
    } else {
        limit as usize
    }
}

/// Euclidean distance. Vectors of different length compare over the
/// shorter prefix, with the remainder of the longer one counted in full.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    let shared: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    let tail: f32 = if a.len() > b.len() {
        a[b.len()..].iter().map(|x| x * x).sum()
    } else {
        b[a.len()..].iter().map(|y| y * y).sum()
    };
    (shared + tail).sqrt()
}

/// Check a document before it is stored.
///
/// `dimension` is the store's fixed embedding length, when it has one.
/// NaN and infinite components are rejected: they cannot be persisted as
/// JSON numbers.
pub fn validate_document(document: &VectorDocument, dimension: Option<usize>) -> StoreResult<()> {
    if document.id.is_empty() {
        return Err(StoreError::MissingId);
    }
    if document.embedding.is_empty() {
        return Err(StoreError::MissingVector);
    }
    if let Some(index) = document.embedding.iter().position(|v| !v.is_finite()) {
        return Err(StoreError::NonFiniteVector { index });
    }
    check_dimension(&document.embedding, dimension)
}

/// Check a query vector before searching.
pub fn validate_query(vector: &[f32], dimension: Option<usize>) -> StoreResult<()> {
    if vector.is_empty() {
        return Err(StoreError::EmptyVector);
    }
    check_dimension(vector, dimension)
}

fn check_dimension(vector: &[f32], dimension: Option<usize>) -> StoreResult<()> {
    match dimension {
        Some(expected) if vector.len() != expected => Err(StoreError::DimensionMismatch {
            expected,
            actual: vector.len(),
        }),
        _ => Ok(()),
    }
}

/// Rank documents by distance to `query` and keep the closest `limit`.
///
/// Ties are broken by id so results are stable.
pub fn rank_by_distance(
    query: &[f32],
    documents: impl IntoIterator<Item = VectorDocument>,
    limit: usize,
) -> Vec<VectorDocument> {
    let mut scored: Vec<(f32, VectorDocument)> = documents
        .into_iter()
        .map(|doc| (l2_distance(query, &doc.embedding), doc))
        .collect();

    scored.sort_by(|(da, a), (db, b)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)));
    scored.truncate(limit);
    scored.into_iter().map(|(_, doc)| doc).collect()
}
