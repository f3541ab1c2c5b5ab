//! emvec Vector - Embedding storage over a vector index
//!
//! Translates `Embedding` values to and from the records a vector index
//! stores, and assembles similarity search from the index's query and
//! fetch calls.

use async_trait::async_trait;
use emvec_core::{Embedding, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub mod memory;
pub mod pinecone;
pub mod store;

pub use memory::InMemoryIndex;
pub use pinecone::PineconeIndex;
pub use store::IndexedVectorStore;

// ============================================================================
// Wire Records
// ============================================================================

/// Metadata stored alongside each vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Original text of the embedding
    pub text: String,
}

/// A vector record as written to the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl StoredRecord {
    /// Encode an embedding under a freshly generated id
    pub fn encode(embedding: &Embedding) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            values: narrow(embedding.vector()),
            metadata: RecordMetadata {
                text: embedding.contents().to_string(),
            },
        }
    }
}

/// A record read back from the index.
///
/// `metadata` is `None` when the stored record has no readable text.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Option<RecordMetadata>,
}

impl FetchedRecord {
    /// Decode back into an embedding; `None` if the text is missing
    pub fn decode(self) -> Option<Embedding> {
        let metadata = self.metadata?;
        Some(Embedding::new(metadata.text, widen(&self.values)))
    }
}

impl From<StoredRecord> for FetchedRecord {
    fn from(record: StoredRecord) -> Self {
        Self {
            id: record.id,
            values: record.values,
            metadata: Some(record.metadata),
        }
    }
}

/// One ranked match from a similarity query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredId {
    pub id: String,
    pub score: f32,
}

/// Acknowledgement of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertAck {
    pub upserted_count: u64,
}

/// Narrow a vector to single precision for transmission
pub fn narrow(vector: &[f64]) -> Vec<f32> {
    vector.iter().map(|&v| v as f32).collect()
}

/// Widen a stored vector back to double precision
pub fn widen(values: &[f32]) -> Vec<f64> {
    values.iter().map(|&v| f64::from(v)).collect()
}

// ============================================================================
// Index Service
// ============================================================================

/// Remote operations offered by a vector index.
///
/// Every call is scoped to a namespace; records never cross namespaces.
#[async_trait]
pub trait VectorIndexService: Send + Sync {
    /// Insert or overwrite records by id
    async fn upsert(&self, namespace: &str, records: Vec<StoredRecord>) -> Result<UpsertAck>;

    /// Ids of the `top_k` records closest to `vector`, closest first
    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredId>>;

    /// Full records for the given ids. Unknown ids are absent from the map.
    async fn fetch(
        &self,
        namespace: &str,
        ids: Vec<String>,
    ) -> Result<HashMap<String, FetchedRecord>>;
}

#[async_trait]
impl<T: VectorIndexService + ?Sized> VectorIndexService for Arc<T> {
    async fn upsert(&self, namespace: &str, records: Vec<StoredRecord>) -> Result<UpsertAck> {
        (**self).upsert(namespace, records).await
    }

    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredId>> {
        (**self).query(namespace, vector, top_k).await
    }

    async fn fetch(
        &self,
        namespace: &str,
        ids: Vec<String>,
    ) -> Result<HashMap<String, FetchedRecord>> {
        (**self).fetch(namespace, ids).await
    }
}
