//! emvec Core - Embedding model, errors and shared traits
//!
//! This crate defines the core abstractions used throughout emvec:
//! - The `Embedding` value type (text plus its vector)
//! - Common error types
//! - The `VectorDatabase` trait implemented by storage adapters
//! - Configuration management

pub mod config;

pub use config::{AppConfig, ConfigError, IndexConfig, LoggingConfig, DEFAULT_NAMESPACE};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for emvec operations
#[derive(Error, Debug)]
pub enum EmvecError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Remote {operation} failed{}: {message}", http_status(.status))]
    RemoteError {
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Upsert acknowledged {acknowledged} of {submitted} records")]
    IncompleteWrite {
        submitted: usize,
        acknowledged: u64,
        ids: Vec<String>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EmvecError {
    /// Build a remote failure for the named operation
    pub fn remote(
        operation: &'static str,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::RemoteError {
            operation,
            status,
            message: message.into(),
        }
    }
}

fn http_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, EmvecError>;

// ============================================================================
// Embedding Model
// ============================================================================

/// A piece of text together with its vector representation.
///
/// Embeddings are immutable once built. Equality is structural over both
/// fields, so two embeddings with the same text and the same vector compare
/// equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    contents: String,
    vector: Vec<f64>,
}

impl Embedding {
    /// Create a new embedding
    pub fn new(contents: impl Into<String>, vector: Vec<f64>) -> Self {
        Self {
            contents: contents.into(),
            vector,
        }
    }

    /// The original text the vector was derived from
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// The vector itself
    pub fn vector(&self) -> &[f64] {
        &self.vector
    }

    /// Number of components in the vector
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Split into text and vector
    pub fn into_parts(self) -> (String, Vec<f64>) {
        (self.contents, self.vector)
    }

    /// Compare text exactly and vectors component-wise within `tolerance`.
    pub fn approx_eq(&self, other: &Embedding, tolerance: f64) -> bool {
        self.contents == other.contents
            && self.vector.len() == other.vector.len()
            && self
                .vector
                .iter()
                .zip(&other.vector)
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

/// An embedding returned from a similarity search, with its match score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEmbedding {
    pub embedding: Embedding,

    /// Similarity score reported by the index (higher is closer)
    pub score: f32,
}

/// Result of a successful batch write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistOutcome {
    /// Storage keys assigned to the written embeddings, in input order
    pub ids: Vec<String>,

    /// Number of records the index reported as written
    pub acknowledged: u64,
}

impl PersistOutcome {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Storage for embeddings with similarity lookup
#[async_trait]
pub trait VectorDatabase: Send + Sync {
    /// Store a single embedding
    async fn persist(&self, embedding: &Embedding) -> Result<PersistOutcome> {
        self.persist_all(std::slice::from_ref(embedding)).await
    }

    /// Store a batch of embeddings in one write
    async fn persist_all(&self, embeddings: &[Embedding]) -> Result<PersistOutcome>;

    /// Find the stored embeddings closest to `embedding`, best match first
    async fn find_related_scored(
        &self,
        embedding: &Embedding,
        max_results: usize,
    ) -> Result<Vec<ScoredEmbedding>>;

    /// Find the stored embeddings closest to `embedding`, best match first
    async fn find_related(
        &self,
        embedding: &Embedding,
        max_results: usize,
    ) -> Result<Vec<Embedding>> {
        let scored = self.find_related_scored(embedding, max_results).await?;
        Ok(scored.into_iter().map(|s| s.embedding).collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_embedding_accessors() {
        let embedding = Embedding::new("hello", vec![0.1, 0.2, 0.3]);
        assert_eq!(embedding.contents(), "hello");
        assert_eq!(embedding.vector(), &[0.1, 0.2, 0.3]);
        assert_eq!(embedding.dimension(), 3);

        let (text, vector) = embedding.into_parts();
        assert_eq!(text, "hello");
        assert_eq!(vector.len(), 3);
    }

    #[test]
    fn test_embedding_equality() {
        let a = Embedding::new("same", vec![1.0, 2.0]);
        let b = Embedding::new("same", vec![1.0, 2.0]);
        let c = Embedding::new("other", vec![1.0, 2.0]);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_empty_embedding_allowed() {
        let embedding = Embedding::new("", vec![]);
        assert_eq!(embedding.contents(), "");
        assert_eq!(embedding.dimension(), 0);
    }

    #[test]
    fn test_approx_eq() {
        let a = Embedding::new("text", vec![0.1, 0.2]);
        let narrowed = Embedding::new("text", vec![0.1f32 as f64, 0.2f32 as f64]);

        assert_ne!(a, narrowed);
        assert!(a.approx_eq(&narrowed, 1e-6));
        assert!(!a.approx_eq(&Embedding::new("text", vec![0.1]), 1e-6));
        assert!(!a.approx_eq(&Embedding::new("other", vec![0.1, 0.2]), 1e-6));
    }

    #[test]
    fn test_embedding_json_shape() {
        let embedding = Embedding::new("doc", vec![0.5]);
        let json = serde_json::to_value(&embedding).unwrap();
        assert_eq!(json["contents"], "doc");
        assert_eq!(json["vector"][0], 0.5);

        let parsed: Embedding = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, embedding);
    }

    #[test]
    fn test_remote_error_display() {
        let err = EmvecError::remote("upsert", Some(400), "bad dimension");
        assert_eq!(err.to_string(), "Remote upsert failed (HTTP 400): bad dimension");

        let err = EmvecError::remote("fetch", None, "connection reset");
        assert_eq!(err.to_string(), "Remote fetch failed: connection reset");
    }

    struct RecordingDatabase {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorDatabase for RecordingDatabase {
        async fn persist_all(&self, embeddings: &[Embedding]) -> Result<PersistOutcome> {
            self.batches.lock().unwrap().push(embeddings.len());
            Ok(PersistOutcome {
                ids: embeddings.iter().map(|e| e.contents().to_string()).collect(),
                acknowledged: embeddings.len() as u64,
            })
        }

        async fn find_related_scored(
            &self,
            embedding: &Embedding,
            _max_results: usize,
        ) -> Result<Vec<ScoredEmbedding>> {
            Ok(vec![ScoredEmbedding {
                embedding: embedding.clone(),
                score: 1.0,
            }])
        }
    }

    #[test]
    fn test_persist_one_delegates_to_batch() {
        let db = RecordingDatabase {
            batches: Mutex::new(Vec::new()),
        };
        let outcome =
            tokio_test::block_on(db.persist(&Embedding::new("single", vec![1.0]))).unwrap();

        assert_eq!(outcome.ids, vec!["single".to_string()]);
        assert_eq!(*db.batches.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_find_related_drops_scores() {
        let db = RecordingDatabase {
            batches: Mutex::new(Vec::new()),
        };
        let query = Embedding::new("q", vec![1.0]);
        let related = tokio_test::block_on(db.find_related(&query, 3)).unwrap();
        assert_eq!(related, vec![query]);
    }
}
