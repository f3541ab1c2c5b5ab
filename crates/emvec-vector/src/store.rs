//! Vector store adapter
//!
//! `IndexedVectorStore` implements `VectorDatabase` on top of any
//! `VectorIndexService`: batch writes go out as a single upsert, and
//! similarity search runs as a ranked query followed by a fetch of the
//! matched records.

use async_trait::async_trait;
use emvec_core::{
    Embedding, EmvecError, IndexConfig, PersistOutcome, Result, ScoredEmbedding, VectorDatabase,
    DEFAULT_NAMESPACE,
};
use std::collections::HashSet;

use crate::{PineconeIndex, StoredRecord, VectorIndexService};

/// Embedding store backed by a vector index service
pub struct IndexedVectorStore<S> {
    service: S,
    namespace: String,
    dimension: Option<usize>,
}

impl<S: VectorIndexService> IndexedVectorStore<S> {
    /// Create a store writing to the default namespace
    pub fn new(service: S) -> Self {
        Self {
            service,
            namespace: DEFAULT_NAMESPACE.to_string(),
            dimension: None,
        }
    }

    /// Scope all reads and writes to `namespace`
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Reject vectors whose length differs from `dimension` before calling the index
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Release the underlying connection
    pub fn close(self) {
        tracing::debug!(namespace = %self.namespace, "Closing vector store");
        drop(self.service);
    }

    fn check_dimension(&self, embedding: &Embedding) -> Result<()> {
        match self.dimension {
            Some(expected) if embedding.dimension() != expected => {
                Err(EmvecError::ValidationError(format!(
                    "vector has {} dimensions, index expects {expected}",
                    embedding.dimension()
                )))
            }
            _ => Ok(()),
        }
    }

    // Components must survive narrowing to f32 unchanged in kind
    fn check_values(&self, embedding: &Embedding) -> Result<()> {
        match embedding
            .vector()
            .iter()
            .position(|v| !v.is_finite() || v.abs() > f64::from(f32::MAX))
        {
            Some(i) => Err(EmvecError::ValidationError(format!(
                "vector component {i} ({}) is not representable as a finite f32",
                embedding.vector()[i]
            ))),
            None => Ok(()),
        }
    }
}

impl IndexedVectorStore<PineconeIndex> {
    /// Connect to the index described by `config`
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        let mut store =
            Self::new(PineconeIndex::from_config(config)?).with_namespace(config.namespace());
        if let Some(dimension) = config.dimension {
            store = store.with_dimension(dimension);
        }
        Ok(store)
    }
}

#[async_trait]
impl<S: VectorIndexService> VectorDatabase for IndexedVectorStore<S> {
    async fn persist_all(&self, embeddings: &[Embedding]) -> Result<PersistOutcome> {
        if embeddings.is_empty() {
            return Ok(PersistOutcome::default());
        }

        for embedding in embeddings {
            self.check_dimension(embedding)?;
            self.check_values(embedding)?;
        }

        let records: Vec<StoredRecord> = embeddings.iter().map(StoredRecord::encode).collect();
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let submitted = records.len();

        tracing::debug!(namespace = %self.namespace, batch = submitted, "Upserting embeddings");

        let ack = self.service.upsert(&self.namespace, records).await?;

        if ack.upserted_count < submitted as u64 {
            return Err(EmvecError::IncompleteWrite {
                submitted,
                acknowledged: ack.upserted_count,
                ids,
            });
        }

        tracing::info!(
            namespace = %self.namespace,
            count = submitted,
            "Persisted embeddings"
        );

        Ok(PersistOutcome {
            ids,
            acknowledged: ack.upserted_count,
        })
    }

    async fn find_related_scored(
        &self,
        embedding: &Embedding,
        max_results: usize,
    ) -> Result<Vec<ScoredEmbedding>> {
        if max_results == 0 {
            return Err(EmvecError::ValidationError(
                "max_results must be at least 1".to_string(),
            ));
        }
        if embedding.dimension() == 0 {
            return Err(EmvecError::ValidationError(
                "query vector is empty".to_string(),
            ));
        }
        self.check_dimension(embedding)?;
        self.check_values(embedding)?;

        tracing::debug!(namespace = %self.namespace, top_k = max_results, "Querying index");

        let matches = self
            .service
            .query(&self.namespace, crate::narrow(embedding.vector()), max_results)
            .await?;

        // Rank order, first occurrence wins
        let mut seen = HashSet::new();
        let ranked: Vec<_> = matches
            .into_iter()
            .filter(|m| seen.insert(m.id.clone()))
            .take(max_results)
            .collect();

        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ranked.iter().map(|m| m.id.clone()).collect();
        let mut fetched = self.service.fetch(&self.namespace, ids).await?;

        let results: Vec<ScoredEmbedding> = ranked
            .into_iter()
            .filter_map(|m| {
                let Some(record) = fetched.remove(&m.id) else {
                    tracing::warn!(id = %m.id, "Matched record missing from fetch, dropping");
                    return None;
                };
                match record.decode() {
                    Some(embedding) => Some(ScoredEmbedding {
                        embedding,
                        score: m.score,
                    }),
                    None => {
                        tracing::warn!(id = %m.id, "Fetched record has no text metadata, dropping");
                        None
                    }
                }
            })
            .collect();

        tracing::debug!(returned = results.len(), "Related embeddings assembled");

        Ok(results)
    }
}
