//! In-process vector index
//!
//! Keeps records in memory, partitioned by namespace, and ranks them by
//! cosine similarity. Behaves like a remote index for the purposes of the
//! store adapter, including rejecting vectors of the wrong dimension.

use async_trait::async_trait;
use emvec_core::{EmvecError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::{FetchedRecord, ScoredId, StoredRecord, UpsertAck, VectorIndexService};

type Namespace = HashMap<String, StoredRecord>;

/// Vector index held in process memory
#[derive(Default)]
pub struct InMemoryIndex {
    namespaces: RwLock<HashMap<String, Namespace>>,
    dimension: Option<usize>,
    stats: CallStats,
}

/// Number of calls made against an index
#[derive(Debug, Default)]
pub struct CallStats {
    upserts: AtomicU64,
    queries: AtomicU64,
    fetches: AtomicU64,
}

impl CallStats {
    pub fn upserts(&self) -> u64 {
        self.upserts.load(Ordering::Relaxed)
    }

    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index that only accepts vectors of `dimension` components
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }

    /// Number of records stored under `namespace`
    pub async fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map_or(0, HashMap::len)
    }

    /// Whether `namespace` holds no records
    pub async fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace).await == 0
    }

    fn check_dimension(&self, operation: &'static str, len: usize) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != len => Err(EmvecError::remote(
                operation,
                Some(400),
                format!("Vector dimension {len} does not match the dimension of the index {expected}"),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl VectorIndexService for InMemoryIndex {
    async fn upsert(&self, namespace: &str, records: Vec<StoredRecord>) -> Result<UpsertAck> {
        self.stats.upserts.fetch_add(1, Ordering::Relaxed);

        for record in &records {
            self.check_dimension("upsert", record.values.len())?;
        }

        let count = records.len() as u64;
        let mut namespaces = self.namespaces.write().await;
        let partition = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            partition.insert(record.id.clone(), record);
        }

        Ok(UpsertAck {
            upserted_count: count,
        })
    }

    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredId>> {
        self.stats.queries.fetch_add(1, Ordering::Relaxed);
        self.check_dimension("query", vector.len())?;

        let namespaces = self.namespaces.read().await;
        let Some(partition) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredId> = partition
            .values()
            .map(|record| ScoredId {
                id: record.id.clone(),
                score: cosine_similarity(&vector, &record.values),
            })
            .collect();

        // Ties broken by id so repeated queries rank identically
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn fetch(
        &self,
        namespace: &str,
        ids: Vec<String>,
    ) -> Result<HashMap<String, FetchedRecord>> {
        self.stats.fetches.fetch_add(1, Ordering::Relaxed);

        let namespaces = self.namespaces.read().await;
        let Some(partition) = namespaces.get(namespace) else {
            return Ok(HashMap::new());
        };

        Ok(ids
            .into_iter()
            .filter_map(|id| {
                partition
                    .get(&id)
                    .map(|record| (id, FetchedRecord::from(record.clone())))
            })
            .collect())
    }
}

/// Cosine similarity; zero when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
