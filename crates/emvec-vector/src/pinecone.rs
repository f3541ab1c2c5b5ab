//! Pinecone data-plane client
//!
//! Speaks the index HTTP/JSON API: `POST /vectors/upsert`, `POST /query`
//! and `GET /vectors/fetch`. One `reqwest::Client` is created per index
//! and reused for every call.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use emvec_core::{EmvecError, IndexConfig, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::{FetchedRecord, RecordMetadata, ScoredId, StoredRecord, UpsertAck, VectorIndexService};

const API_KEY_HEADER: &str = "Api-Key";
const API_VERSION_HEADER: &str = "X-Pinecone-API-Version";
const API_VERSION: &str = "2024-07";

/// Pinecone index client
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [StoredRecord],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_values: bool,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredId>,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, FetchedVector>,
}

#[derive(Debug, Deserialize)]
struct FetchedVector {
    id: String,
    #[serde(default)]
    values: Vec<f32>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

impl From<FetchedVector> for FetchedRecord {
    fn from(vector: FetchedVector) -> Self {
        // A record without a string `text` field decodes to no metadata
        let metadata = vector
            .metadata
            .and_then(|m| serde_json::from_value::<RecordMetadata>(m).ok());

        Self {
            id: vector.id,
            values: vector.values,
            metadata,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

impl PineconeIndex {
    /// Create a client for the index at `host`
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(host, api_key, Duration::from_secs(30))
    }

    /// Create a client with a per-request timeout
    pub fn with_timeout(
        host: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmvecError::ConfigError(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            client,
            host: normalize_host(&host.into()),
            api_key: api_key.into(),
        })
    }

    /// Create from config
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| EmvecError::ConfigError("Pinecone API key required".to_string()))?;

        let host = match &config.host {
            Some(host) => host.clone(),
            None => index_host(&config.index, &config.project_name, &config.environment)?,
        };

        Self::with_timeout(
            host,
            api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Base URL requests are sent to
    pub fn host(&self) -> &str {
        &self.host
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(API_KEY_HEADER, &self.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<T> {
        let response = self
            .request(builder)
            .send()
            .await
            .map_err(|e| EmvecError::remote(operation, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmvecError::remote(
                operation,
                Some(status.as_u16()),
                error_text,
            ));
        }

        response
            .json()
            .await
            .map_err(|e| EmvecError::DecodeError(format!("Failed to parse {operation} response: {e}")))
    }
}

/// Host of a legacy pod-based index: `https://{index}-{project}.svc.{environment}.pinecone.io`
pub fn index_host(index: &str, project_name: &str, environment: &str) -> Result<String> {
    if index.is_empty() || project_name.is_empty() || environment.is_empty() {
        return Err(EmvecError::ConfigError(
            "index, project name and environment are required when no host is set".to_string(),
        ));
    }
    Ok(format!(
        "https://{index}-{project_name}.svc.{environment}.pinecone.io"
    ))
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

#[async_trait]
impl VectorIndexService for PineconeIndex {
    async fn upsert(&self, namespace: &str, records: Vec<StoredRecord>) -> Result<UpsertAck> {
        let body = UpsertRequest {
            vectors: &records,
            namespace,
        };
        let builder = self
            .client
            .post(format!("{}/vectors/upsert", self.host))
            .json(&body);

        let response: UpsertResponse = self.send("upsert", builder).await?;
        Ok(UpsertAck {
            upserted_count: response.upserted_count,
        })
    }

    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredId>> {
        let body = QueryRequest {
            namespace,
            vector: &vector,
            top_k,
            include_values: false,
            include_metadata: false,
        };
        let builder = self.client.post(format!("{}/query", self.host)).json(&body);

        let response: QueryResponse = self.send("query", builder).await?;
        Ok(response.matches)
    }

    async fn fetch(
        &self,
        namespace: &str,
        ids: Vec<String>,
    ) -> Result<HashMap<String, FetchedRecord>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let builder = self
            .client
            .get(format!("{}/vectors/fetch", self.host))
            .query(&fetch_params(namespace, &ids));

        let response: FetchResponse = self.send("fetch", builder).await?;
        Ok(response
            .vectors
            .into_iter()
            .map(|(id, vector)| (id, vector.into()))
            .collect())
    }
}

fn fetch_params<'a>(namespace: &'a str, ids: &'a [String]) -> Vec<(&'static str, &'a str)> {
    let mut params: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
    params.push(("namespace", namespace));
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_host() {
        assert_eq!(
            index_host("docs", "abc123", "us-east1-gcp").unwrap(),
            "https://docs-abc123.svc.us-east1-gcp.pinecone.io"
        );
        assert!(index_host("", "abc123", "us-east1-gcp").is_err());
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("docs.svc.io/"), "https://docs.svc.io");
        assert_eq!(normalize_host("http://localhost:5080"), "http://localhost:5080");
    }

    #[test]
    fn test_from_config() {
        let config = IndexConfig {
            api_key: Some("key".to_string()),
            index: "docs".to_string(),
            project_name: "abc123".to_string(),
            ..Default::default()
        };
        let index = PineconeIndex::from_config(&config).unwrap();
        assert_eq!(index.host(), "https://docs-abc123.svc.us-east1-gcp.pinecone.io");

        let missing_key = IndexConfig {
            api_key: None,
            ..config
        };
        assert!(PineconeIndex::from_config(&missing_key).is_err());
    }

    #[test]
    fn test_upsert_request_body() {
        let records = vec![StoredRecord {
            id: "id-1".to_string(),
            values: vec![0.5, 1.0],
            metadata: RecordMetadata {
                text: "hello".to_string(),
            },
        }];
        let body = serde_json::to_value(UpsertRequest {
            vectors: &records,
            namespace: "ns1",
        })
        .unwrap();

        assert_eq!(
            body,
            json!({
                "vectors": [{ "id": "id-1", "values": [0.5, 1.0], "metadata": { "text": "hello" } }],
                "namespace": "ns1"
            })
        );
    }

    #[test]
    fn test_query_request_body() {
        let body = serde_json::to_value(QueryRequest {
            namespace: "default",
            vector: &[0.25],
            top_k: 3,
            include_values: false,
            include_metadata: false,
        })
        .unwrap();

        assert_eq!(body["topK"], 3);
        assert_eq!(body["namespace"], "default");
        assert_eq!(body["includeValues"], false);
        assert_eq!(body["vector"], json!([0.25]));
    }

    #[test]
    fn test_parse_responses() {
        let upsert: UpsertResponse = serde_json::from_value(json!({ "upsertedCount": 2 })).unwrap();
        assert_eq!(upsert.upserted_count, 2);

        let query: QueryResponse = serde_json::from_value(json!({
            "matches": [
                { "id": "a", "score": 0.9, "values": [] },
                { "id": "b", "score": 0.7 }
            ],
            "namespace": "default"
        }))
        .unwrap();
        let ids: Vec<_> = query.matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let empty: QueryResponse = serde_json::from_value(json!({ "namespace": "x" })).unwrap();
        assert!(empty.matches.is_empty());
    }

    #[test]
    fn test_parse_fetch_response() {
        let fetch: FetchResponse = serde_json::from_value(json!({
            "vectors": {
                "a": { "id": "a", "values": [1.0, 2.0], "metadata": { "text": "alpha", "tag": 1 } },
                "b": { "id": "b", "values": [3.0] },
                "c": { "id": "c", "values": [4.0], "metadata": { "text": 7 } }
            },
            "namespace": "default"
        }))
        .unwrap();

        let mut records: HashMap<String, FetchedRecord> = fetch
            .vectors
            .into_iter()
            .map(|(id, v)| (id, v.into()))
            .collect();

        let a = records.remove("a").unwrap();
        assert_eq!(a.values, vec![1.0, 2.0]);
        assert_eq!(a.metadata.unwrap().text, "alpha");
        assert!(records.remove("b").unwrap().metadata.is_none());
        assert!(records.remove("c").unwrap().metadata.is_none());
    }

    #[test]
    fn test_fetch_params() {
        let ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            fetch_params("ns1", &ids),
            vec![("ids", "a"), ("ids", "b"), ("namespace", "ns1")]
        );
    }
}
