#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::QdrantConfig;
use crate::{ChatError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// HTTP client for the Qdrant collections and points APIs.
#[derive(Debug, Clone)]
pub struct QdrantClient {
    base_url: Url,
    api_key: String,
    agent: ureq::Agent,
}

/// Distance metric used when creating a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Euclid,
    Dot,
}

/// Point payload contract: a text field holding the document content and
/// a source field holding the origin identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl DocumentPayload {
    /// Origin identifier for source attribution; empty when absent.
    #[inline]
    pub fn origin(&self) -> String {
        self.source.clone().unwrap_or_default()
    }
}

/// Qdrant point identifiers are either integers or UUID strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PointStruct {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: DocumentPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<DocumentPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionInfo {
    pub status: String,
    #[serde(default)]
    pub points_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: u64,
    distance: Distance,
}

#[derive(Debug, Serialize)]
struct UpsertPointsRequest {
    points: Vec<PointStruct>,
}

#[derive(Debug, Serialize)]
struct SearchRequest {
    vector: Vec<f32>,
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    status: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    error: String,
}

impl QdrantClient {
    #[inline]
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| ChatError::Config(format!("Invalid Qdrant URL: {e}")))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            agent,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        self
    }

    /// List the names of all collections on the server.
    #[inline]
    pub fn list_collections(&self) -> Result<Vec<String>> {
        let url = self.endpoint("/collections", false)?;

        debug!("Listing collections at {}", url);

        let response = self
            .agent
            .get(url.as_str())
            .header("api-key", &self.api_key)
            .call()
            .map_err(|e| map_transport_error(&e))?;
        let body = read_body(response)?;

        let parsed: ApiResponse<CollectionsResult> = parse_result(&body)?;
        Ok(parsed
            .result
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Whether a collection with this name exists, checked by membership
    /// in the collection listing.
    #[inline]
    pub fn collection_exists(&self, name: &str) -> Result<bool> {
        let collections = self.list_collections()?;
        Ok(collections.iter().any(|c| c == name))
    }

    /// Fetch status and point count for a collection.
    #[inline]
    pub fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let url = self.endpoint(&format!("/collections/{name}"), false)?;

        let response = self
            .agent
            .get(url.as_str())
            .header("api-key", &self.api_key)
            .call()
            .map_err(|e| map_transport_error(&e))?;
        let body = read_body(response)?;

        let parsed: ApiResponse<CollectionInfo> = parse_result(&body)?;
        Ok(parsed.result)
    }

    /// Create a collection with the given vector dimension and distance
    /// metric.
    #[inline]
    pub fn create_collection(&self, name: &str, dimension: u64, distance: Distance) -> Result<()> {
        let url = self.endpoint(&format!("/collections/{name}"), false)?;

        debug!(
            "Creating collection '{}' (dimension {}, distance {:?})",
            name, dimension, distance
        );

        let request = CreateCollectionRequest {
            vectors: VectorParams {
                size: dimension,
                distance,
            },
        };
        let body = serialize_request(&request)?;

        let response = self
            .agent
            .put(url.as_str())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .send(&body)
            .map_err(|e| map_transport_error(&e))?;
        read_body(response)?;

        Ok(())
    }

    /// Upsert points into a collection, waiting for the write to be
    /// applied.
    #[inline]
    pub fn upsert_points(&self, name: &str, points: Vec<PointStruct>) -> Result<()> {
        let url = self.endpoint(&format!("/collections/{name}/points"), true)?;

        debug!("Upserting {} points into '{}'", points.len(), name);

        let request = UpsertPointsRequest { points };
        let body = serialize_request(&request)?;

        let response = self
            .agent
            .put(url.as_str())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .send(&body)
            .map_err(|e| map_transport_error(&e))?;
        read_body(response)?;

        Ok(())
    }

    /// Nearest-neighbor search; results arrive ranked by similarity under
    /// the collection's distance metric and that order is preserved.
    #[inline]
    pub fn search(&self, name: &str, vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredPoint>> {
        let url = self.endpoint(&format!("/collections/{name}/points/search"), false)?;

        debug!("Searching '{}' for {} nearest neighbors", name, limit);

        let request = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };
        let body = serialize_request(&request)?;

        let response = self
            .agent
            .post(url.as_str())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .send(&body)
            .map_err(|e| map_transport_error(&e))?;
        let body = read_body(response)?;

        let parsed: ApiResponse<Vec<ScoredPoint>> = parse_result(&body)?;
        debug!("Search returned {} hits", parsed.result.len());
        Ok(parsed.result)
    }

    fn endpoint(&self, path: &str, wait: bool) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ChatError::Config(format!("Failed to build request URL: {e}")))?;
        if wait {
            url.set_query(Some("wait=true"));
        }
        Ok(url)
    }
}

fn serialize_request<T: Serialize>(request: &T) -> Result<String> {
    serde_json::to_string(request)
        .map_err(|e| ChatError::VectorStore(format!("Failed to serialize request: {e}")))
}

fn parse_result<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| ChatError::VectorStore(format!("Failed to parse response: {e}")))
}

fn read_body(mut response: ureq::http::Response<ureq::Body>) -> Result<String> {
    let status = response.status();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ChatError::Network(format!("Failed to read response body: {e}")))?;

    if status.is_success() {
        return Ok(text);
    }

    let message = parse_error_message(&text).unwrap_or_else(|| format!("HTTP {status}: {text}"));

    warn!("Qdrant request failed: {message}");

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(ChatError::Network(format!(
            "Authentication failed: {message}"
        )));
    }

    Err(ChatError::VectorStore(message))
}

fn parse_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.status.error)
}

fn map_transport_error(error: &ureq::Error) -> ChatError {
    ChatError::Network(format!("Failed to reach Qdrant: {error}"))
}
