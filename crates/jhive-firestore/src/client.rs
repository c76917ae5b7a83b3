//! Firestore REST API client.
//!
//! Production-grade client with:
//! - Token caching with refresh margin
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter
//! - Observability (tracing spans, metrics)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::token_cache::TokenCache;
use crate::types::{
    Aggregation, CommitRequest, CommitResponse, CountAggregation, Document, ListDocumentsResponse,
    RunAggregationQueryRequest, RunAggregationQueryResponse, RunQueryRequest, RunQueryResponse,
    StructuredAggregationQuery, StructuredQuery, Value, Write,
};

// =============================================================================
// Configuration
// =============================================================================

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID").map_err(|_| {
            FirestoreError::auth_error("GCP_PROJECT_ID must be set to access Firestore")
        })?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error("GCP_PROJECT_ID cannot be empty"));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// Firestore REST API client.
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    token_cache: Arc<TokenCache>,
}

impl Clone for FirestoreClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            base_url: self.base_url.clone(),
            token_cache: Arc::clone(&self.token_cache),
        }
    }
}

impl FirestoreClient {
    /// Create a new Firestore client.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let auth = Self::create_auth_provider()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("jhive-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let base_url = format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/{}/documents",
            config.project_id, config.database_id
        );

        Ok(Self {
            http,
            config,
            base_url,
            token_cache: Arc::new(TokenCache::new(auth)),
        })
    }

    fn create_auth_provider() -> FirestoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(FirestoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        let config = FirestoreConfig::from_env()?;
        Self::new(config).await
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    /// Build document path.
    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    /// Full document name for batch operations.
    pub fn full_document_name(&self, collection: &str, doc_id: &str) -> String {
        format!(
            "projects/{}/databases/{}/documents/{}/{}",
            self.config.project_id, self.config.database_id, collection, doc_id
        )
    }

    /// Send an authorized request, refreshing an expired token once and
    /// retrying transient failures per the retry policy.
    ///
    /// The returned response has a non-retryable status; callers map
    /// 2xx/4xx per operation.
    async fn send<F>(&self, operation: &str, build: F) -> FirestoreResult<Response>
    where
        F: Fn(&Client, &str) -> reqwest::RequestBuilder,
    {
        with_retry(&self.config.retry, operation, || async {
            let started = Instant::now();
            let token = self.token_cache.get_token().await?;
            let mut response = build(&self.http, &token).send().await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                let body = response.text().await.unwrap_or_default();
                if Self::is_access_token_expired(&body) {
                    self.token_cache.invalidate().await;
                    let token = self.token_cache.get_token().await?;
                    response = build(&self.http, &token).send().await?;
                } else {
                    record_request(operation, 401, started.elapsed());
                    return Err(FirestoreError::auth_error(format!(
                        "{} unauthorized: {}",
                        operation, body
                    )));
                }
            }

            let status = response.status();
            record_request(operation, status.as_u16(), started.elapsed());

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_ms = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(|secs| secs * 1000)
                    .unwrap_or(1000);
                return Err(FirestoreError::RateLimited(retry_after_ms));
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                return Err(FirestoreError::request_failed(format!(
                    "{} failed with {}: {}",
                    operation, status, body
                )));
            }

            Ok(response)
        })
        .await
    }

    /// Map a non-2xx client error response to a FirestoreError.
    async fn error_from(status: StatusCode, context: &str, response: Response) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{}: {}", context, body))
    }

    // =========================================================================
    // CRUD Operations
    // =========================================================================

    /// Get a document.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_path(collection, doc_id);

        let response = self
            .send("get_document", |http, token| {
                http.get(&url).bearer_auth(token)
            })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let doc: Document = response.json().await?;
                Ok(Some(doc))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Self::error_from(status, &url, response).await),
        }
    }

    /// Create a document. Fails with `AlreadyExists` when the ID is taken.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = format!("{}/{}?documentId={}", self.base_url, collection, doc_id);
        let body = Document::new(fields);

        let response = self
            .send("create_document", |http, token| {
                http.post(&url).bearer_auth(token).json(&body)
            })
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let doc: Document = response.json().await?;
                Ok(doc)
            }
            StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!(
                "{}/{}",
                collection, doc_id
            ))),
            status => Err(Self::error_from(status, &url, response).await),
        }
    }

    /// Update a document (merge). With an update mask only the listed
    /// fields change; without one the whole document is replaced.
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: Option<Vec<String>>,
    ) -> FirestoreResult<Document> {
        let mut url = self.document_path(collection, doc_id);
        let mut params: Vec<String> = vec!["currentDocument.exists=true".to_string()];
        if let Some(mask) = update_mask {
            params.extend(
                mask.iter()
                    .map(|f| format!("updateMask.fieldPaths={}", urlencoding::encode(f))),
            );
        }
        url = format!("{}?{}", url, params.join("&"));

        let body = Document::new(fields);

        let response = self
            .send("update_document", |http, token| {
                http.patch(&url).bearer_auth(token).json(&body)
            })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let doc: Document = response.json().await?;
                Ok(doc)
            }
            StatusCode::NOT_FOUND => {
                Err(FirestoreError::not_found(format!("{}/{}", collection, doc_id)))
            }
            // The exists precondition surfaces as 400 FAILED_PRECONDITION on
            // missing documents
            StatusCode::BAD_REQUEST | StatusCode::PRECONDITION_FAILED => {
                let body = response.text().await.unwrap_or_default();
                if body.contains("FAILED_PRECONDITION") || body.contains("NOT_FOUND") {
                    Err(FirestoreError::not_found(format!("{}/{}", collection, doc_id)))
                } else {
                    Err(FirestoreError::request_failed(format!(
                        "update {}/{} failed: {}",
                        collection, doc_id, body
                    )))
                }
            }
            status => Err(Self::error_from(status, &url, response).await),
        }
    }

    /// Delete a document. Deleting an already-missing document succeeds.
    pub async fn delete_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<()> {
        let url = self.document_path(collection, doc_id);

        let response = self
            .send("delete_document", |http, token| {
                http.delete(&url).bearer_auth(token)
            })
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::NOT_FOUND => {
                debug!("Document {}/{} already deleted (idempotent)", collection, doc_id);
                Ok(())
            }
            status => Err(Self::error_from(status, &url, response).await),
        }
    }

    /// List documents in a collection (unfiltered, page-token based).
    pub async fn list_documents(
        &self,
        collection: &str,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> FirestoreResult<ListDocumentsResponse> {
        let mut url = format!("{}/{}", self.base_url, collection);
        let mut params = Vec::new();
        if let Some(size) = page_size {
            params.push(format!("pageSize={}", size));
        }
        if let Some(token) = page_token {
            params.push(format!("pageToken={}", token));
        }
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }

        let response = self
            .send("list_documents", |http, token| {
                http.get(&url).bearer_auth(token)
            })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let list: ListDocumentsResponse = response.json().await?;
                Ok(list)
            }
            status => Err(Self::error_from(status, &url, response).await),
        }
    }

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Run a structured query over top-level collections.
    pub async fn run_query(&self, query: StructuredQuery) -> FirestoreResult<Vec<Document>> {
        let url = format!("{}:runQuery", self.base_url);
        let request = RunQueryRequest {
            structured_query: query,
        };

        let response = self
            .send("run_query", |http, token| {
                http.post(&url).bearer_auth(token).json(&request)
            })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await.unwrap_or_default();
                // runQuery returns a JSON array of RunQueryResponse objects
                let responses: Vec<RunQueryResponse> =
                    serde_json::from_str(&body).map_err(|e| {
                        FirestoreError::invalid_response(format!(
                            "Failed to parse runQuery response: {} (body prefix: {})",
                            e,
                            &body[..body.len().min(200)]
                        ))
                    })?;

                Ok(responses.into_iter().filter_map(|r| r.document).collect())
            }
            status => Err(Self::error_from(status, &url, response).await),
        }
    }

    /// Count documents matching a structured query.
    pub async fn count(&self, query: StructuredQuery) -> FirestoreResult<u64> {
        let url = format!("{}:runAggregationQuery", self.base_url);
        let request = RunAggregationQueryRequest {
            structured_aggregation_query: StructuredAggregationQuery {
                structured_query: query,
                aggregations: vec![Aggregation {
                    alias: "total".to_string(),
                    count: CountAggregation {},
                }],
            },
        };

        let response = self
            .send("run_aggregation_query", |http, token| {
                http.post(&url).bearer_auth(token).json(&request)
            })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await.unwrap_or_default();
                let responses: Vec<RunAggregationQueryResponse> = serde_json::from_str(&body)
                    .map_err(|e| {
                        FirestoreError::invalid_response(format!(
                            "Failed to parse aggregation response: {} (body prefix: {})",
                            e,
                            &body[..body.len().min(200)]
                        ))
                    })?;

                let total = responses
                    .into_iter()
                    .filter_map(|r| r.result)
                    .filter_map(|r| r.aggregate_fields)
                    .filter_map(|mut fields| fields.remove("total"))
                    .find_map(|v| match v {
                        Value::IntegerValue(s) => s.parse::<u64>().ok(),
                        _ => None,
                    })
                    .unwrap_or(0);

                Ok(total)
            }
            status => Err(Self::error_from(status, &url, response).await),
        }
    }

    // =========================================================================
    // Atomic multi-document writes
    // =========================================================================

    /// Commit a set of writes atomically. All writes succeed or none do;
    /// a violated create precondition surfaces as `AlreadyExists`.
    pub async fn commit(&self, writes: Vec<Write>) -> FirestoreResult<CommitResponse> {
        if writes.is_empty() {
            return Ok(CommitResponse {
                write_results: Some(vec![]),
                commit_time: None,
            });
        }
        if writes.len() > 500 {
            return Err(FirestoreError::request_failed(
                "Commit exceeds 500 write limit",
            ));
        }

        let url = format!("{}:commit", self.base_url);
        let request = CommitRequest { writes };

        let response = self
            .send("commit", |http, token| {
                http.post(&url).bearer_auth(token).json(&request)
            })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let commit: CommitResponse = response.json().await?;
                Ok(commit)
            }
            StatusCode::CONFLICT => {
                Err(FirestoreError::already_exists("commit write conflict"))
            }
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                // A failed exists=false precondition reports ALREADY_EXISTS
                if body.contains("ALREADY_EXISTS") {
                    Err(FirestoreError::already_exists("commit write conflict"))
                } else {
                    Err(FirestoreError::request_failed(format!(
                        "commit failed: {}",
                        body
                    )))
                }
            }
            status => Err(Self::error_from(status, &url, response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client_paths(config: FirestoreConfig) -> (String, String) {
        let base = format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/{}/documents",
            config.project_id, config.database_id
        );
        let name = format!(
            "projects/{}/databases/{}/documents/jobs/j1",
            config.project_id, config.database_id
        );
        (base, name)
    }

    #[test]
    fn document_paths() {
        let config = FirestoreConfig {
            project_id: "proj".to_string(),
            database_id: "(default)".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        };
        let (base, name) = test_client_paths(config);
        assert_eq!(
            base,
            "https://firestore.googleapis.com/v1/projects/proj/databases/(default)/documents"
        );
        assert_eq!(
            name,
            "projects/proj/databases/(default)/documents/jobs/j1"
        );
    }

    #[test]
    fn expired_token_detection() {
        assert!(FirestoreClient::is_access_token_expired(
            "{\"error\":{\"status\":\"UNAUTHENTICATED\"}}"
        ));
        assert!(FirestoreClient::is_access_token_expired("ACCESS_TOKEN_EXPIRED"));
        assert!(!FirestoreClient::is_access_token_expired("PERMISSION_DENIED"));
    }
}
