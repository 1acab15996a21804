//! Meilisearch API connector implementation
//!
//! Implements `RemoteIndexClient` and `RemoteSearchClient` over the host's
//! `HttpClient`.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::remote_index::{
    IndexSettings, RemoteDocument, RemoteIndexClient, RemoteSearchClient, SearchHit, SearchQuery,
    SearchResults, ServiceHealth, TaskHandle, TaskStatus,
};
use core_runtime::config::MeilisearchSettings;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::MeilisearchError;
use crate::types::{
    HealthResponse, HybridRequest, SearchRequest, SearchResponse, SettingsRequest, Task, TaskInfo,
    TaskStatusKind, VersionResponse,
};

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Meilisearch API connector
///
/// # Features
///
/// - Document writes return immediately with a [`TaskHandle`]; completion is
///   observed through [`RemoteIndexClient::status`]
/// - Writes and status lookups are sent once: the task waiter owns the retry
///   budget. Searches use the client's default retry policy.
/// - Optional API key sent as a bearer token
///
/// # Example
///
/// ```ignore
/// use provider_meilisearch::MeilisearchConnector;
/// use bridge_traits::remote_index::RemoteIndexClient;
///
/// let connector = MeilisearchConnector::new(http_client, "http://127.0.0.1:7700", "vault");
/// let handle = connector.clear().await?;
/// ```
pub struct MeilisearchConnector {
    http_client: Arc<dyn HttpClient>,

    /// Base URL without trailing slash
    host: String,

    index_uid: String,

    api_key: Option<String>,
}

impl MeilisearchConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        host: impl Into<String>,
        index_uid: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            host: host.into().trim().trim_end_matches('/').to_string(),
            index_uid: index_uid.into(),
            api_key: None,
        }
    }

    /// Build a connector from validated connection settings
    pub fn from_settings(http_client: Arc<dyn HttpClient>, settings: &MeilisearchSettings) -> Self {
        let connector = Self::new(http_client, settings.host.clone(), settings.index_name.clone());
        match settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => connector.with_api_key(key),
            None => connector,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn index_uid(&self) -> &str {
        &self.index_uid
    }

    fn index_url(&self, suffix: &str) -> String {
        format!("{}/indexes/{}{}", self.host, self.index_uid, suffix)
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        let request = HttpRequest::new(method, url)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);
        match &self.api_key {
            Some(key) => request.bearer_token(key.clone()),
            None => request,
        }
    }

    /// Execute and map non-success statuses to typed errors
    async fn send(&self, request: HttpRequest, policy: RetryPolicy) -> Result<HttpResponse> {
        let method = request.method;
        let url = request.url.clone();
        let response = self.http_client.execute_with_retry(request, policy).await?;

        if response.is_success() {
            debug!(?method, %url, status = response.status, "Request succeeded");
            return Ok(response);
        }

        let error = MeilisearchError::from_response(response.status, &response.body);
        warn!(?method, %url, status = response.status, error = %error, "Request failed");
        Err(error.into())
    }

    /// Send a write and decode the enqueued task summary
    async fn enqueue(&self, request: HttpRequest) -> Result<TaskHandle> {
        let response = self.send(request, RetryPolicy::no_retry()).await?;
        let info: TaskInfo = response
            .json()
            .map_err(|e| MeilisearchError::Parse(e.to_string()))?;

        debug!(task_uid = info.task_uid, kind = %info.kind, status = ?info.status, "Task enqueued");
        Ok(TaskHandle {
            task_uid: info.task_uid,
            index_uid: info.index_uid.or_else(|| Some(self.index_uid.clone())),
        })
    }

    fn to_status(task: Task) -> TaskStatus {
        match task.status {
            TaskStatusKind::Enqueued | TaskStatusKind::Processing => TaskStatus::pending(),
            TaskStatusKind::Succeeded => TaskStatus::succeeded(),
            TaskStatusKind::Failed => match task.error {
                Some(error) => TaskStatus::failed(format!("{} ({})", error.message, error.code)),
                None => TaskStatus::failed(format!("task {} failed", task.uid)),
            },
            TaskStatusKind::Canceled => TaskStatus::failed(format!("task {} was canceled", task.uid)),
        }
    }

    fn to_hit(raw: crate::types::RawHit) -> SearchHit {
        SearchHit {
            snippet: raw.formatted_str("content"),
            highlighted_name: raw.formatted_str("name"),
            id: raw.id,
            name: raw.name,
            path: raw.path,
        }
    }
}

#[async_trait]
impl RemoteIndexClient for MeilisearchConnector {
    #[instrument(skip(self, documents), fields(index = %self.index_uid, count = documents.len()))]
    async fn add_or_update(&self, documents: &[RemoteDocument]) -> Result<TaskHandle> {
        let request = self
            .request(HttpMethod::Post, self.index_url("/documents?primaryKey=id"))
            .json(documents)?;
        self.enqueue(request).await
    }

    #[instrument(skip(self, remote_ids), fields(index = %self.index_uid, count = remote_ids.len()))]
    async fn delete(&self, remote_ids: &[String]) -> Result<TaskHandle> {
        let request = self
            .request(HttpMethod::Post, self.index_url("/documents/delete-batch"))
            .json(remote_ids)?;
        self.enqueue(request).await
    }

    #[instrument(skip(self), fields(index = %self.index_uid))]
    async fn clear(&self) -> Result<TaskHandle> {
        info!("Clearing remote index");
        let request = self.request(HttpMethod::Delete, self.index_url("/documents"));
        self.enqueue(request).await
    }

    async fn status(&self, handle: &TaskHandle) -> Result<TaskStatus> {
        let request = self.request(
            HttpMethod::Get,
            format!("{}/tasks/{}", self.host, handle.task_uid),
        );
        let response = self.send(request, RetryPolicy::no_retry()).await?;
        let task: Task = response
            .json()
            .map_err(|e| MeilisearchError::Parse(e.to_string()))?;
        Ok(Self::to_status(task))
    }

    #[instrument(skip(self, settings), fields(index = %self.index_uid))]
    async fn update_settings(&self, settings: &IndexSettings) -> Result<TaskHandle> {
        let body = SettingsRequest {
            searchable_attributes: &settings.searchable_attributes,
            displayed_attributes: &settings.displayed_attributes,
        };
        let request = self
            .request(HttpMethod::Patch, self.index_url("/settings"))
            .json(&body)?;
        self.enqueue(request).await
    }
}

#[async_trait]
impl RemoteSearchClient for MeilisearchConnector {
    #[instrument(skip(self, query), fields(index = %self.index_uid, limit = query.limit))]
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        let body = SearchRequest {
            q: &query.query,
            limit: query.limit,
            attributes_to_highlight: &query.highlight_fields,
            attributes_to_crop: &query.crop_fields,
            crop_length: query.crop_length,
            hybrid: query.semantic.as_ref().map(|s| HybridRequest {
                embedder: &s.embedder,
                semantic_ratio: s.ratio,
            }),
        };
        let request = self
            .request(HttpMethod::Post, self.index_url("/search"))
            .json(&body)?;

        let response = self.send(request, RetryPolicy::default()).await?;
        let parsed: SearchResponse = response
            .json()
            .map_err(|e| MeilisearchError::Parse(e.to_string()))?;

        debug!(
            hits = parsed.hits.len(),
            processing_time_ms = parsed.processing_time_ms,
            "Search completed"
        );
        Ok(SearchResults {
            query: query.query.clone(),
            hits: parsed.hits.into_iter().map(Self::to_hit).collect(),
            estimated_total_hits: parsed.estimated_total_hits,
            processing_time_ms: parsed.processing_time_ms,
        })
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn health(&self) -> Result<ServiceHealth> {
        let request = self.request(HttpMethod::Get, format!("{}/health", self.host));
        let response = self.send(request, RetryPolicy::no_retry()).await?;
        let health: HealthResponse = response
            .json()
            .map_err(|e| MeilisearchError::Parse(e.to_string()))?;

        if health.status != "available" {
            return Ok(ServiceHealth {
                available: false,
                version: None,
            });
        }

        // Requires a key with the `version` action, so it also validates the key
        let request = self.request(HttpMethod::Get, format!("{}/version", self.host));
        let response = self.send(request, RetryPolicy::no_retry()).await?;
        let version: VersionResponse = response
            .json()
            .map_err(|e| MeilisearchError::Parse(e.to_string()))?;

        info!(version = %version.pkg_version, "Search service reachable");
        Ok(ServiceHealth {
            available: true,
            version: Some(version.pkg_version),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::remote_index::{SemanticQuery, TaskState};
    use bytes::Bytes;
    use mockall::{mock, Sequence};
    use serde_json::{json, Map, Value};
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn enqueued(uid: u64, kind: &str) -> HttpResponse {
        response(
            202,
            json!({
                "taskUid": uid,
                "indexUid": "vault",
                "status": "enqueued",
                "type": kind,
                "enqueuedAt": "2024-01-01T00:00:00Z"
            }),
        )
    }

    fn body_json(request: &HttpRequest) -> Value {
        serde_json::from_slice(request.body.as_ref().unwrap()).unwrap()
    }

    fn connector(mock: MockHttpClient) -> MeilisearchConnector {
        MeilisearchConnector::new(Arc::new(mock), "http://localhost:7700/", "vault")
            .with_api_key("masterKey")
    }

    fn document(id: &str) -> RemoteDocument {
        RemoteDocument {
            id: id.to_string(),
            name: "a".to_string(),
            path: "a.md".to_string(),
            frontmatter: Map::new(),
            content: "hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_or_update_posts_documents() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.url == "http://localhost:7700/indexes/vault/documents?primaryKey=id"
                    && req.headers.get("Authorization").map(String::as_str)
                        == Some("Bearer masterKey")
                    && body_json(req)[0]["id"] == "a_2emd"
            })
            .returning(|_| Ok(enqueued(7, "documentAdditionOrUpdate")));

        let handle = connector(mock)
            .add_or_update(&[document("a_2emd")])
            .await
            .unwrap();
        assert_eq!(handle.task_uid, 7);
        assert_eq!(handle.index_uid.as_deref(), Some("vault"));
    }

    #[tokio::test]
    async fn test_delete_uses_delete_batch() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .withf(|req| {
                req.url.ends_with("/indexes/vault/documents/delete-batch")
                    && body_json(req) == json!(["a_2emd", "b_2emd"])
            })
            .returning(|_| Ok(enqueued(8, "documentDeletion")));

        let ids = vec!["a_2emd".to_string(), "b_2emd".to_string()];
        assert_eq!(connector(mock).delete(&ids).await.unwrap().task_uid, 8);
    }

    #[tokio::test]
    async fn test_clear_deletes_all_documents() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .withf(|req| req.method == HttpMethod::Delete && req.url.ends_with("/indexes/vault/documents"))
            .returning(|_| Ok(enqueued(9, "documentDeletion")));

        assert_eq!(connector(mock).clear().await.unwrap().task_uid, 9);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let mut mock = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url == "http://localhost:7700/tasks/3")
            .returning(|_| Ok(response(200, json!({"uid": 3, "status": "processing", "type": "documentDeletion"}))));
        mock.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(response(
                    200,
                    json!({
                        "uid": 3,
                        "status": "failed",
                        "type": "documentAdditionOrUpdate",
                        "error": {
                            "message": "Document identifier is invalid.",
                            "code": "invalid_document_id",
                            "type": "invalid_request",
                            "link": ""
                        }
                    }),
                ))
            });

        let connector = connector(mock);
        let handle = TaskHandle::new(3);

        let status = connector.status(&handle).await.unwrap();
        assert_eq!(status.state, TaskState::Pending);

        let status = connector.status(&handle).await.unwrap();
        assert_eq!(status.state, TaskState::Failed);
        assert_eq!(
            status.error.as_deref(),
            Some("Document identifier is invalid. (invalid_document_id)")
        );
    }

    #[tokio::test]
    async fn test_rejected_write_keeps_remote_code() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(response(
                400,
                json!({"message": "bad payload", "code": "bad_request", "type": "invalid_request", "link": ""}),
            ))
        });

        let err = connector(mock).clear().await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Remote { status: 400, code: Some(ref c), .. } if c == "bad_request"
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_transient() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Network("connection refused".to_string())));

        let err = connector(mock).status(&TaskHandle::new(1)).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_update_settings() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .withf(|req| {
                let body = body_json(req);
                req.method == HttpMethod::Patch
                    && req.url.ends_with("/indexes/vault/settings")
                    && body["searchableAttributes"][0] == "name"
                    && body["displayedAttributes"].is_array()
            })
            .returning(|_| Ok(enqueued(10, "settingsUpdate")));

        let handle = connector(mock)
            .update_settings(&IndexSettings::default())
            .await
            .unwrap();
        assert_eq!(handle.task_uid, 10);
    }

    #[tokio::test]
    async fn test_search_maps_formatted_hits() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .withf(|req| {
                let body = body_json(req);
                req.url.ends_with("/indexes/vault/search")
                    && body["q"] == "rust"
                    && body["limit"] == 5
                    && body["hybrid"]["embedder"] == "default"
                    && body["hybrid"]["semanticRatio"] == 0.5
            })
            .returning(|_| {
                Ok(response(
                    200,
                    json!({
                        "hits": [{
                            "id": "a_2emd",
                            "name": "a",
                            "path": "notes/a.md",
                            "content": "learning rust",
                            "_formatted": {
                                "name": "a",
                                "content": "…learning <em>rust</em>"
                            }
                        }],
                        "query": "rust",
                        "processingTimeMs": 2,
                        "estimatedTotalHits": 1
                    }),
                ))
            });

        let mut query = SearchQuery::new("rust");
        query.limit = 5;
        query.semantic = Some(SemanticQuery {
            embedder: "default".to_string(),
            ratio: 0.5,
        });

        let results = connector(mock).search(&query).await.unwrap();
        assert_eq!(results.estimated_total_hits, Some(1));
        assert_eq!(results.processing_time_ms, 2);
        let hit = &results.hits[0];
        assert_eq!(hit.path, "notes/a.md");
        assert_eq!(hit.snippet.as_deref(), Some("…learning <em>rust</em>"));
        assert_eq!(hit.highlighted_name.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_health_then_version() {
        let mut mock = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url == "http://localhost:7700/health")
            .returning(|_| Ok(response(200, json!({"status": "available"}))));
        mock.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url == "http://localhost:7700/version")
            .returning(|_| {
                Ok(response(
                    200,
                    json!({"commitSha": "abc", "commitDate": "2024-01-01", "pkgVersion": "1.8.0"}),
                ))
            });

        let health = connector(mock).health().await.unwrap();
        assert!(health.available);
        assert_eq!(health.version.as_deref(), Some("1.8.0"));
    }

    #[tokio::test]
    async fn test_invalid_key_fails_connection_test() {
        let mut mock = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, json!({"status": "available"}))));
        mock.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(response(
                    403,
                    json!({"message": "The provided API key is invalid.", "code": "invalid_api_key", "type": "auth", "link": ""}),
                ))
            });

        let err = connector(mock).health().await.unwrap_err();
        assert!(err.to_string().contains("API key is invalid"));
    }

    #[test]
    fn test_from_settings_trims_host_and_skips_empty_key() {
        let settings = MeilisearchSettings::new("http://localhost:7700/").with_api_key("");
        let connector = MeilisearchConnector::from_settings(Arc::new(MockHttpClient::new()), &settings);
        assert_eq!(connector.host, "http://localhost:7700");
        assert!(connector.api_key.is_none());
        assert_eq!(connector.index_uid(), "vault");
    }
}
