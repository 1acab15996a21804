//! Remote Search Index Abstractions
//!
//! Boundary contract between the synchronization core and the external search
//! service. Every mutating call is asynchronous on the remote side: submission
//! returns a [`TaskHandle`] immediately, and the change is only guaranteed to
//! be visible once [`RemoteIndexClient::status`] reports
//! [`TaskState::Succeeded`].
//!
//! Implementations map the service's loosely-typed responses onto the strongly
//! typed structures below so the core never sees raw JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// Reference to an operation enqueued on the remote index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle {
    /// Remote task identifier
    pub task_uid: u64,
    /// Index the task operates on, when reported
    pub index_uid: Option<String>,
}

impl TaskHandle {
    pub fn new(task_uid: u64) -> Self {
        Self {
            task_uid,
            index_uid: None,
        }
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task#{}", self.task_uid)
    }
}

/// Coarse lifecycle state of a remote task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Enqueued or processing
    Pending,
    Succeeded,
    /// Failed or canceled on the remote side
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

/// Result of a single task-status lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    /// Remote-reported reason, present when `state` is `Failed`
    pub error: Option<String>,
}

impl TaskStatus {
    pub fn pending() -> Self {
        Self {
            state: TaskState::Pending,
            error: None,
        }
    }

    pub fn succeeded() -> Self {
        Self {
            state: TaskState::Succeeded,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: TaskState::Failed,
            error: Some(error.into()),
        }
    }
}

/// Document payload sent to the remote index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    pub name: String,
    pub path: String,
    pub frontmatter: Map<String, Value>,
    pub content: String,
}

/// Index-level settings pushed before a full rebuild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub searchable_attributes: Vec<String>,
    pub displayed_attributes: Vec<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            searchable_attributes: vec![
                "name".to_string(),
                "content".to_string(),
                "path".to_string(),
                "frontmatter".to_string(),
            ],
            displayed_attributes: vec![
                "id".to_string(),
                "name".to_string(),
                "path".to_string(),
                "frontmatter".to_string(),
                "content".to_string(),
            ],
        }
    }
}

/// Mutating operations against the remote index.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::remote_index::RemoteIndexClient;
///
/// async fn wipe(client: &dyn RemoteIndexClient) -> Result<()> {
///     let handle = client.clear().await?;
///     let status = client.status(&handle).await?;
///     println!("{:?}", status.state);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait RemoteIndexClient: Send + Sync {
    /// Upsert documents keyed by `id`
    async fn add_or_update(&self, documents: &[RemoteDocument]) -> Result<TaskHandle>;

    /// Delete documents by remote id
    async fn delete(&self, remote_ids: &[String]) -> Result<TaskHandle>;

    /// Remove every document from the index
    async fn clear(&self) -> Result<TaskHandle>;

    /// Look up the current state of a previously submitted task
    async fn status(&self, handle: &TaskHandle) -> Result<TaskStatus>;

    /// Push searchable/displayed attribute settings
    async fn update_settings(&self, settings: &IndexSettings) -> Result<TaskHandle> {
        let _ = settings;
        Err(BridgeError::NotAvailable("update_settings".to_string()))
    }
}

/// Optional hybrid/semantic search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticQuery {
    /// Name of the embedder configured on the remote index
    pub embedder: String,
    /// 0.0 = pure keyword, 1.0 = pure semantic
    pub ratio: f32,
}

/// Read-only search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub limit: usize,
    pub highlight_fields: Vec<String>,
    pub crop_fields: Vec<String>,
    pub crop_length: usize,
    pub semantic: Option<SemanticQuery>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: 20,
            highlight_fields: vec!["name".to_string(), "content".to_string()],
            crop_fields: vec!["content".to_string()],
            crop_length: 30,
            semantic: None,
        }
    }
}

/// A single ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub path: String,
    /// Cropped, highlighted content excerpt
    pub snippet: Option<String>,
    /// Highlighted title
    pub highlighted_name: Option<String>,
}

/// Search response in remote ranking order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub estimated_total_hits: Option<u64>,
    pub processing_time_ms: u64,
}

/// Outcome of a connection test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub available: bool,
    pub version: Option<String>,
}

/// Read-only operations: querying and connectivity checks.
#[async_trait]
pub trait RemoteSearchClient: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults>;

    async fn health(&self) -> Result<ServiceHealth>;
}
