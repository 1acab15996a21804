//! Meilisearch API wire types
//!
//! Data structures for the request and response bodies the connector uses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Summary returned by every asynchronous write
///
/// See: https://www.meilisearch.com/docs/reference/api/tasks#summarized-task-object
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub task_uid: u64,

    #[serde(default)]
    pub index_uid: Option<String>,

    pub status: TaskStatusKind,

    #[serde(rename = "type")]
    pub kind: String,
}

/// Lifecycle of a Meilisearch task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatusKind {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

/// Full task object from `GET /tasks/{uid}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub uid: u64,

    #[serde(default)]
    pub index_uid: Option<String>,

    pub status: TaskStatusKind,

    #[serde(rename = "type")]
    pub kind: String,

    /// Present when `status` is `failed`
    #[serde(default)]
    pub error: Option<ErrorResponse>,
}

/// Error document returned by the service
///
/// See: https://www.meilisearch.com/docs/reference/errors/overview
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorResponse {
    pub message: String,

    pub code: String,

    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub link: String,
}

/// Body of `PATCH /indexes/{uid}/settings`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest<'a> {
    pub searchable_attributes: &'a [String],
    pub displayed_attributes: &'a [String],
}

/// Hybrid search parameters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridRequest<'a> {
    pub embedder: &'a str,
    pub semantic_ratio: f32,
}

/// Body of `POST /indexes/{uid}/search`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest<'a> {
    pub q: &'a str,

    pub limit: usize,

    pub attributes_to_highlight: &'a [String],

    pub attributes_to_crop: &'a [String],

    pub crop_length: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid: Option<HybridRequest<'a>>,
}

/// Response of `POST /indexes/{uid}/search`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub hits: Vec<RawHit>,

    #[serde(default)]
    pub query: String,

    #[serde(default)]
    pub processing_time_ms: u64,

    #[serde(default)]
    pub estimated_total_hits: Option<u64>,
}

/// A hit as returned by the service: stored attributes plus `_formatted`
#[derive(Debug, Clone, Deserialize)]
pub struct RawHit {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub path: String,

    #[serde(rename = "_formatted", default)]
    pub formatted: Option<Map<String, Value>>,
}

impl RawHit {
    /// String attribute from `_formatted`
    pub fn formatted_str(&self, field: &str) -> Option<String> {
        self.formatted
            .as_ref()?
            .get(field)?
            .as_str()
            .map(str::to_string)
    }
}

/// Response of `GET /health`
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Response of `GET /version`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub pkg_version: String,

    #[serde(default)]
    pub commit_sha: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_info_decoding() {
        let body = r#"{"taskUid":12,"indexUid":"vault","status":"enqueued","type":"documentAdditionOrUpdate","enqueuedAt":"2024-01-01T00:00:00Z"}"#;
        let info: TaskInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.task_uid, 12);
        assert_eq!(info.status, TaskStatusKind::Enqueued);
        assert_eq!(info.kind, "documentAdditionOrUpdate");
    }

    #[test]
    fn test_failed_task_decoding() {
        let body = r#"{
            "uid": 4,
            "indexUid": "vault",
            "status": "failed",
            "type": "documentAdditionOrUpdate",
            "error": {
                "message": "Document identifier `a.md` is invalid.",
                "code": "invalid_document_id",
                "type": "invalid_request",
                "link": "https://docs.meilisearch.com/errors#invalid_document_id"
            }
        }"#;
        let task: Task = serde_json::from_str(body).unwrap();
        assert_eq!(task.status, TaskStatusKind::Failed);
        assert_eq!(task.error.unwrap().code, "invalid_document_id");
    }

    #[test]
    fn test_search_request_omits_hybrid_when_disabled() {
        let fields = vec!["content".to_string()];
        let request = SearchRequest {
            q: "rust",
            limit: 20,
            attributes_to_highlight: &fields,
            attributes_to_crop: &fields,
            crop_length: 30,
            hybrid: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["attributesToCrop"][0], "content");
        assert_eq!(json["cropLength"], 30);
        assert!(json.get("hybrid").is_none());
    }
}
