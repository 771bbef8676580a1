//! Response shapes.
//!
//! - single entity: `{message, oldPath?, newPath?}`
//! - batch: `{summary, results}` plus family-specific fields
//! - error: `{errorCode, message, details?}`

use serde::Serialize;
use serde_json::Value;

use vmr_core::error::{Result, Status, VmrError};

use crate::route::HandlerFamily;

/// The outcome of one executed request.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResponse {
    pub status: Status,
    /// Family that handled the request; `None` when it failed before routing.
    pub handler: Option<HandlerFamily>,
    pub body: Value,
}

impl MutationResponse {
    pub fn new(status: Status, handler: HandlerFamily, body: Value) -> Self {
        Self {
            status,
            handler: Some(handler),
            body,
        }
    }

    pub fn ok(handler: HandlerFamily, body: Value) -> Self {
        Self::new(Status::Ok, handler, body)
    }

    pub fn from_error(err: &VmrError, handler: Option<HandlerFamily>) -> Self {
        let body = ErrorBody {
            error_code: err.error_code(),
            message: err.to_string(),
            details: err.details(),
        };
        Self {
            status: err.status(),
            handler,
            body: serde_json::to_value(body).unwrap_or(Value::Null),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// `body[key]` as a string, if present.
    pub fn body_str(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }
}

/// Body of a single-entity mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
}

impl EntityBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            old_path: None,
            new_path: None,
        }
    }

    pub fn old_path(mut self, path: impl ToString) -> Self {
        self.old_path = Some(path.to_string());
        self
    }

    pub fn new_path(mut self, path: impl ToString) -> Self {
        self.new_path = Some(path.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_code: u32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// Serialize a response body.
///
/// # Errors
///
/// Returns [`VmrError::Serialization`] if `value` cannot be represented as JSON.
pub fn to_body<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| VmrError::Serialization(e.to_string()))
}

/// Add `errorCode` and `message` to a batch body whose items all failed.
pub fn mark_failed(body: &mut Value, err: &VmrError) {
    if let Value::Object(map) = body {
        map.insert("errorCode".to_string(), Value::from(err.error_code()));
        map.insert("message".to_string(), Value::from(err.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_body_omits_absent_paths() {
        let body = to_body(&EntityBody::new("done").new_path("a/b.md")).unwrap();
        assert_eq!(body, serde_json::json!({"message": "done", "newPath": "a/b.md"}));
    }

    #[test]
    fn error_response_carries_code_and_status() {
        let resp = MutationResponse::from_error(&VmrError::DestinationExists("b.md".into()), None);
        assert_eq!(resp.status_code(), 409);
        assert_eq!(resp.body["errorCode"], 40900);
        assert!(resp.body_str("message").unwrap().contains("b.md"));
        assert!(resp.body.get("details").is_none());
    }

    #[test]
    fn mark_failed_keeps_batch_fields() {
        let mut body = serde_json::json!({"summary": {"failed": 2}});
        mark_failed(&mut body, &VmrError::BatchFailed(2));
        assert_eq!(body["errorCode"], 50020);
        assert_eq!(body["summary"]["failed"], 2);
    }
}
