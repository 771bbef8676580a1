//! Error types and response status codes for VMR.

use serde::Serialize;
use thiserror::Error;

/// Top-level result type for VMR operations.
pub type Result<T> = std::result::Result<T, VmrError>;

/// Response status of an executed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Ok,
    MultiStatus,
    BadRequest,
    NotFound,
    Conflict,
    InternalError,
}

impl Status {
    /// Numeric HTTP-style status code.
    pub fn as_u16(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::MultiStatus => 207,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::Conflict => 409,
            Status::InternalError => 500,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Status::Ok | Status::MultiStatus)
    }
}

/// Top-level error type for VMR.
///
/// Every variant maps to a stable numeric code ([`VmrError::error_code`])
/// and a response status ([`VmrError::status`]). Messages carry vault-relative
/// paths only.
#[derive(Debug, Error)]
pub enum VmrError {
    // === Validation (400) ===
    #[error("missing required attribute '{0}'")]
    MissingAttribute(&'static str),

    #[error("invalid value '{value}' for attribute '{name}'")]
    InvalidAttribute { name: &'static str, value: String },

    #[error("unknown target type '{0}'")]
    UnknownTargetKind(String),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("operation '{operation}' is not supported for target type '{kind}'")]
    UnsupportedOperation { kind: String, operation: String },

    #[error("invalid tag '{tag}': {reason}")]
    InvalidTag { tag: String, reason: String },

    #[error("invalid vault path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("no tags supplied")]
    EmptyTagList,

    #[error("invalid destination '{path}': {reason}")]
    InvalidDestination { path: String, reason: String },

    #[error("refusing to modify protected path '{0}'")]
    ProtectedPath(String),

    #[error("content patch rejected: {0}")]
    PatchRejected(String),

    // === Not found (404) ===
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("tag '{0}' was not found in any file")]
    TagNotFound(String),

    #[error("cannot edit tags: file not found: {0}")]
    TagTargetNotFound(String),

    // === Conflict (409) ===
    #[error("destination already exists: {0}")]
    DestinationExists(String),

    #[error("path exists as a file: {0}")]
    PathIsFile(String),

    // === Internal (500) ===
    #[error("store error: {0}")]
    Store(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("failed at '{failed}': {reason}; all completed steps were rolled back")]
    RolledBack { failed: String, reason: String },

    #[error(
        "failed at '{failed}': {reason}; rollback incomplete, {} file(s) left at their new location",
        .unrestored.len()
    )]
    RollbackIncomplete {
        failed: String,
        reason: String,
        unrestored: Vec<UnrestoredItem>,
    },

    #[error("all {0} batch item(s) failed")]
    BatchFailed(usize),
}

/// A file a compensating step could not put back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnrestoredItem {
    /// Where the file was supposed to be restored to.
    pub original_path: String,
    /// Where the file currently is.
    pub current_path: String,
    pub message: String,
}

impl VmrError {
    /// Stable numeric error code for clients.
    pub fn error_code(&self) -> u32 {
        match self {
            Self::MissingAttribute(_) => 40010,
            Self::InvalidAttribute { .. } => 40011,
            Self::UnknownTargetKind(_) => 40020,
            Self::UnknownOperation(_) => 40021,
            Self::UnsupportedOperation { .. } => 40022,
            Self::InvalidTag { .. } => 40030,
            Self::InvalidPath { .. } => 40031,
            Self::InvalidBody(_) => 40032,
            Self::EmptyTagList => 40033,
            Self::InvalidDestination { .. } => 40034,
            Self::ProtectedPath(_) => 40035,
            Self::PatchRejected(_) => 40050,
            Self::FileNotFound(_) => 40400,
            Self::DirectoryNotFound(_) => 40401,
            Self::TagNotFound(_) => 40402,
            Self::TagTargetNotFound(_) => 40410,
            Self::DestinationExists(_) => 40900,
            Self::PathIsFile(_) => 40901,
            Self::Store(_) => 50000,
            Self::Index(_) => 50001,
            Self::Io(_) => 50002,
            Self::Serialization(_) => 50003,
            Self::Config(_) => 50004,
            Self::RolledBack { .. } => 50010,
            Self::RollbackIncomplete { .. } => 50011,
            Self::BatchFailed(_) => 50020,
        }
    }

    /// Response status this error maps to.
    pub fn status(&self) -> Status {
        match self.error_code() / 100 {
            400 => Status::BadRequest,
            404 => Status::NotFound,
            409 => Status::Conflict,
            _ => Status::InternalError,
        }
    }

    /// Structured context attached to the error response, if any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::RolledBack { failed, .. } => Some(serde_json::json!({
                "failedFile": failed,
                "rolledBack": true,
            })),
            Self::RollbackIncomplete {
                failed, unrestored, ..
            } => Some(serde_json::json!({
                "failedFile": failed,
                "rolledBack": false,
                "unrestored": unrestored,
            })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_display_human_readable_messages() {
        let err = VmrError::UnsupportedOperation {
            kind: "tag".to_string(),
            operation: "append".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("tag"));
        assert!(msg.contains("append"));

        let err = VmrError::MissingAttribute("Operation");
        assert!(err.to_string().contains("Operation"));
    }

    #[test]
    fn error_codes_map_to_statuses() {
        assert_eq!(VmrError::EmptyTagList.status(), Status::BadRequest);
        assert_eq!(
            VmrError::FileNotFound("a.md".into()).status(),
            Status::NotFound
        );
        assert_eq!(
            VmrError::TagTargetNotFound("a.md".into()).status(),
            Status::NotFound
        );
        assert_eq!(
            VmrError::DestinationExists("a.md".into()).status(),
            Status::Conflict
        );
        assert_eq!(VmrError::Store("boom".into()).status(), Status::InternalError);
        assert_eq!(VmrError::BatchFailed(3).status(), Status::InternalError);
    }

    #[test]
    fn rollback_incomplete_details_list_every_file() {
        let err = VmrError::RollbackIncomplete {
            failed: "projects/b.md".into(),
            reason: "disk full".into(),
            unrestored: vec![UnrestoredItem {
                original_path: "projects/a.md".into(),
                current_path: "archive/projects/a.md".into(),
                message: "permission denied".into(),
            }],
        };
        let details = err.details().unwrap();
        assert_eq!(details["failedFile"], "projects/b.md");
        assert_eq!(details["unrestored"][0]["originalPath"], "projects/a.md");
        assert_eq!(details["unrestored"][0]["currentPath"], "archive/projects/a.md");
        assert!(err.to_string().contains("1 file(s)"));
    }

    #[test]
    fn status_codes_are_numeric() {
        assert_eq!(Status::MultiStatus.as_u16(), 207);
        assert!(Status::MultiStatus.is_success());
        assert!(!Status::Conflict.is_success());
    }
}
