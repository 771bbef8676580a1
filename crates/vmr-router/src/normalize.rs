//! Request normalization: raw attributes to a [`MutationInstruction`].
//!
//! Only checks that need nothing but the request itself happen here.
//! Nothing in this module touches the store.

use vmr_core::error::{Result, VmrError};
use vmr_core::{MutationInstruction, Operation, TargetKind};

use crate::request::{RawRequest, RequestVerb};

/// Attribute names understood by the normalizer.
pub mod attr {
    pub const OPERATION: &str = "Operation";
    pub const TARGET_TYPE: &str = "Target-Type";
    pub const TARGET: &str = "Target";
    pub const TARGET_DELIMITER: &str = "Target-Delimiter";
    pub const CREATE_IF_MISSING: &str = "Create-Target-If-Missing";
    pub const APPLY_IF_EXISTS: &str = "Apply-If-Content-Preexists";
    pub const TRIM_WHITESPACE: &str = "Trim-Target-Whitespace";
    pub const PERMANENT: &str = "Permanent";
    pub const CONTENT_TYPE: &str = "Content-Type";
}

pub const DEFAULT_CONTENT_TYPE: &str = "text/markdown";

/// Build the canonical instruction for `request`.
///
/// Required attributes are checked before any value is parsed, so a request
/// missing `Target-Type` reports that even when `Operation` is garbage.
///
/// # Errors
///
/// - [`VmrError::MissingAttribute`] for an absent `Operation` or `Target-Type`
///   on a patch request
/// - [`VmrError::UnknownOperation`] / [`VmrError::UnknownTargetKind`]
/// - [`VmrError::InvalidAttribute`] for malformed booleans, an undecodable
///   `Target`, or a delete request carrying a non-delete `Operation`
pub fn normalize(request: &RawRequest, default_delimiter: &str) -> Result<MutationInstruction> {
    let (operation, target_kind) = match request.verb {
        RequestVerb::Patch => {
            let op = required(request, attr::OPERATION)?;
            let kind = required(request, attr::TARGET_TYPE)?;
            (op.parse::<Operation>()?, kind.parse::<TargetKind>()?)
        }
        RequestVerb::Delete => {
            if let Some(op) = request.header_value(attr::OPERATION) {
                if op.parse::<Operation>()? != Operation::Delete {
                    return Err(invalid(attr::OPERATION, op));
                }
            }
            let kind = match request.header_value(attr::TARGET_TYPE) {
                Some(kind) => kind.parse::<TargetKind>()?,
                None => TargetKind::File,
            };
            (Operation::Delete, kind)
        }
    };

    let target = request
        .header_value(attr::TARGET)
        .map(decode_target)
        .transpose()?;

    let delimiter = match request.header_value(attr::TARGET_DELIMITER) {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => default_delimiter.to_string(),
    };

    Ok(MutationInstruction {
        operation,
        target_kind,
        target,
        delimiter,
        create_if_missing: flag(request, attr::CREATE_IF_MISSING)?,
        apply_if_exists: flag(request, attr::APPLY_IF_EXISTS)?,
        trim_whitespace: flag(request, attr::TRIM_WHITESPACE)?,
        permanent: flag(request, attr::PERMANENT)?,
        body: request.body.clone(),
        declared_content_type: request
            .header_value(attr::CONTENT_TYPE)
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string(),
        source_path: request.path.clone(),
    })
}

fn required<'r>(request: &'r RawRequest, name: &'static str) -> Result<&'r str> {
    request
        .header_value(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or(VmrError::MissingAttribute(name))
}

fn invalid(name: &'static str, value: &str) -> VmrError {
    VmrError::InvalidAttribute {
        name,
        value: value.to_string(),
    }
}

fn flag(request: &RawRequest, name: &'static str) -> Result<bool> {
    match request.header_value(name) {
        None => Ok(false),
        Some(raw) => match raw.trim() {
            v if v.eq_ignore_ascii_case("true") => Ok(true),
            v if v.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(invalid(name, raw)),
        },
    }
}

fn decode_target(raw: &str) -> Result<String> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| invalid(attr::TARGET, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch() -> RawRequest {
        RawRequest::patch("notes/a.md")
            .header("Operation", "rename")
            .header("Target-Type", "file")
    }

    #[test]
    fn normalizes_defaults() {
        let instr = normalize(&patch(), "::").unwrap();
        assert_eq!(instr.operation, Operation::Rename);
        assert_eq!(instr.target_kind, TargetKind::File);
        assert_eq!(instr.delimiter, "::");
        assert_eq!(instr.declared_content_type, "text/markdown");
        assert!(!instr.create_if_missing && !instr.permanent);
        assert_eq!(instr.source_path, "notes/a.md");
    }

    #[test]
    fn missing_attributes_are_reported_before_parsing() {
        let err = normalize(&RawRequest::patch("a.md").header("Operation", "bogus"), "::")
            .unwrap_err();
        assert!(matches!(err, VmrError::MissingAttribute("Target-Type")));

        let err = normalize(&RawRequest::patch("a.md").header("Target-Type", "file"), "::")
            .unwrap_err();
        assert!(matches!(err, VmrError::MissingAttribute("Operation")));
    }

    #[test]
    fn unknown_values_are_rejected() {
        let req = RawRequest::patch("a.md")
            .header("Operation", "explode")
            .header("Target-Type", "file");
        assert_eq!(normalize(&req, "::").unwrap_err().error_code(), 40021);

        let req = RawRequest::patch("a.md")
            .header("Operation", "move")
            .header("Target-Type", "folder");
        assert_eq!(normalize(&req, "::").unwrap_err().error_code(), 40020);
    }

    #[test]
    fn target_is_percent_decoded() {
        let req = patch().header("target", "my%20note%20%C3%A9.md");
        assert_eq!(
            normalize(&req, "::").unwrap().target.as_deref(),
            Some("my note é.md")
        );

        let req = patch().header("Target", "bad%FF");
        assert!(matches!(
            normalize(&req, "::"),
            Err(VmrError::InvalidAttribute { name: "Target", .. })
        ));
    }

    #[test]
    fn booleans_accept_only_true_or_false() {
        let req = patch().header("Create-Target-If-Missing", "TRUE");
        assert!(normalize(&req, "::").unwrap().create_if_missing);

        let req = patch().header("Trim-Target-Whitespace", "yes");
        assert_eq!(normalize(&req, "::").unwrap_err().error_code(), 40011);
    }

    #[test]
    fn delete_defaults_to_file_target() {
        let instr = normalize(&RawRequest::delete("a.md").header("Permanent", "true"), "::").unwrap();
        assert_eq!(instr.operation, Operation::Delete);
        assert_eq!(instr.target_kind, TargetKind::File);
        assert!(instr.permanent);

        let req = RawRequest::delete("a.md").header("Operation", "move");
        assert_eq!(normalize(&req, "::").unwrap_err().error_code(), 40011);
    }

    #[test]
    fn explicit_delimiter_and_content_type_are_kept() {
        let req = patch()
            .header("Target-Delimiter", "/")
            .header("Content-Type", "application/json");
        let instr = normalize(&req, "::").unwrap();
        assert_eq!(instr.delimiter, "/");
        assert!(instr.body_is_json());
    }
}
