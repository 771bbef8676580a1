//! Content patches and the structural patcher contract.
//!
//! The router decides when a heading, block or frontmatter patch applies and
//! interprets the patcher's verdict; the text surgery itself belongs to a
//! [`StructuralPatcher`]. [`FrontmatterFieldPatcher`] handles frontmatter
//! fields and rejects heading and block patches.

use serde_yaml::{Mapping, Value};
use thiserror::Error;

use vmr_core::frontmatter::{parse_frontmatter, render_frontmatter};
use vmr_core::{MutationInstruction, Operation, TargetKind, VaultPath, VmrError};

use crate::engine::MutationEngine;
use crate::response::{to_body, EntityBody, MutationResponse};
use crate::route::HandlerFamily;

/// Why a patcher did not produce new content.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The request cannot be applied to this content (client error).
    #[error("{0}")]
    Rejected(String),

    /// The patcher itself failed.
    #[error("{0}")]
    Failed(String),
}

impl From<PatchError> for VmrError {
    fn from(err: PatchError) -> Self {
        match err {
            PatchError::Rejected(msg) => VmrError::PatchRejected(msg),
            PatchError::Failed(msg) => VmrError::Store(msg),
        }
    }
}

/// Everything a patcher needs from the instruction.
#[derive(Debug, Clone, Copy)]
pub struct PatchInstruction<'a> {
    pub operation: Operation,
    pub target_kind: TargetKind,
    pub target: &'a str,
    pub delimiter: &'a str,
    pub create_if_missing: bool,
    pub apply_if_exists: bool,
    pub trim_whitespace: bool,
    pub content: &'a [u8],
    pub content_type: &'a str,
}

impl PatchInstruction<'_> {
    fn content_is_json(&self) -> bool {
        self.content_type
            .split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
    }
}

/// Applies a content patch to a file's text.
pub trait StructuralPatcher {
    /// Return the patched content of `path`.
    ///
    /// # Errors
    ///
    /// [`PatchError::Rejected`] when the patch does not apply,
    /// [`PatchError::Failed`] when the patcher breaks.
    fn apply(
        &self,
        path: &VaultPath,
        content: &str,
        instruction: &PatchInstruction<'_>,
    ) -> Result<String, PatchError>;
}

/// Patches top-level or nested frontmatter fields.
///
/// `target` names the field; nested fields are joined with the delimiter
/// (`parent::child`). JSON content is stored as structured YAML, anything
/// else as a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontmatterFieldPatcher;

impl StructuralPatcher for FrontmatterFieldPatcher {
    fn apply(
        &self,
        _path: &VaultPath,
        content: &str,
        instruction: &PatchInstruction<'_>,
    ) -> Result<String, PatchError> {
        if instruction.target_kind != TargetKind::Frontmatter {
            return Err(PatchError::Rejected(format!(
                "{} patches are not supported by the frontmatter patcher",
                instruction.target_kind
            )));
        }

        let (frontmatter, body) =
            parse_frontmatter(content).map_err(|e| PatchError::Rejected(e.to_string()))?;
        let mut map = frontmatter.unwrap_or_default();

        let target = if instruction.trim_whitespace {
            instruction.target.trim()
        } else {
            instruction.target
        };
        let keys: Vec<&str> = target.split(instruction.delimiter).collect();
        if keys.iter().any(|k| k.is_empty()) {
            return Err(PatchError::Rejected(format!("invalid field path '{target}'")));
        }

        let value = patch_value(instruction)?;
        let slot = field_slot(&mut map, &keys, instruction.create_if_missing)?;
        apply_to_slot(slot, value, instruction)?;

        render_frontmatter(Some(&map), body).map_err(|e| PatchError::Failed(e.to_string()))
    }
}

fn patch_value(instruction: &PatchInstruction<'_>) -> Result<Value, PatchError> {
    let text = std::str::from_utf8(instruction.content)
        .map_err(|_| PatchError::Rejected("patch content is not valid UTF-8".to_string()))?;
    if instruction.content_is_json() {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| PatchError::Rejected(format!("invalid JSON content: {e}")))?;
        serde_yaml::to_value(json).map_err(|e| PatchError::Failed(e.to_string()))
    } else if instruction.trim_whitespace {
        Ok(Value::String(text.trim().to_string()))
    } else {
        Ok(Value::String(text.to_string()))
    }
}

/// Walk to the field at `keys`, creating missing levels when allowed.
/// A missing leaf is returned as `Null`.
fn field_slot<'m>(
    map: &'m mut Mapping,
    keys: &[&str],
    create: bool,
) -> Result<&'m mut Value, PatchError> {
    let (leaf, parents) = keys
        .split_last()
        .ok_or_else(|| PatchError::Rejected("empty field path".to_string()))?;

    let mut current = map;
    for key in parents {
        let name = Value::String((*key).to_string());
        if !current.contains_key(&name) {
            if !create {
                return Err(PatchError::Rejected(format!("field '{key}' does not exist")));
            }
            current.insert(name.clone(), Value::Mapping(Mapping::new()));
        }
        current = match current.get_mut(&name) {
            Some(Value::Mapping(inner)) => inner,
            _ => return Err(PatchError::Rejected(format!("field '{key}' is not a mapping"))),
        };
    }

    let name = Value::String((*leaf).to_string());
    if !current.contains_key(&name) {
        if !create {
            return Err(PatchError::Rejected(format!("field '{leaf}' does not exist")));
        }
        current.insert(name.clone(), Value::Null);
    }
    current
        .get_mut(&name)
        .ok_or_else(|| PatchError::Failed(format!("field '{leaf}' vanished")))
}

fn apply_to_slot(
    slot: &mut Value,
    value: Value,
    instruction: &PatchInstruction<'_>,
) -> Result<(), PatchError> {
    let prepend = match instruction.operation {
        Operation::Replace => {
            *slot = value;
            return Ok(());
        }
        Operation::Append => false,
        Operation::Prepend => true,
        other => {
            return Err(PatchError::Rejected(format!(
                "'{other}' is not a content patch operation"
            )))
        }
    };

    match slot {
        Value::Null => *slot = value,
        Value::Sequence(items) => {
            let incoming = match value {
                Value::Sequence(values) => values,
                single => vec![single],
            };
            if !instruction.apply_if_exists && incoming.iter().all(|v| items.contains(v)) {
                return Err(PatchError::Rejected("content already present".to_string()));
            }
            if prepend {
                items.splice(0..0, incoming);
            } else {
                items.extend(incoming);
            }
        }
        Value::String(existing) => {
            let Value::String(addition) = value else {
                return Err(PatchError::Rejected(
                    "only text can be added to a text field".to_string(),
                ));
            };
            if !instruction.apply_if_exists && existing.contains(&addition) {
                return Err(PatchError::Rejected("content already present".to_string()));
            }
            *existing = if prepend {
                format!("{addition}{existing}")
            } else {
                format!("{existing}{addition}")
            };
        }
        _ => {
            return Err(PatchError::Rejected(
                "append and prepend need a list or text field".to_string(),
            ))
        }
    }
    Ok(())
}

impl MutationEngine<'_> {
    /// Apply a heading, block or frontmatter patch through the patcher.
    pub(crate) fn patch_content(
        &self,
        instruction: &MutationInstruction,
    ) -> vmr_core::Result<MutationResponse> {
        let path = Self::source_path(instruction)?;
        self.require_file(&path)?;
        let target = instruction
            .target
            .as_deref()
            .ok_or(VmrError::MissingAttribute(crate::normalize::attr::TARGET))?;

        let content = self.store.read_to_string(&path)?;
        let patch = PatchInstruction {
            operation: instruction.operation,
            target_kind: instruction.target_kind,
            target,
            delimiter: &instruction.delimiter,
            create_if_missing: instruction.create_if_missing,
            apply_if_exists: instruction.apply_if_exists,
            trim_whitespace: instruction.trim_whitespace,
            content: &instruction.body,
            content_type: &instruction.declared_content_type,
        };
        let patched = self.patcher.apply(&path, &content, &patch)?;

        if patched != content {
            self.store.write(&path, patched.as_bytes())?;
            self.index_refresh(&path, &patched);
        }
        let body = to_body(&EntityBody::new("File successfully patched").new_path(&path))?;
        Ok(MutationResponse::ok(HandlerFamily::ContentPatch, body))
    }
}
