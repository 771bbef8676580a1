//! The canonical mutation instruction produced by request normalization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VmrError;

/// Mutation verb carried by the `Operation` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Append,
    Prepend,
    Replace,
    Rename,
    Move,
    Copy,
    Add,
    Remove,
    Create,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::Append,
        Operation::Prepend,
        Operation::Replace,
        Operation::Rename,
        Operation::Move,
        Operation::Copy,
        Operation::Add,
        Operation::Remove,
        Operation::Create,
        Operation::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Append => "append",
            Operation::Prepend => "prepend",
            Operation::Replace => "replace",
            Operation::Rename => "rename",
            Operation::Move => "move",
            Operation::Copy => "copy",
            Operation::Add => "add",
            Operation::Remove => "remove",
            Operation::Create => "create",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = VmrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| VmrError::UnknownOperation(wanted.to_string()))
    }
}

/// Kind of entity a mutation addresses (`Target-Type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Heading,
    Block,
    Frontmatter,
    File,
    Directory,
    Tag,
}

impl TargetKind {
    pub const ALL: [TargetKind; 6] = [
        TargetKind::Heading,
        TargetKind::Block,
        TargetKind::Frontmatter,
        TargetKind::File,
        TargetKind::Directory,
        TargetKind::Tag,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Heading => "heading",
            TargetKind::Block => "block",
            TargetKind::Frontmatter => "frontmatter",
            TargetKind::File => "file",
            TargetKind::Directory => "directory",
            TargetKind::Tag => "tag",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = VmrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TargetKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| VmrError::UnknownTargetKind(wanted.to_string()))
    }
}

/// A fully normalized mutation request.
///
/// `target` is interpreted by the handler family selected for
/// `(target_kind, operation)`: a patch locator, a new file name or path, a
/// destination directory, a legacy single tag, or a new tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationInstruction {
    pub operation: Operation,
    pub target_kind: TargetKind,
    pub target: Option<String>,
    pub delimiter: String,
    pub create_if_missing: bool,
    pub apply_if_exists: bool,
    pub trim_whitespace: bool,
    pub permanent: bool,
    pub body: Vec<u8>,
    pub declared_content_type: String,
    /// Request path: a vault path, or the old tag for a vault-wide tag rename.
    pub source_path: String,
}

impl MutationInstruction {
    /// `target` with surrounding whitespace removed, `None` if blank.
    pub fn target_str(&self) -> Option<&str> {
        self.target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Whether the body was declared as JSON.
    pub fn body_is_json(&self) -> bool {
        self.declared_content_type
            .split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
    }

    pub fn has_body(&self) -> bool {
        !self.body.iter().all(u8::is_ascii_whitespace)
    }
}
