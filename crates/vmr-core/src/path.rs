//! Vault-relative paths and entries.
//!
//! A [`VaultPath`] is always relative to the vault root, forward-slash
//! separated, free of `.`/`..` segments and of leading or trailing slashes.
//! The empty path denotes the vault root itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VmrError;

/// A normalized path inside the vault.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VaultPath(String);

impl VaultPath {
    /// The vault root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse and normalize a user-supplied path.
    ///
    /// Backslashes are treated as separators, a leading slash is dropped,
    /// empty and `.` segments are collapsed.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::InvalidPath`] if the path contains a `..` segment,
    /// a NUL byte, or a drive prefix, any of which could escape the vault.
    pub fn parse(raw: &str) -> Result<Self, VmrError> {
        let invalid = |reason: &str| VmrError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.contains('\0') {
            return Err(invalid("contains a NUL byte"));
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split(['/', '\\']) {
            match segment.trim() {
                "" | "." => continue,
                ".." => return Err(invalid("parent directory segments are not allowed")),
                s if segments.is_empty() && s.len() == 2 && s.ends_with(':') => {
                    return Err(invalid("drive prefixes are not allowed"));
                }
                _ => segments.push(segment),
            }
        }

        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Last path segment (empty for the root).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// File name without its final extension.
    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(pos) => &name[..pos],
        }
    }

    /// Extension of the final segment, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(pos) => Some(&name[pos + 1..]),
        }
    }

    /// Parent directory, `None` for the root.
    pub fn parent(&self) -> Option<VaultPath> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(pos) => Self(self.0[..pos].to_string()),
            None => Self::root(),
        })
    }

    /// Append a relative path. `rel` must already be normalized.
    pub fn join(&self, rel: &str) -> VaultPath {
        let rel = rel.trim_matches('/');
        if self.is_root() {
            Self(rel.to_string())
        } else if rel.is_empty() {
            self.clone()
        } else {
            Self(format!("{}/{}", self.0, rel))
        }
    }

    /// Replace the final segment with `name`.
    pub fn with_file_name(&self, name: &str) -> VaultPath {
        match self.parent() {
            Some(parent) => parent.join(name),
            None => Self(name.to_string()),
        }
    }

    /// Whether `self` is `ancestor` or lies beneath it.
    pub fn starts_with(&self, ancestor: &VaultPath) -> bool {
        ancestor.is_root()
            || self.0 == ancestor.0
            || (self.0.starts_with(&ancestor.0) && self.0[ancestor.0.len()..].starts_with('/'))
    }

    /// Path of `self` relative to `ancestor`, if it lies beneath it.
    pub fn strip_prefix(&self, ancestor: &VaultPath) -> Option<&str> {
        if ancestor.is_root() {
            return Some(&self.0);
        }
        if self.0 == ancestor.0 {
            return Some("");
        }
        self.0
            .strip_prefix(&ancestor.0)
            .and_then(|rest| rest.strip_prefix('/'))
    }

    /// Every ancestor directory from the outermost down to the direct parent.
    pub fn ancestors(&self) -> Vec<VaultPath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(p) = current {
            if p.is_root() {
                break;
            }
            current = p.parent();
            out.push(p);
        }
        out.reverse();
        out
    }
}

impl fmt::Display for VaultPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl TryFrom<String> for VaultPath {
    type Error = VmrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VaultPath> for String {
    fn from(value: VaultPath) -> Self {
        value.0
    }
}

/// Kind of a vault entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A file or directory in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntry {
    pub path: VaultPath,
    pub kind: EntryKind,
}

impl VaultEntry {
    pub fn file(path: VaultPath) -> Self {
        Self {
            path,
            kind: EntryKind::File,
        }
    }

    pub fn directory(path: VaultPath) -> Self {
        Self {
            path,
            kind: EntryKind::Directory,
        }
    }
}
