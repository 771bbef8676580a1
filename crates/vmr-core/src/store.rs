//! Collaborator contracts consumed by the mutation engine.
//!
//! The engine never touches the filesystem directly. It talks to three
//! narrow interfaces:
//! - [`Store`]: file contents and directory layout
//! - [`LinkRenamer`]: a rename that also rewrites references to the old path
//! - [`MetadataIndex`]: parsed tags and frontmatter per file
//!
//! Any conforming implementation works, whether filesystem-backed or an
//! in-memory test double.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VmrError};
use crate::path::{EntryKind, VaultEntry, VaultPath};

/// File store rooted at the vault.
pub trait Store {
    /// Kind of the entry at `path`, `None` if nothing exists there.
    fn kind_of(&self, path: &VaultPath) -> Result<Option<EntryKind>>;

    fn exists(&self, path: &VaultPath) -> Result<bool> {
        Ok(self.kind_of(path)?.is_some())
    }

    /// Raw file contents.
    fn read(&self, path: &VaultPath) -> Result<Vec<u8>>;

    /// Contents decoded as UTF-8 text.
    fn read_to_string(&self, path: &VaultPath) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes)
            .map_err(|_| VmrError::Store(format!("{path}: file is not valid UTF-8")))
    }

    /// Create or overwrite a file. The parent directory must exist.
    fn write(&self, path: &VaultPath, contents: &[u8]) -> Result<()>;

    /// Direct children of a directory, sorted by path.
    fn list(&self, dir: &VaultPath) -> Result<Vec<VaultEntry>>;

    /// Create a directory and any missing ancestors.
    fn create_dir_all(&self, path: &VaultPath) -> Result<()>;

    fn remove_file(&self, path: &VaultPath) -> Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &VaultPath) -> Result<()>;

    /// Move a file without touching references to it.
    fn relocate(&self, from: &VaultPath, to: &VaultPath) -> Result<()>;
}

/// Rename primitive that keeps internal links pointing at the file.
///
/// Implementations must leave no observable intermediate state: either the
/// file and every rewritten reference end up at the new path, or nothing
/// changes.
pub trait LinkRenamer {
    fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<()>;
}

/// Parsed metadata of one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Frontmatter and inline tags, without the `#` marker, first
    /// occurrence wins.
    pub tags: Vec<String>,
    /// Frontmatter as a JSON object, `Null` if the file has none.
    pub frontmatter: serde_json::Value,
}

impl FileMetadata {
    /// Case-insensitive exact tag membership.
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag_key(tag);
        self.tags.iter().any(|t| tag_key(t) == wanted)
    }
}

/// Comparison key for a tag: marker stripped, lowercased.
pub fn tag_key(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_lowercase()
}

/// Metadata index over the vault's files.
pub trait MetadataIndex {
    /// Indexed metadata for `path`, `None` if the file is not indexed.
    fn metadata(&self, path: &VaultPath) -> Result<Option<FileMetadata>>;

    /// Files whose metadata contains `tag` exactly (case-insensitive).
    fn files_with_tag(&self, tag: &str) -> Result<Vec<VaultPath>>;

    /// Re-derive metadata for `path` from its new contents.
    fn refresh(&self, path: &VaultPath, contents: &str) -> Result<()>;

    /// Drop `path` from the index.
    fn forget(&self, path: &VaultPath) -> Result<()>;

    /// Carry the metadata of `from` over to `to`.
    fn relocate(&self, from: &VaultPath, to: &VaultPath) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_tag_is_exact_and_case_insensitive() {
        let meta = FileMetadata {
            tags: vec!["Project".into(), "project/archived".into()],
            frontmatter: serde_json::Value::Null,
        };
        assert!(meta.has_tag("project"));
        assert!(meta.has_tag("PROJECT/archived"));
        assert!(!meta.has_tag("archived"));
        assert!(!meta.has_tag("proj"));
        assert!(meta.has_tag("#project"));
    }
}
