//! # vmr-index
//!
//! SQLite metadata index for VMR.
//!
//! Maintains a derived cache of per-file tags and frontmatter so vault-wide
//! tag operations do not have to parse every file:
//! - `files` table: one row per indexed markdown file with its frontmatter
//! - `file_tags` table: tags in document order with a case-folded lookup key
//!
//! The index can always be rebuilt from the vault with [`TagIndex::rebuild`].

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use vmr_core::error::{Result, VmrError};
use vmr_core::{
    tag_key, EntryKind, FileMetadata, MetadataIndex, Store, VaultConfig, VaultPath,
};
use vmr_parser::extract_metadata;

fn index_err(e: rusqlite::Error) -> VmrError {
    VmrError::Index(e.to_string())
}

/// The tag index database.
pub struct TagIndex {
    conn: Connection,
}

/// A tag and the number of files carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    pub tag: String,
    pub files: usize,
}

impl TagIndex {
    /// Open or create an index database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::Index`] if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(index_err)?;
        let index = Self { conn };
        index.create_schema()?;
        Ok(index)
    }

    /// Create an in-memory index (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::Index`] if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(index_err)?;
        let index = Self { conn };
        index.create_schema()?;
        Ok(index)
    }

    fn create_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                frontmatter TEXT,
                indexed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS file_tags (
                path TEXT NOT NULL,
                position INTEGER NOT NULL,
                tag TEXT NOT NULL,
                tag_key TEXT NOT NULL,
                PRIMARY KEY (path, position)
            );

            CREATE INDEX IF NOT EXISTS idx_file_tags_key ON file_tags(tag_key);
            ",
            )
            .map_err(index_err)?;
        Ok(())
    }

    /// Drop everything and re-index every markdown file in `store`, skipping
    /// the config's ignored directories. Returns the number of files indexed.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::Index`] on database failure or the store's error
    /// if a directory cannot be listed.
    pub fn rebuild(&self, store: &dyn Store, config: &VaultConfig) -> Result<usize> {
        let tx = self.conn.unchecked_transaction().map_err(index_err)?;
        tx.execute_batch("DELETE FROM file_tags; DELETE FROM files;")
            .map_err(index_err)?;

        let mut indexed = 0;
        let mut pending = vec![VaultPath::root()];
        while let Some(dir) = pending.pop() {
            for entry in store.list(&dir)? {
                if config.is_ignored(&entry.path) {
                    continue;
                }
                match entry.kind {
                    EntryKind::Directory => pending.push(entry.path),
                    EntryKind::File if entry.path.extension() == Some("md") => {
                        let contents = match store.read_to_string(&entry.path) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(file = %entry.path, error = %e, "skipping unreadable file");
                                continue;
                            }
                        };
                        write_entry(&tx, &entry.path, &extract_metadata(&contents))?;
                        indexed += 1;
                    }
                    EntryKind::File => {}
                }
            }
        }

        tx.commit().map_err(index_err)?;
        debug!(files = indexed, "rebuilt tag index");
        Ok(indexed)
    }

    /// Number of indexed files.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::Index`] if the query fails.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
            .map_err(index_err)?;
        Ok(count as usize)
    }

    /// Every tag in the vault with its file count, most used first.
    /// Spellings differing only in case are reported once.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::Index`] if the query fails.
    pub fn tag_counts(&self) -> Result<Vec<TagCount>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT MIN(tag), COUNT(DISTINCT path) AS n
                 FROM file_tags
                 GROUP BY tag_key
                 ORDER BY n DESC, tag_key",
            )
            .map_err(index_err)?;

        let counts = stmt
            .query_map([], |row| {
                Ok(TagCount {
                    tag: row.get(0)?,
                    files: row.get::<_, i64>(1)? as usize,
                })
            })
            .map_err(index_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(index_err)?;
        Ok(counts)
    }
}

fn write_entry(conn: &Connection, path: &VaultPath, meta: &FileMetadata) -> Result<()> {
    let frontmatter = match &meta.frontmatter {
        serde_json::Value::Null => None,
        value => Some(value.to_string()),
    };
    conn.execute("DELETE FROM file_tags WHERE path = ?1", params![path.as_str()])
        .map_err(index_err)?;
    conn.execute(
        "INSERT OR REPLACE INTO files (path, frontmatter, indexed_at) VALUES (?1, ?2, ?3)",
        params![path.as_str(), frontmatter, chrono::Utc::now().to_rfc3339()],
    )
    .map_err(index_err)?;
    for (position, tag) in meta.tags.iter().enumerate() {
        conn.execute(
            "INSERT INTO file_tags (path, position, tag, tag_key) VALUES (?1, ?2, ?3, ?4)",
            params![path.as_str(), position as i64, tag, tag_key(tag)],
        )
        .map_err(index_err)?;
    }
    Ok(())
}

fn delete_entry(conn: &Connection, path: &VaultPath) -> Result<()> {
    conn.execute("DELETE FROM file_tags WHERE path = ?1", params![path.as_str()])
        .map_err(index_err)?;
    conn.execute("DELETE FROM files WHERE path = ?1", params![path.as_str()])
        .map_err(index_err)?;
    Ok(())
}

fn parse_stored_path(raw: String) -> Result<VaultPath> {
    VaultPath::parse(&raw).map_err(|e| VmrError::Index(format!("corrupt path '{raw}': {e}")))
}

impl MetadataIndex for TagIndex {
    fn metadata(&self, path: &VaultPath) -> Result<Option<FileMetadata>> {
        let row: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT frontmatter FROM files WHERE path = ?1",
                params![path.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(index_err)?;
        let Some(frontmatter) = row else {
            return Ok(None);
        };

        let frontmatter = match frontmatter {
            Some(text) => serde_json::from_str(&text)
                .map_err(|e| VmrError::Index(format!("corrupt frontmatter for {path}: {e}")))?,
            None => serde_json::Value::Null,
        };

        let mut stmt = self
            .conn
            .prepare("SELECT tag FROM file_tags WHERE path = ?1 ORDER BY position")
            .map_err(index_err)?;
        let tags = stmt
            .query_map(params![path.as_str()], |row| row.get(0))
            .map_err(index_err)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(index_err)?;

        Ok(Some(FileMetadata { tags, frontmatter }))
    }

    fn files_with_tag(&self, tag: &str) -> Result<Vec<VaultPath>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT path FROM file_tags WHERE tag_key = ?1 ORDER BY path")
            .map_err(index_err)?;
        let rows = stmt
            .query_map(params![tag_key(tag)], |row| row.get::<_, String>(0))
            .map_err(index_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(index_err)?;
        rows.into_iter().map(parse_stored_path).collect()
    }

    fn refresh(&self, path: &VaultPath, contents: &str) -> Result<()> {
        let meta = extract_metadata(contents);
        let tx = self.conn.unchecked_transaction().map_err(index_err)?;
        write_entry(&tx, path, &meta)?;
        tx.commit().map_err(index_err)?;
        debug!(path = %path, tags = meta.tags.len(), "refreshed index entry");
        Ok(())
    }

    fn forget(&self, path: &VaultPath) -> Result<()> {
        let tx = self.conn.unchecked_transaction().map_err(index_err)?;
        delete_entry(&tx, path)?;
        tx.commit().map_err(index_err)?;
        Ok(())
    }

    fn relocate(&self, from: &VaultPath, to: &VaultPath) -> Result<()> {
        let tx = self.conn.unchecked_transaction().map_err(index_err)?;
        delete_entry(&tx, to)?;
        tx.execute(
            "UPDATE files SET path = ?2 WHERE path = ?1",
            params![from.as_str(), to.as_str()],
        )
        .map_err(index_err)?;
        tx.execute(
            "UPDATE file_tags SET path = ?2 WHERE path = ?1",
            params![from.as_str(), to.as_str()],
        )
        .map_err(index_err)?;
        tx.commit().map_err(index_err)?;
        Ok(())
    }
}
