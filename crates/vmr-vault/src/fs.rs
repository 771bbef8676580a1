//! Filesystem-backed vault store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use vmr_core::error::{Result, VmrError};
use vmr_core::{EntryKind, LinkRenamer, Store, VaultConfig, VaultEntry, VaultPath};
use vmr_parser::rewrite_links;

/// A vault rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
    config: VaultConfig,
}

impl FsVault {
    /// Open the vault at `root`, loading `.vmr/config.toml` if present.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::Store`] if `root` is not an existing directory,
    /// or [`VmrError::Config`] if the config file is malformed.
    pub fn open(root: &Path) -> Result<Self> {
        let config = VaultConfig::load(root)?;
        Self::with_config(root, config)
    }

    /// Open the vault at `root` with an explicit config.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::Store`] if `root` is not an existing directory.
    pub fn with_config(root: &Path, config: VaultConfig) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| VmrError::Store(format!("cannot open vault: {e}")))?;
        if !root.is_dir() {
            return Err(VmrError::Store("vault root is not a directory".to_string()));
        }
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Absolute location of `path`. Refuses locations that resolve outside
    /// the root through symlinks.
    fn resolve(&self, path: &VaultPath) -> Result<PathBuf> {
        let joined = self.root.join(path.as_str());
        let mut cursor = joined.as_path();
        loop {
            if cursor.exists() {
                let canonical = cursor.canonicalize().map_err(|e| io_error(path, e))?;
                if !canonical.starts_with(&self.root) {
                    return Err(VmrError::ProtectedPath(path.to_string()));
                }
                break;
            }
            match cursor.parent() {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        Ok(joined)
    }

    /// Every markdown file in the vault outside ignored directories, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::Store`] if a directory cannot be read.
    pub fn markdown_files(&self) -> Result<Vec<VaultPath>> {
        let mut out = Vec::new();
        let mut pending = vec![VaultPath::root()];
        while let Some(dir) = pending.pop() {
            for entry in self.list(&dir)? {
                if self.config.is_ignored(&entry.path) {
                    continue;
                }
                match entry.kind {
                    EntryKind::Directory => pending.push(entry.path),
                    EntryKind::File if entry.path.extension() == Some("md") => {
                        out.push(entry.path);
                    }
                    EntryKind::File => {}
                }
            }
        }
        out.sort();
        Ok(out)
    }

    fn rename_with_rewrites(&self, from: &VaultPath, to: &VaultPath) -> Result<()> {
        let mut rewrites: Vec<(VaultPath, String, String)> = Vec::new();
        for file in self.markdown_files()? {
            let original = match self.read_to_string(&file) {
                Ok(text) => text,
                Err(e) => {
                    warn!(file = %file, error = %e, "skipping unreadable file during link rewrite");
                    continue;
                }
            };
            if let Some(rewritten) = rewrite_links(&original, from, to) {
                let location = if &file == from { to.clone() } else { file };
                rewrites.push((location, original, rewritten));
            }
        }

        self.relocate(from, to)?;

        for (i, (file, _, rewritten)) in rewrites.iter().enumerate() {
            if let Err(e) = self.write(file, rewritten.as_bytes()) {
                warn!(file = %file, error = %e, "link rewrite failed, restoring previous state");
                for (done, original, _) in rewrites[..i].iter().rev() {
                    if let Err(restore) = self.write(done, original.as_bytes()) {
                        warn!(file = %done, error = %restore, "could not restore file contents");
                    }
                }
                if let Err(back) = self.relocate(to, from) {
                    warn!(from = %to, to = %from, error = %back, "could not move file back");
                }
                return Err(e);
            }
        }

        debug!(from = %from, to = %to, rewritten = rewrites.len(), "renamed with link rewrite");
        Ok(())
    }
}

fn io_error(path: &VaultPath, e: std::io::Error) -> VmrError {
    VmrError::Store(format!("{path}: {e}"))
}

impl Store for FsVault {
    fn kind_of(&self, path: &VaultPath) -> Result<Option<EntryKind>> {
        let abs = self.resolve(path)?;
        match fs::metadata(&abs) {
            Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Directory)),
            Ok(_) => Ok(Some(EntryKind::File)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(path, e)),
        }
    }

    fn read(&self, path: &VaultPath) -> Result<Vec<u8>> {
        fs::read(self.resolve(path)?).map_err(|e| io_error(path, e))
    }

    fn write(&self, path: &VaultPath, contents: &[u8]) -> Result<()> {
        if path.is_root() {
            return Err(VmrError::ProtectedPath(path.to_string()));
        }
        fs::write(self.resolve(path)?, contents).map_err(|e| io_error(path, e))
    }

    fn list(&self, dir: &VaultPath) -> Result<Vec<VaultEntry>> {
        let abs = self.resolve(dir)?;
        let mut entries = Vec::new();
        for entry in fs::read_dir(&abs).map_err(|e| io_error(dir, e))? {
            let entry = entry.map_err(|e| io_error(dir, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let path = dir.join(&name);
            let is_dir = entry
                .file_type()
                .map(|t| t.is_dir())
                .map_err(|e| io_error(&path, e))?;
            entries.push(if is_dir {
                VaultEntry::directory(path)
            } else {
                VaultEntry::file(path)
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn create_dir_all(&self, path: &VaultPath) -> Result<()> {
        fs::create_dir_all(self.resolve(path)?).map_err(|e| io_error(path, e))
    }

    fn remove_file(&self, path: &VaultPath) -> Result<()> {
        fs::remove_file(self.resolve(path)?).map_err(|e| io_error(path, e))
    }

    fn remove_dir(&self, path: &VaultPath) -> Result<()> {
        if path.is_root() {
            return Err(VmrError::ProtectedPath(path.to_string()));
        }
        fs::remove_dir(self.resolve(path)?).map_err(|e| io_error(path, e))
    }

    fn relocate(&self, from: &VaultPath, to: &VaultPath) -> Result<()> {
        let dest = self.resolve(to)?;
        if dest.exists() {
            return Err(VmrError::DestinationExists(to.to_string()));
        }
        fs::rename(self.resolve(from)?, dest).map_err(|e| io_error(from, e))
    }
}

impl LinkRenamer for FsVault {
    fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<()> {
        if self.config.rewrite_links {
            self.rename_with_rewrites(from, to)
        } else {
            self.relocate(from, to)
        }
    }
}
