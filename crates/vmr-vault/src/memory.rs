//! In-memory vault with fault injection.
//!
//! Implements the same [`Store`] and [`LinkRenamer`] contracts as
//! [`FsVault`](crate::FsVault), including link rewriting, and lets tests
//! make individual writes, moves and removals fail.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use vmr_core::error::{Result, VmrError};
use vmr_core::{EntryKind, LinkRenamer, Store, VaultEntry, VaultPath};
use vmr_parser::rewrite_links;

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<VaultPath, Vec<u8>>,
    dirs: BTreeSet<VaultPath>,
}

#[derive(Debug, Default)]
struct Faults {
    writes: BTreeSet<VaultPath>,
    moves_from: BTreeSet<VaultPath>,
    moves_to: BTreeSet<VaultPath>,
    removals: BTreeSet<VaultPath>,
}

/// A vault held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryVault {
    state: RefCell<State>,
    faults: RefCell<Faults>,
}

fn path(raw: &str) -> VaultPath {
    VaultPath::parse(raw).unwrap_or_else(|_| VaultPath::root())
}

fn injected(action: &str, path: &VaultPath) -> VmrError {
    VmrError::Store(format!("{path}: injected {action} failure"))
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a vault holding `files` (path, text) with their parent directories.
    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let vault = Self::new();
        for (p, contents) in files {
            vault.insert(p, contents);
        }
        vault
    }

    /// Create or replace a file, creating parent directories.
    pub fn insert(&self, raw: &str, contents: &str) {
        let p = path(raw);
        let mut state = self.state.borrow_mut();
        for ancestor in p.ancestors() {
            state.dirs.insert(ancestor);
        }
        state.files.insert(p, contents.as_bytes().to_vec());
    }

    /// Create an empty directory and its ancestors.
    pub fn insert_dir(&self, raw: &str) {
        let p = path(raw);
        let mut state = self.state.borrow_mut();
        for ancestor in p.ancestors() {
            state.dirs.insert(ancestor);
        }
        state.dirs.insert(p);
    }

    /// Text of a file, if it exists.
    pub fn contents(&self, raw: &str) -> Option<String> {
        self.state
            .borrow()
            .files
            .get(&path(raw))
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Every file path, sorted.
    pub fn file_paths(&self) -> Vec<String> {
        self.state
            .borrow()
            .files
            .keys()
            .map(|p| p.as_str().to_string())
            .collect()
    }

    pub fn has_dir(&self, raw: &str) -> bool {
        let p = path(raw);
        p.is_root() || self.state.borrow().dirs.contains(&p)
    }

    /// Make every write to `raw` fail.
    pub fn fail_writes_to(&self, raw: &str) {
        self.faults.borrow_mut().writes.insert(path(raw));
    }

    /// Make every move (rename or relocate) of the file at `raw` fail.
    pub fn fail_moves_of(&self, raw: &str) {
        self.faults.borrow_mut().moves_from.insert(path(raw));
    }

    /// Make every move onto `raw` fail.
    pub fn fail_moves_to(&self, raw: &str) {
        self.faults.borrow_mut().moves_to.insert(path(raw));
    }

    /// Make removal of the file or directory at `raw` fail.
    pub fn fail_removals_of(&self, raw: &str) {
        self.faults.borrow_mut().removals.insert(path(raw));
    }

    pub fn clear_faults(&self) {
        *self.faults.borrow_mut() = Faults::default();
    }

    fn check_move(&self, from: &VaultPath, to: &VaultPath) -> Result<()> {
        let faults = self.faults.borrow();
        if faults.moves_from.contains(from) {
            return Err(injected("move", from));
        }
        if faults.moves_to.contains(to) {
            return Err(injected("move", to));
        }
        Ok(())
    }

    fn require_parent(state: &State, p: &VaultPath) -> Result<()> {
        match p.parent() {
            Some(parent) if parent.is_root() || state.dirs.contains(&parent) => Ok(()),
            _ => Err(VmrError::Store(format!("{p}: parent directory does not exist"))),
        }
    }
}

impl Store for MemoryVault {
    fn kind_of(&self, p: &VaultPath) -> Result<Option<EntryKind>> {
        let state = self.state.borrow();
        if p.is_root() || state.dirs.contains(p) {
            Ok(Some(EntryKind::Directory))
        } else if state.files.contains_key(p) {
            Ok(Some(EntryKind::File))
        } else {
            Ok(None)
        }
    }

    fn read(&self, p: &VaultPath) -> Result<Vec<u8>> {
        self.state
            .borrow()
            .files
            .get(p)
            .cloned()
            .ok_or_else(|| VmrError::Store(format!("{p}: no such file")))
    }

    fn write(&self, p: &VaultPath, contents: &[u8]) -> Result<()> {
        if self.faults.borrow().writes.contains(p) {
            return Err(injected("write", p));
        }
        let mut state = self.state.borrow_mut();
        if state.dirs.contains(p) || p.is_root() {
            return Err(VmrError::Store(format!("{p}: is a directory")));
        }
        Self::require_parent(&state, p)?;
        state.files.insert(p.clone(), contents.to_vec());
        Ok(())
    }

    fn list(&self, dir: &VaultPath) -> Result<Vec<VaultEntry>> {
        let state = self.state.borrow();
        if !dir.is_root() && !state.dirs.contains(dir) {
            return Err(VmrError::Store(format!("{dir}: no such directory")));
        }
        let is_child = |p: &VaultPath| p.parent().as_ref() == Some(dir);
        let mut entries: Vec<VaultEntry> = state
            .dirs
            .iter()
            .filter(|p| is_child(p))
            .cloned()
            .map(VaultEntry::directory)
            .chain(
                state
                    .files
                    .keys()
                    .filter(|p| is_child(p))
                    .cloned()
                    .map(VaultEntry::file),
            )
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn create_dir_all(&self, p: &VaultPath) -> Result<()> {
        let mut state = self.state.borrow_mut();
        for candidate in p.ancestors().into_iter().chain(std::iter::once(p.clone())) {
            if state.files.contains_key(&candidate) {
                return Err(VmrError::Store(format!("{candidate}: is a file")));
            }
            if !candidate.is_root() {
                state.dirs.insert(candidate);
            }
        }
        Ok(())
    }

    fn remove_file(&self, p: &VaultPath) -> Result<()> {
        if self.faults.borrow().removals.contains(p) {
            return Err(injected("remove", p));
        }
        self.state
            .borrow_mut()
            .files
            .remove(p)
            .map(|_| ())
            .ok_or_else(|| VmrError::Store(format!("{p}: no such file")))
    }

    fn remove_dir(&self, p: &VaultPath) -> Result<()> {
        if self.faults.borrow().removals.contains(p) {
            return Err(injected("remove", p));
        }
        let mut state = self.state.borrow_mut();
        if p.is_root() {
            return Err(VmrError::ProtectedPath(p.to_string()));
        }
        if !state.dirs.contains(p) {
            return Err(VmrError::Store(format!("{p}: no such directory")));
        }
        let occupied = state.files.keys().any(|f| f.starts_with(p) && f != p)
            || state.dirs.iter().any(|d| d.starts_with(p) && d != p);
        if occupied {
            return Err(VmrError::Store(format!("{p}: directory not empty")));
        }
        state.dirs.remove(p);
        Ok(())
    }

    fn relocate(&self, from: &VaultPath, to: &VaultPath) -> Result<()> {
        self.check_move(from, to)?;
        let mut state = self.state.borrow_mut();
        if state.files.contains_key(to) || state.dirs.contains(to) {
            return Err(VmrError::DestinationExists(to.to_string()));
        }
        Self::require_parent(&state, to)?;
        let contents = state
            .files
            .remove(from)
            .ok_or_else(|| VmrError::Store(format!("{from}: no such file")))?;
        state.files.insert(to.clone(), contents);
        Ok(())
    }
}

impl LinkRenamer for MemoryVault {
    fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<()> {
        self.check_move(from, to)?;
        if !self.state.borrow().files.contains_key(from) {
            return Err(VmrError::Store(format!("{from}: no such file")));
        }
        self.relocate(from, to)?;

        let mut state = self.state.borrow_mut();
        let rewrites: Vec<(VaultPath, Vec<u8>)> = state
            .files
            .iter()
            .filter(|(p, _)| p.extension() == Some("md"))
            .filter_map(|(p, bytes)| {
                let text = std::str::from_utf8(bytes).ok()?;
                let rewritten = rewrite_links(text, from, to)?;
                Some((p.clone(), rewritten.into_bytes()))
            })
            .collect();
        for (p, bytes) in rewrites {
            state.files.insert(p, bytes);
        }
        Ok(())
    }
}
