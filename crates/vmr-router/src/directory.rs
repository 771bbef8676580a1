//! Directory move, copy, delete and create.
//!
//! Move and copy are decomposed into per-file steps run by an
//! [`AtomicBatch`]; delete is best-effort through an [`AggregatingBatch`].

use tracing::{debug, warn};

use vmr_core::error::{Result, Status, VmrError};
use vmr_core::{
    BatchOperationResult, BatchOutcome, EntryKind, MutationInstruction, VaultPath,
};

use crate::engine::MutationEngine;
use crate::response::{mark_failed, to_body, EntityBody, MutationResponse};
use crate::route::HandlerFamily;
use crate::strategy::{AggregatingBatch, AtomicBatch, ItemOutcome, Step, StepAction};

/// Everything below a directory, in lexicographic order of relative path.
#[derive(Debug, Default)]
pub(crate) struct DirectoryTree {
    pub files: Vec<VaultPath>,
    /// Sub-directories, excluding the root of the walk.
    pub dirs: Vec<VaultPath>,
}

impl MutationEngine<'_> {
    pub(crate) fn walk(&self, root: &VaultPath) -> Result<DirectoryTree> {
        let mut tree = DirectoryTree::default();
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in self.store.list(&dir)? {
                match entry.kind {
                    EntryKind::File => tree.files.push(entry.path),
                    EntryKind::Directory => {
                        tree.dirs.push(entry.path.clone());
                        pending.push(entry.path);
                    }
                }
            }
        }
        tree.files.sort();
        tree.dirs.sort();
        Ok(tree)
    }

    fn require_directory(&self, path: &VaultPath) -> Result<()> {
        if path.is_root() {
            return Err(VmrError::ProtectedPath(path.to_string()));
        }
        match self.store.kind_of(path)? {
            Some(EntryKind::Directory) => Ok(()),
            _ => Err(VmrError::DirectoryNotFound(path.to_string())),
        }
    }

    /// Validate source and destination of a move or copy.
    fn transfer_paths(&self, instruction: &MutationInstruction) -> Result<(VaultPath, VaultPath)> {
        let source = Self::source_path(instruction)?;
        let target = instruction
            .target_str()
            .ok_or(VmrError::MissingAttribute(crate::normalize::attr::TARGET))?;
        let destination = VaultPath::parse(target)?;

        self.require_directory(&source)?;
        if destination.is_root() {
            return Err(VmrError::InvalidDestination {
                path: target.to_string(),
                reason: "destination is the vault root".to_string(),
            });
        }
        if destination.starts_with(&source) {
            return Err(VmrError::InvalidDestination {
                path: destination.to_string(),
                reason: format!("destination lies inside the source directory '{source}'"),
            });
        }
        if self.store.exists(&destination)? {
            return Err(VmrError::DestinationExists(destination.to_string()));
        }
        Ok((source, destination))
    }

    /// Create `destination` and the mirror of every sub-directory. Returns
    /// the directories this call created, outermost first.
    fn mirror_directories(
        &self,
        source: &VaultPath,
        destination: &VaultPath,
        tree: &DirectoryTree,
    ) -> Result<Vec<VaultPath>> {
        let mut created = Vec::new();
        let wanted = destination
            .ancestors()
            .into_iter()
            .chain(std::iter::once(destination.clone()))
            .chain(tree.dirs.iter().filter_map(|d| {
                d.strip_prefix(source).map(|rel| destination.join(rel))
            }));
        for dir in wanted {
            if self.store.kind_of(&dir)?.is_none() {
                self.store.create_dir_all(&dir)?;
                created.push(dir);
            }
        }
        Ok(created)
    }

    /// Remove directories deepest first, skipping any that cannot go.
    fn prune_directories(&self, dirs: impl IntoIterator<Item = VaultPath>) {
        let mut dirs: Vec<VaultPath> = dirs.into_iter().collect();
        dirs.sort();
        for dir in dirs.into_iter().rev() {
            if let Err(e) = self.store.remove_dir(&dir) {
                warn!(dir = %dir, error = %e, "could not remove directory");
            }
        }
    }

    fn steps(source: &VaultPath, destination: &VaultPath, tree: &DirectoryTree) -> Vec<Step> {
        tree.files
            .iter()
            .filter_map(|file| {
                let rel = file.strip_prefix(source)?;
                Some(Step {
                    from: file.clone(),
                    to: destination.join(rel),
                })
            })
            .collect()
    }

    fn run_transfer(
        &self,
        label: &'static str,
        action: &dyn StepAction,
        source: &VaultPath,
        destination: &VaultPath,
        tree: &DirectoryTree,
    ) -> Result<BatchOperationResult> {
        let created = self.mirror_directories(source, destination, tree)?;
        let mut batch = AtomicBatch::new(label);
        batch.enumerate(Self::steps(source, destination, tree));
        match batch.run(action) {
            Ok(result) => Ok(result),
            Err(e) => {
                if !matches!(e, VmrError::RollbackIncomplete { .. }) {
                    self.prune_directories(created);
                }
                Err(e)
            }
        }
    }

    /// Move every file under the source to the same relative path under
    /// the destination, all or nothing.
    pub(crate) fn move_directory(&self, instruction: &MutationInstruction) -> Result<MutationResponse> {
        let (source, destination) = self.transfer_paths(instruction)?;
        let tree = self.walk(&source)?;
        let action = MoveFiles { engine: self };
        let result = self.run_transfer("directory-move", &action, &source, &destination, &tree)?;

        for step in Self::steps(&source, &destination, &tree) {
            self.track_move(&step.from, &step.to);
        }
        self.prune_directories(tree.dirs.into_iter().chain(std::iter::once(source.clone())));
        debug!(from = %source, to = %destination, files = result.summary.succeeded, "directory moved");

        let mut body = to_body(
            &EntityBody::new("Directory successfully moved")
                .old_path(&source)
                .new_path(&destination),
        )?;
        merge_batch(&mut body, &result)?;
        Ok(MutationResponse::ok(HandlerFamily::Directory, body))
    }

    /// Copy every file under the source into a new destination directory,
    /// all or nothing.
    pub(crate) fn copy_directory(&self, instruction: &MutationInstruction) -> Result<MutationResponse> {
        let (source, destination) = self.transfer_paths(instruction)?;
        let tree = self.walk(&source)?;
        let action = CopyFiles { engine: self };
        let result = self.run_transfer("directory-copy", &action, &source, &destination, &tree)?;

        for step in Self::steps(&source, &destination, &tree) {
            if let Ok(contents) = self.store.read_to_string(&step.to) {
                self.index_refresh(&step.to, &contents);
            }
        }

        let mut body = to_body(
            &EntityBody::new("Directory successfully copied")
                .old_path(&source)
                .new_path(&destination),
        )?;
        merge_batch(&mut body, &result)?;
        Ok(MutationResponse::ok(HandlerFamily::Directory, body))
    }

    /// Delete every file under the directory, best effort, then remove the
    /// emptied directories.
    pub(crate) fn delete_directory(&self, instruction: &MutationInstruction) -> Result<MutationResponse> {
        let source = Self::source_path(instruction)?;
        self.require_directory(&source)?;
        if source == self.config.trash_path() && !instruction.permanent {
            return Err(VmrError::ProtectedPath(source.to_string()));
        }

        let tree = self.walk(&source)?;
        let mut batch = AggregatingBatch::new("directory-delete");
        for file in &tree.files {
            batch.run_item(file.as_str(), || {
                Ok(match self.discard_file(file, instruction.permanent)? {
                    Some(trashed) => ItemOutcome::Done(format!("moved to {trashed}")),
                    None => ItemOutcome::Done("permanently deleted".to_string()),
                })
            });
        }
        let result = batch.finish();

        // Files already inside the trash are always removed for good.
        let trash = self.config.trash_path();
        let purged = instruction.permanent || source.starts_with(&trash);

        let outcome = result.outcome();
        if outcome == BatchOutcome::FullSuccess {
            if !purged {
                self.mirror_into_trash(&source, &tree.dirs, &trash);
            }
            self.prune_directories(tree.dirs.into_iter().chain(std::iter::once(source.clone())));
        }

        let message = match (outcome, purged) {
            (BatchOutcome::FullSuccess, true) => "Directory permanently deleted".to_string(),
            (BatchOutcome::FullSuccess, false) => "Directory moved to trash".to_string(),
            (_, _) => format!(
                "{} of {} file(s) could not be deleted",
                result.summary.failed, result.summary.requested
            ),
        };
        let mut body = to_body(&EntityBody::new(message).old_path(&source))?;
        merge_batch(&mut body, &result)?;

        let status = outcome.status(Status::InternalError);
        if outcome == BatchOutcome::TotalFailure {
            mark_failed(&mut body, &VmrError::BatchFailed(result.summary.failed));
        }
        Ok(MutationResponse::new(status, HandlerFamily::Directory, body))
    }

    /// Recreate `source` and its sub-directories under the trash so empty
    /// directories survive a soft delete.
    fn mirror_into_trash(&self, source: &VaultPath, dirs: &[VaultPath], trash: &VaultPath) {
        for dir in std::iter::once(source).chain(dirs) {
            let mirror = trash.join(dir.as_str());
            if let Err(e) = self.ensure_dir(&mirror) {
                warn!(dir = %mirror, error = %e, "could not recreate directory in trash");
            }
        }
    }

    /// Create a directory and its ancestors. Idempotent.
    pub(crate) fn create_directory(&self, instruction: &MutationInstruction) -> Result<MutationResponse> {
        let path = Self::source_path(instruction)?;
        if path.is_root() {
            return Err(VmrError::ProtectedPath(path.to_string()));
        }

        let message = match self.store.kind_of(&path)? {
            Some(EntryKind::Directory) => "Directory already exists",
            Some(EntryKind::File) => return Err(VmrError::PathIsFile(path.to_string())),
            None => {
                for ancestor in path.ancestors() {
                    if self.store.kind_of(&ancestor)? == Some(EntryKind::File) {
                        return Err(VmrError::PathIsFile(ancestor.to_string()));
                    }
                }
                self.store.create_dir_all(&path)?;
                "Directory successfully created"
            }
        };
        let body = to_body(&EntityBody::new(message).new_path(&path))?;
        Ok(MutationResponse::ok(HandlerFamily::Directory, body))
    }
}

fn merge_batch(body: &mut serde_json::Value, result: &BatchOperationResult) -> Result<()> {
    if let (serde_json::Value::Object(map), serde_json::Value::Object(batch)) =
        (body, to_body(result)?)
    {
        map.extend(batch);
    }
    Ok(())
}

/// Per-file link-preserving move; undone by moving back.
struct MoveFiles<'e, 'a> {
    engine: &'e MutationEngine<'a>,
}

impl StepAction for MoveFiles<'_, '_> {
    fn verb(&self) -> &'static str {
        "moved"
    }

    fn apply(&self, from: &VaultPath, to: &VaultPath) -> Result<()> {
        self.engine.renamer.rename(from, to)
    }

    fn compensate(&self, from: &VaultPath, to: &VaultPath) -> Result<()> {
        self.engine.renamer.rename(to, from)
    }
}

/// Per-file content copy; undone by removing the copy.
struct CopyFiles<'e, 'a> {
    engine: &'e MutationEngine<'a>,
}

impl StepAction for CopyFiles<'_, '_> {
    fn verb(&self) -> &'static str {
        "copied"
    }

    fn apply(&self, from: &VaultPath, to: &VaultPath) -> Result<()> {
        let contents = self.engine.store.read(from)?;
        self.engine.store.write(to, &contents)
    }

    fn compensate(&self, _from: &VaultPath, to: &VaultPath) -> Result<()> {
        self.engine.store.remove_file(to)
    }
}
