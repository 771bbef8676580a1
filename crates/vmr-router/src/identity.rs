//! Single-file rename, move and delete.

use chrono::Local;
use tracing::debug;

use vmr_core::error::{Result, VmrError};
use vmr_core::{MutationInstruction, Operation, VaultPath};

use crate::engine::MutationEngine;
use crate::response::{to_body, EntityBody, MutationResponse};
use crate::route::HandlerFamily;

impl MutationEngine<'_> {
    /// Rename (same directory, new name) or move (new full path) a file,
    /// rewriting links that point at it.
    pub(crate) fn rename_file(&self, instruction: &MutationInstruction) -> Result<MutationResponse> {
        let source = Self::source_path(instruction)?;
        if source.is_root() {
            return Err(VmrError::ProtectedPath(source.to_string()));
        }
        let target = instruction
            .target_str()
            .ok_or(VmrError::MissingAttribute(crate::normalize::attr::TARGET))?;

        let (destination, message) = match instruction.operation {
            Operation::Rename => {
                let name = VaultPath::parse(target)?;
                if name.is_root() || name.as_str().contains('/') {
                    return Err(VmrError::InvalidDestination {
                        path: target.to_string(),
                        reason: "rename expects a bare file name".to_string(),
                    });
                }
                (source.with_file_name(name.as_str()), "File successfully renamed")
            }
            _ => {
                let path = VaultPath::parse(target)?;
                if path.is_root() {
                    return Err(VmrError::InvalidDestination {
                        path: target.to_string(),
                        reason: "destination is the vault root".to_string(),
                    });
                }
                (path, "File successfully moved")
            }
        };

        self.require_file(&source)?;
        if self.store.exists(&destination)? {
            return Err(VmrError::DestinationExists(destination.to_string()));
        }
        if let Some(parent) = destination.parent().filter(|p| !p.is_root()) {
            self.ensure_dir(&parent)?;
        }

        self.renamer.rename(&source, &destination)?;
        self.track_move(&source, &destination);
        debug!(from = %source, to = %destination, "file renamed");

        let body = EntityBody::new(message)
            .old_path(&source)
            .new_path(&destination);
        Ok(MutationResponse::ok(HandlerFamily::Identity, to_body(&body)?))
    }

    /// Delete one file, into the trash unless `permanent` is set.
    pub(crate) fn delete_file(&self, instruction: &MutationInstruction) -> Result<MutationResponse> {
        let source = Self::source_path(instruction)?;
        if source.is_root() {
            return Err(VmrError::ProtectedPath(source.to_string()));
        }
        self.require_file(&source)?;

        let body = match self.discard_file(&source, instruction.permanent)? {
            Some(trashed) => EntityBody::new("File moved to trash")
                .old_path(&source)
                .new_path(&trashed),
            None => EntityBody::new("File permanently deleted").old_path(&source),
        };
        Ok(MutationResponse::ok(HandlerFamily::Identity, to_body(&body)?))
    }

    /// Remove `file` from its location. Returns the trash location for a
    /// soft delete, `None` when the file was removed for good. Files already
    /// inside the trash are always removed for good.
    pub(crate) fn discard_file(&self, file: &VaultPath, permanent: bool) -> Result<Option<VaultPath>> {
        let trash = self.config.trash_path();
        if permanent || file.starts_with(&trash) {
            self.store.remove_file(file)?;
            self.index_forget(file);
            return Ok(None);
        }

        let destination = self.trash_destination(file)?;
        if let Some(parent) = destination.parent().filter(|p| !p.is_root()) {
            self.ensure_dir(&parent)?;
        }
        self.store.relocate(file, &destination)?;
        self.index_forget(file);
        Ok(Some(destination))
    }

    /// Free location for `file` inside the trash, mirroring its vault path.
    /// Collisions get a timestamp suffix, then a counter.
    fn trash_destination(&self, file: &VaultPath) -> Result<VaultPath> {
        let candidate = self.config.trash_path().join(file.as_str());
        if !self.store.exists(&candidate)? {
            return Ok(candidate);
        }

        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        let stem = candidate.file_stem().to_string();
        let ext = candidate
            .extension()
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let mut attempt = 0;
        loop {
            let name = match attempt {
                0 => format!("{stem}.{stamp}{ext}"),
                n => format!("{stem}.{stamp}-{n}{ext}"),
            };
            let stamped = candidate.with_file_name(&name);
            if !self.store.exists(&stamped)? {
                return Ok(stamped);
            }
            attempt += 1;
        }
    }

    /// Keep the index in step with a file that changed location.
    pub(crate) fn track_move(&self, from: &VaultPath, to: &VaultPath) {
        match (Self::is_markdown(from), Self::is_markdown(to)) {
            (_, true) => self.index_relocate(from, to),
            (true, false) => self.index_forget(from),
            (false, false) => {}
        }
    }
}
