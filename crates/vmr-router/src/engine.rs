//! The mutation engine: normalize, route, handle.

use tracing::{info, warn};

use vmr_core::error::{Result, VmrError};
use vmr_core::{
    EntryKind, LinkRenamer, MetadataIndex, MutationInstruction, Operation, Store, VaultConfig,
    VaultPath,
};

use crate::normalize::normalize;
use crate::patch::StructuralPatcher;
use crate::request::RawRequest;
use crate::response::MutationResponse;
use crate::route::{dispatch, HandlerFamily};

/// Executes mutation requests against injected collaborators.
///
/// The engine holds no state of its own; every request is independent.
pub struct MutationEngine<'a> {
    pub(crate) store: &'a dyn Store,
    pub(crate) renamer: &'a dyn LinkRenamer,
    pub(crate) index: &'a dyn MetadataIndex,
    pub(crate) patcher: &'a dyn StructuralPatcher,
    pub(crate) config: &'a VaultConfig,
}

impl<'a> MutationEngine<'a> {
    pub fn new(
        store: &'a dyn Store,
        renamer: &'a dyn LinkRenamer,
        index: &'a dyn MetadataIndex,
        patcher: &'a dyn StructuralPatcher,
        config: &'a VaultConfig,
    ) -> Self {
        Self {
            store,
            renamer,
            index,
            patcher,
            config,
        }
    }

    /// Run `request` to completion. Failures become error responses.
    pub fn execute(&self, request: &RawRequest) -> MutationResponse {
        let (instruction, family, outcome) =
            match normalize(request, &self.config.default_delimiter) {
                Err(e) => (None, None, Err(e)),
                Ok(instruction) => match dispatch(&instruction) {
                    Err(e) => (Some(instruction), None, Err(e)),
                    Ok(family) => {
                        let outcome = self.handle(family, &instruction);
                        (Some(instruction), Some(family), outcome)
                    }
                },
            };

        let response = match outcome {
            Ok(response) => response,
            Err(e) => MutationResponse::from_error(&e, family),
        };

        match &instruction {
            Some(instr) => info!(
                operation = %instr.operation,
                target_kind = %instr.target_kind,
                path = %request.path,
                status = response.status_code(),
                "mutation executed"
            ),
            None => info!(
                path = %request.path,
                status = response.status_code(),
                "mutation rejected"
            ),
        }
        response
    }

    /// Handle an already normalized instruction.
    ///
    /// # Errors
    ///
    /// Returns routing errors and any error of the selected handler.
    pub fn execute_instruction(&self, instruction: &MutationInstruction) -> Result<MutationResponse> {
        let family = dispatch(instruction)?;
        self.handle(family, instruction)
    }

    fn handle(
        &self,
        family: HandlerFamily,
        instruction: &MutationInstruction,
    ) -> Result<MutationResponse> {
        match (family, instruction.operation) {
            (HandlerFamily::ContentPatch, _) => self.patch_content(instruction),
            (HandlerFamily::Identity, Operation::Delete) => self.delete_file(instruction),
            (HandlerFamily::Identity, _) => self.rename_file(instruction),
            (HandlerFamily::Directory, Operation::Move) => self.move_directory(instruction),
            (HandlerFamily::Directory, Operation::Copy) => self.copy_directory(instruction),
            (HandlerFamily::Directory, Operation::Create) => self.create_directory(instruction),
            (HandlerFamily::Directory, _) => self.delete_directory(instruction),
            (HandlerFamily::Tag, Operation::Rename) => self.rename_tag(instruction),
            (HandlerFamily::Tag, _) => self.edit_file_tags(instruction),
        }
    }

    /// Parse the request path as a vault path.
    pub(crate) fn source_path(instruction: &MutationInstruction) -> Result<VaultPath> {
        VaultPath::parse(&instruction.source_path)
    }

    /// Require `path` to be an existing plain file.
    pub(crate) fn require_file(&self, path: &VaultPath) -> Result<()> {
        match self.store.kind_of(path)? {
            Some(EntryKind::File) => Ok(()),
            _ => Err(VmrError::FileNotFound(path.to_string())),
        }
    }

    /// Create `dir` and its ancestors unless it already exists.
    pub(crate) fn ensure_dir(&self, dir: &VaultPath) -> Result<()> {
        match self.store.kind_of(dir)? {
            Some(EntryKind::Directory) => Ok(()),
            Some(EntryKind::File) => Err(VmrError::PathIsFile(dir.to_string())),
            None => self.store.create_dir_all(dir),
        }
    }

    pub(crate) fn is_markdown(path: &VaultPath) -> bool {
        path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
    }

    // The vault is authoritative, so index failures after a successful
    // mutation are logged and left for the next rebuild.

    pub(crate) fn index_refresh(&self, path: &VaultPath, contents: &str) {
        if !Self::is_markdown(path) {
            return;
        }
        if let Err(e) = self.index.refresh(path, contents) {
            warn!(path = %path, error = %e, "index refresh failed");
        }
    }

    pub(crate) fn index_forget(&self, path: &VaultPath) {
        if let Err(e) = self.index.forget(path) {
            warn!(path = %path, error = %e, "index forget failed");
        }
    }

    pub(crate) fn index_relocate(&self, from: &VaultPath, to: &VaultPath) {
        if let Err(e) = self.index.relocate(from, to) {
            warn!(from = %from, to = %to, error = %e, "index relocate failed");
        }
    }
}
