//! # vmr-core
//!
//! Core types for the VMR vault mutation router.
//!
//! This crate defines the foundational types used across all other VMR crates:
//! - [`MutationInstruction`] with [`Operation`] and [`TargetKind`]
//! - [`VaultPath`] and [`VaultEntry`], vault-relative paths that never escape the root
//! - Batch aggregation ([`BatchAggregator`], [`BatchOperationResult`], [`BatchOutcome`])
//! - Error taxonomy ([`VmrError`]) and response [`Status`]
//! - Collaborator contracts ([`Store`], [`LinkRenamer`], [`MetadataIndex`])
//! - Frontmatter splitting and rendering ([`frontmatter`])
//! - Vault configuration ([`VaultConfig`])

pub mod batch;
pub mod config;
pub mod error;
pub mod frontmatter;
pub mod instruction;
pub mod path;
pub mod store;

pub use batch::{
    BatchAggregator, BatchItemResult, BatchOperationResult, BatchOutcome, BatchSummary,
    ItemStatus,
};
pub use config::VaultConfig;
pub use error::{Result, Status, UnrestoredItem, VmrError};
pub use instruction::{MutationInstruction, Operation, TargetKind};
pub use path::{EntryKind, VaultEntry, VaultPath};
pub use store::{tag_key, FileMetadata, LinkRenamer, MetadataIndex, Store};
