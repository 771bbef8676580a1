//! # vmr-vault
//!
//! Vault storage for VMR.
//!
//! The vault on disk is the source of truth; the tag index is a derived
//! cache rebuilt from it. This crate provides:
//! - [`FsVault`], the filesystem store with link-preserving rename
//! - [`MemoryVault`], an in-memory store with fault injection for tests
//! - [`VaultWatcher`], change notifications for keeping the index fresh

pub mod fs;
pub mod memory;
pub mod watcher;

pub use fs::FsVault;
pub use memory::MemoryVault;
pub use watcher::{VaultEvent, VaultWatcher};
