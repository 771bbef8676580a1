//! Vault configuration loaded from `.vmr/config.toml`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VmrError;
use crate::path::VaultPath;

/// Directory holding VMR's own state inside a vault.
pub const STATE_DIR: &str = ".vmr";
/// Config file name inside [`STATE_DIR`].
pub const CONFIG_FILE: &str = "config.toml";
/// Index database name inside [`STATE_DIR`].
pub const INDEX_FILE: &str = "index.db";

/// Per-vault settings. Every field has a default, so an absent or partial
/// config file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Where soft-deleted files are relocated to.
    pub trash_dir: String,
    /// Upper bound on tag length, in characters.
    pub max_tag_length: usize,
    /// `Target-Delimiter` used when a request does not send one.
    pub default_delimiter: String,
    /// Top-level directories excluded from enumeration and indexing.
    pub ignored_dirs: Vec<String>,
    /// Rewrite links to a file when it is renamed or moved.
    pub rewrite_links: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            trash_dir: ".trash".to_string(),
            max_tag_length: 128,
            default_delimiter: "::".to_string(),
            ignored_dirs: vec![
                STATE_DIR.to_string(),
                ".git".to_string(),
                ".obsidian".to_string(),
                ".trash".to_string(),
            ],
            rewrite_links: true,
        }
    }
}

impl VaultConfig {
    /// Load the config of the vault at `vault_root`, falling back to
    /// defaults when no config file exists.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::Config`] if the file exists but cannot be read
    /// or parsed.
    pub fn load(vault_root: &Path) -> Result<Self, VmrError> {
        let path = vault_root.join(STATE_DIR).join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|e| VmrError::Config(format!("cannot read {CONFIG_FILE}: {e}")))?;
        Self::from_toml(&text)
    }

    /// Parse a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::Config`] on malformed TOML or invalid values.
    pub fn from_toml(text: &str) -> Result<Self, VmrError> {
        let config: Self =
            toml::from_str(text).map_err(|e| VmrError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::Config`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, VmrError> {
        toml::to_string_pretty(self).map_err(|e| VmrError::Config(e.to_string()))
    }

    fn validate(&self) -> Result<(), VmrError> {
        if self.max_tag_length == 0 {
            return Err(VmrError::Config("max_tag_length must be positive".into()));
        }
        if self.default_delimiter.is_empty() {
            return Err(VmrError::Config("default_delimiter must not be empty".into()));
        }
        let trash = VaultPath::parse(&self.trash_dir)
            .map_err(|e| VmrError::Config(format!("trash_dir: {e}")))?;
        if trash.is_root() {
            return Err(VmrError::Config("trash_dir must not be the vault root".into()));
        }
        Ok(())
    }

    /// Trash directory as a vault path.
    pub fn trash_path(&self) -> VaultPath {
        VaultPath::parse(&self.trash_dir).unwrap_or_else(|_| VaultPath::root().join(".trash"))
    }

    /// Whether `path` lies in an ignored top-level directory.
    pub fn is_ignored(&self, path: &VaultPath) -> bool {
        let first = path.as_str().split('/').next().unwrap_or("");
        !first.is_empty() && self.ignored_dirs.iter().any(|d| d == first)
    }
}
