//! File system watcher that keeps the tag index in step with edits made
//! outside the router.
//!
//! Uses the `notify` crate (FSEvents on macOS, inotify on Linux,
//! ReadDirectoryChanges on Windows).

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use vmr_core::error::VmrError;
use vmr_core::{VaultConfig, VaultPath};

/// Events emitted by the vault watcher, with vault-relative paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    /// A markdown file was created or modified.
    Changed(VaultPath),
    /// A markdown file was deleted or moved away.
    Removed(VaultPath),
}

/// Watches a vault directory and emits [`VaultEvent`]s for markdown files.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::Receiver<VaultEvent>,
}

impl VaultWatcher {
    /// Start watching `vault_root`. Files under the config's ignored
    /// directories never produce events.
    ///
    /// # Errors
    ///
    /// Returns [`VmrError::Io`] if the watcher cannot be created.
    pub fn start(vault_root: &Path, config: &VaultConfig) -> Result<Self, VmrError> {
        let (tx, rx) = mpsc::channel();

        let root = vault_root
            .canonicalize()
            .unwrap_or_else(|_| vault_root.to_path_buf());
        let config = config.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let Ok(event) = res else { return };
            for path in &event.paths {
                let Some(relative) = relative_markdown(&root, path) else {
                    continue;
                };
                if config.is_ignored(&relative) {
                    continue;
                }
                let vault_event = match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) => {
                        if path.exists() {
                            VaultEvent::Changed(relative)
                        } else {
                            VaultEvent::Removed(relative)
                        }
                    }
                    EventKind::Remove(_) => VaultEvent::Removed(relative),
                    _ => continue,
                };
                let _ = tx.send(vault_event);
            }
        })
        .map_err(|e| VmrError::Io(std::io::Error::other(e)))?;

        watcher
            .watch(vault_root, RecursiveMode::Recursive)
            .map_err(|e| VmrError::Io(std::io::Error::other(e)))?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<VaultEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Next event if one is already queued.
    pub fn try_recv(&self) -> Option<VaultEvent> {
        self.receiver.try_recv().ok()
    }
}

fn relative_markdown(root: &Path, path: &Path) -> Option<VaultPath> {
    if path.extension().and_then(|e| e.to_str()) != Some("md") {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?;
    VaultPath::parse(&relative.to_string_lossy()).ok()
}
