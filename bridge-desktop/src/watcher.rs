//! Vault change notifications using `notify`

use bridge_traits::{
    error::{BridgeError, Result},
    storage::{extension_of, VaultEvent},
};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::filesystem::VaultFileSystem;

/// Recursive watcher over a vault directory.
///
/// Raw filesystem notifications are translated into [`VaultEvent`]s with
/// collection-relative paths and pushed onto an unbounded channel. Hidden
/// entries and non-indexable extensions are filtered out before sending.
/// Directory creation, removal and renames become
/// [`VaultEvent::FolderChanged`], since the documents they carry are not
/// reported one by one.
///
/// Dropping the watcher stops notifications and closes the channel.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl VaultWatcher {
    /// Start watching `root`, returning the watcher handle and the event stream
    pub fn start(
        root: impl Into<PathBuf>,
        extensions: Vec<String>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<VaultEvent>)> {
        let root = root.into();
        let filter = VaultFileSystem::with_extensions(root.clone(), extensions);
        let (tx, rx) = mpsc::unbounded_channel();

        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for vault_event in translate_event(&filter, &event) {
                    debug!(event = ?vault_event, "Vault change detected");
                    if tx.send(vault_event).is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "File watcher error"),
        };

        let mut watcher = RecommendedWatcher::new(handler, Config::default())
            .map_err(|e| BridgeError::OperationFailed(format!("watcher init failed: {}", e)))?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| BridgeError::OperationFailed(format!("watch failed: {}", e)))?;

        info!(root = ?root, "Vault watcher started");
        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

/// Whether `path` names a directory, judged from the event kind or the disk.
///
/// A path that is already gone counts as a directory when it has no
/// extension.
fn is_folder(kind: &EventKind, path: &Path, relative: &str) -> bool {
    match kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => true,
        EventKind::Create(CreateKind::File) | EventKind::Remove(RemoveKind::File) => false,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
            if path.exists() {
                path.is_dir()
            } else {
                extension_of(relative).is_none()
            }
        }
        _ => false,
    }
}

/// Translate one raw notification into zero or more vault events
pub(crate) fn translate_event(filter: &VaultFileSystem, event: &Event) -> Vec<VaultEvent> {
    let folders: Vec<VaultEvent> = event
        .paths
        .iter()
        .filter_map(|path| {
            let relative = filter.relative_path(path)?;
            let folder = filter.is_visible(&relative)
                && !filter.accepts(&relative)
                && is_folder(&event.kind, path, &relative);
            folder.then_some(VaultEvent::FolderChanged { path: relative })
        })
        .collect();
    if !folders.is_empty() {
        return folders;
    }

    let accepted = |path: &PathBuf| {
        filter
            .relative_path(path)
            .filter(|relative| filter.accepts(relative))
    };

    match &event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            match (accepted(&event.paths[0]), accepted(&event.paths[1])) {
                (Some(from), Some(to)) => vec![VaultEvent::Renamed { from, to }],
                (Some(from), None) => vec![VaultEvent::Deleted { path: from }],
                (None, Some(to)) => vec![VaultEvent::Created { path: to }],
                (None, None) => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .filter_map(accepted)
            .map(|path| VaultEvent::Deleted { path })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) | EventKind::Create(_) => event
            .paths
            .iter()
            .filter_map(accepted)
            .map(|path| VaultEvent::Created { path })
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter_map(accepted)
            .map(|path| VaultEvent::Modified { path })
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .filter_map(accepted)
            .map(|path| VaultEvent::Deleted { path })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::DataChange;

    fn filter() -> VaultFileSystem {
        VaultFileSystem::new("/vault")
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_create_and_modify() {
        let created = translate_event(
            &filter(),
            &event(EventKind::Create(CreateKind::File), &["/vault/a.md"]),
        );
        assert_eq!(
            created,
            vec![VaultEvent::Created {
                path: "a.md".to_string()
            }]
        );

        let modified = translate_event(
            &filter(),
            &event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/vault/notes/b.md"],
            ),
        );
        assert_eq!(
            modified,
            vec![VaultEvent::Modified {
                path: "notes/b.md".to_string()
            }]
        );
    }

    #[test]
    fn test_filters_hidden_and_foreign_extensions() {
        let events = translate_event(
            &filter(),
            &event(
                EventKind::Remove(RemoveKind::File),
                &["/vault/.obsidian/x.md", "/vault/pic.png", "/vault/c.md"],
            ),
        );
        assert_eq!(
            events,
            vec![VaultEvent::Deleted {
                path: "c.md".to_string()
            }]
        );
    }

    #[test]
    fn test_rename_variants() {
        let both = translate_event(
            &filter(),
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/vault/a.md", "/vault/b.md"],
            ),
        );
        assert_eq!(
            both,
            vec![VaultEvent::Renamed {
                from: "a.md".to_string(),
                to: "b.md".to_string()
            }]
        );

        let out_of_scope = translate_event(
            &filter(),
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/vault/a.md", "/vault/a.txt"],
            ),
        );
        assert_eq!(
            out_of_scope,
            vec![VaultEvent::Deleted {
                path: "a.md".to_string()
            }]
        );
    }

    #[test]
    fn test_folder_changes_require_rescan() {
        let removed = translate_event(
            &filter(),
            &event(EventKind::Remove(RemoveKind::Any), &["/vault/notes/archive"]),
        );
        assert_eq!(
            removed,
            vec![VaultEvent::FolderChanged {
                path: "notes/archive".to_string()
            }]
        );

        let created = translate_event(
            &filter(),
            &event(EventKind::Create(CreateKind::Folder), &["/vault/2024.drafts"]),
        );
        assert!(created.iter().all(VaultEvent::requires_rescan));
        assert_eq!(created.len(), 1);

        // Explicit file kinds and hidden directories are never folders
        let file = translate_event(
            &filter(),
            &event(EventKind::Remove(RemoveKind::File), &["/vault/Makefile"]),
        );
        assert!(file.is_empty());
        let hidden = translate_event(
            &filter(),
            &event(EventKind::Remove(RemoveKind::Folder), &["/vault/.trash"]),
        );
        assert!(hidden.is_empty());
    }

    #[test]
    fn test_renamed_directory_is_detected_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Projects.2025")).unwrap();
        let filter = VaultFileSystem::new(dir.path());

        let renamed = translate_event(
            &filter,
            &Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
                .add_path(dir.path().join("Projects"))
                .add_path(dir.path().join("Projects.2025")),
        );
        assert_eq!(
            renamed,
            vec![
                VaultEvent::FolderChanged {
                    path: "Projects".to_string()
                },
                VaultEvent::FolderChanged {
                    path: "Projects.2025".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_start_on_missing_directory_fails() {
        let result = VaultWatcher::start("/definitely/not/a/vault", vec!["md".to_string()]);
        assert!(result.is_err());
    }
}
