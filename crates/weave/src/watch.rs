//! File watching for incremental rebuilds.
//!
//! `FileWatcher` turns notify events into [`FileChange`]s on a tokio channel;
//! [`watch`] drains that channel in debounced batches and feeds a [`Session`].

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::scan::ScanOutput;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Watches a directory recursively and sends changes through a channel.
///
/// Repeated events for the same path inside the debounce window are dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    pub fn new(root: PathBuf, debounce: Duration) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if !root.exists() {
            return Err(Error::WatchRootNotFound(root));
        }

        let (tx, rx) = mpsc::channel(256);
        let mut last_event: Option<(PathBuf, Instant)> = None;
        let watched_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "watch error");
                    return;
                }
            };

            for path in &event.paths {
                if Self::should_ignore(path, &watched_root) {
                    continue;
                }

                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                    notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };

                if tx.blocking_send(change).is_err() {
                    return;
                }
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        tracing::info!(root = %root.display(), "watching for changes");

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    /// Paths outside the root and hidden files or directories are ignored.
    /// Source filtering happens in the session.
    fn should_ignore(path: &Path, root: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return true;
        };

        relative.components().any(|component| {
            component
                .as_os_str()
                .to_str()
                .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Collect changes until the channel is quiet for `window`.
///
/// Returns `None` when the channel is closed and nothing is pending.
pub async fn next_batch(
    changes: &mut mpsc::Receiver<FileChange>,
    window: Duration,
) -> Option<Vec<FileChange>> {
    let first = changes.recv().await?;
    let mut batch = vec![first];
    while let Ok(Some(change)) = tokio::time::timeout(window, changes.recv()).await {
        batch.push(change);
    }

    // Keep the last change per path, in first-seen order.
    let mut merged: Vec<FileChange> = Vec::with_capacity(batch.len());
    for change in batch {
        match merged.iter_mut().find(|c| c.path() == change.path()) {
            Some(slot) => *slot = change,
            None => merged.push(change),
        }
    }
    Some(merged)
}

/// Apply debounced batches of changes to `session` until the channel closes.
///
/// `on_update` runs after every batch that changed the result.
pub async fn watch<R, F>(
    session: &mut Session<R>,
    mut changes: mpsc::Receiver<FileChange>,
    window: Duration,
    mut on_update: F,
) -> Result<()>
where
    R: Runtime,
    F: FnMut(&ScanOutput),
{
    while let Some(batch) = next_batch(&mut changes, window).await {
        let mut changed = false;
        for change in &batch {
            changed |= match change {
                FileChange::Removed(path) => session.remove_file(path)?,
                FileChange::Created(path) | FileChange::Modified(path) => {
                    session.update_file(path).await?
                }
            };
        }

        if changed {
            let output = session.output();
            tracing::info!(
                generation = session.generation(),
                changes = batch.len(),
                valid = output.report.is_valid(),
                "rebuilt"
            );
            on_update(output);
        }
    }
    Ok(())
}
