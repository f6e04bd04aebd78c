//! Lazy recursive directory enumeration

use crate::{Result, SyncError};
use futures::Stream;
use std::path::{Component, Path, PathBuf};
use tokio::fs::ReadDir;
use tracing::debug;

/// One-shot, depth-first walk over the regular files under a root
///
/// A subdirectory is walked completely before its next sibling is looked at.
/// Only the chain of currently open directories is held in memory. The first
/// listing or stat failure is yielded as [`SyncError::Traversal`] and ends
/// the walk.
pub struct TreeWalker {
    root: PathBuf,
    stack: Vec<(PathBuf, ReadDir)>,
    started: bool,
    finished: bool,
}

impl TreeWalker {
    /// Prepare a walk; nothing is read until the first call to `next`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stack: Vec::new(),
            started: false,
            finished: false,
        }
    }

    /// The directory being walked
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next file path, or `None` once the walk is over
    pub async fn next(&mut self) -> Option<Result<PathBuf>> {
        if self.finished {
            return None;
        }

        if !self.started {
            self.started = true;
            match tokio::fs::read_dir(&self.root).await {
                Ok(entries) => self.stack.push((self.root.clone(), entries)),
                Err(e) => return Some(Err(self.fail(self.root.clone(), e))),
            }
        }

        loop {
            let Some((_, entries)) = self.stack.last_mut() else {
                self.finished = true;
                return None;
            };

            let next = entries.next_entry().await;
            let entry = match next {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    self.stack.pop();
                    continue;
                }
                Err(e) => {
                    let dir = self.stack.last().map(|(dir, _)| dir.clone()).unwrap_or_default();
                    return Some(Err(self.fail(dir, e)));
                }
            };

            let path = entry.path();
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => return Some(Err(self.fail(path, e))),
            };

            if metadata.is_dir() {
                match tokio::fs::read_dir(&path).await {
                    Ok(entries) => self.stack.push((path, entries)),
                    Err(e) => return Some(Err(self.fail(path, e))),
                }
            } else if metadata.is_file() {
                return Some(Ok(path));
            } else {
                debug!(path = %path.display(), "Skipping special file");
            }
        }
    }

    /// Adapt into a `Stream` for use with stream combinators
    pub fn into_stream(self) -> impl Stream<Item = Result<PathBuf>> {
        futures::stream::unfold(self, |mut walker| async move {
            walker.next().await.map(|item| (item, walker))
        })
    }

    fn fail(&mut self, path: PathBuf, source: std::io::Error) -> SyncError {
        self.finished = true;
        self.stack.clear();
        SyncError::Traversal { path, source }
    }
}

/// Key of `path` inside `root`: `/`-separated, no leading separator
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<_>>()?;

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
