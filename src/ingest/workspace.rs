//! Per-request scratch workspaces.
//!
//! Every multipart request gets its own freshly created directory under the
//! scratch root before decoding starts. The directory is removed when the
//! request is done with it:
//!
//! - normally through [`Workspace::release`], awaited before the response is sent;
//! - otherwise when the [`Workspace`] is dropped (handler future cancelled
//!   because the client disconnected, a timeout fired, or a panic unwound).
//!
//! Names are unique per request (`<unix-millis>-<random>`), so concurrent
//! requests never share a directory and creating siblings needs no locking.
//! Workspaces are registered as active until they are gone; the janitor
//! never touches an active one, however old its directory looks.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use dashmap::DashSet;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::metrics;

/// Directory under which workspaces are created.
#[derive(Debug, Clone)]
pub struct ScratchRoot {
    root: PathBuf,
    /// Workspaces owned by in-flight requests.
    active: Arc<DashSet<PathBuf>>,
}

impl ScratchRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            active: Arc::new(DashSet::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Number of workspaces currently owned by requests.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Create a fresh workspace, creating the root first if needed.
    pub async fn acquire(&self) -> AppResult<Workspace> {
        tokio::fs::create_dir_all(&self.root).await?;

        let root = self.root.clone();
        let prefix = format!("{}-", Utc::now().timestamp_millis());
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(root)
        })
        .await
        .map_err(|e| AppError::Internal(format!("workspace task failed: {e}")))??;

        let path = dir.path().to_path_buf();
        self.active.insert(path.clone());
        debug!(workspace = %path.display(), "Workspace acquired");
        metrics::workspace_opened();

        Ok(Workspace {
            path,
            dir: Some(dir),
            active: self.active.clone(),
        })
    }

    /// Run `f` inside a fresh workspace, releasing it on every exit path.
    ///
    /// The workspace is removed before this returns, whether `f` succeeded or
    /// failed. If the returned future is dropped mid-flight the workspace's
    /// `Drop` removes the directory instead.
    pub async fn with_workspace<F, Fut, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let workspace = self.acquire().await?;
        let result = f(workspace.path().to_path_buf()).await;
        workspace.release().await;
        result
    }

    /// Remove entries older than `max_age` that no request owns.
    ///
    /// Catches workspaces orphaned when a previous process was killed before
    /// it could release them. Returns how many entries were removed.
    pub async fn sweep(&self, max_age: Duration) -> AppResult<usize> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if self.active.contains(&path) {
                continue;
            }

            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            let result = if metadata.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };

            match result {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %path.display(), age_secs = age.as_secs(), "Removed orphaned workspace");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove orphaned workspace"),
            }
        }

        if removed > 0 {
            info!(removed, root = %self.root.display(), "Scratch root swept");
            metrics::record_workspaces_swept(removed as u64);
        }

        Ok(removed)
    }
}

/// A scratch directory exclusively owned by one request.
pub struct Workspace {
    path: PathBuf,
    dir: Option<TempDir>,
    active: Arc<DashSet<PathBuf>>,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recursively remove the directory.
    ///
    /// A directory that is already gone counts as released. Other removal
    /// failures are logged; they do not fail the request.
    pub async fn release(mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(Ok(())) => debug!(workspace = %path.display(), "Workspace released"),
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!(workspace = %path.display(), "Workspace already removed");
            }
            Ok(Err(e)) => {
                warn!(workspace = %path.display(), error = %e, "Failed to remove workspace");
            }
            Err(e) => {
                warn!(workspace = %path.display(), error = %e, "Workspace removal task failed");
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            // Request abandoned before `release`; TempDir removes the tree.
            warn!(workspace = %self.path.display(), "Workspace dropped without release, removing");
            drop(dir);
        }
        self.active.remove(&self.path);
        metrics::workspace_closed();
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("path", &self.path)
            .field("released", &self.dir.is_none())
            .finish()
    }
}
