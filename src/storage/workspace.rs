//! Workspace
//!
//! Async front of the storage layer. Paths are normalised first, mutations
//! take the per-path lock, and the blocking filesystem work runs on tokio's
//! blocking pool under the configured timeout.

use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::StorageError;
use crate::storage::commit::{CommitGate, GateError, run_gated};
use crate::storage::filesystem;
use crate::storage::locks::{PathGuard, PathLocks};
use crate::storage::validation::{normalize_relative_path, resolve_within_root};
use crate::storage::walker::{WorkspaceEntry, WorkspaceWalker};

pub struct Workspace {
    root: PathBuf,
    locks: Arc<PathLocks>,
    timeout: Duration,
}

impl Workspace {
    /// Open the workspace at `root`, creating the folder if needed.
    pub fn open(root: &Path, timeout: Duration) -> Result<Self, StorageError> {
        fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        filesystem::remove_stale_temp_files(&root)?;
        info!("Workspace root: {}", root.display());

        Ok(Self {
            root,
            locks: PathLocks::new(),
            timeout,
        })
    }

    /// Canonical workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A fresh lazy traversal of the workspace (blocking iterator).
    pub fn walk(&self) -> WorkspaceWalker {
        WorkspaceWalker::new(&self.root)
    }

    /// Full depth-first listing, recomputed on every call.
    pub async fn list(&self) -> Result<Vec<WorkspaceEntry>, StorageError> {
        let root = self.root.clone();
        self.run_blocking("list", None, move |_gate| {
            WorkspaceWalker::new(root).collect::<Result<Vec<_>, _>>()
        })
        .await
    }

    /// Create a folder. Returns the normalised path.
    pub async fn create_folder(&self, raw: &str) -> Result<String, StorageError> {
        let guard = self.lock(raw).await?;
        let root = self.root.clone();
        let raw = raw.to_string();
        self.run_blocking("create_folder", Some(guard), move |gate| {
            let target = resolve_within_root(&root, &raw)?;
            filesystem::create_folder(&root, &target, gate)?;
            Ok(target.relative)
        })
        .await
    }

    pub async fn read_file(&self, raw: &str) -> Result<String, StorageError> {
        normalize_relative_path(raw)?;
        let root = self.root.clone();
        let raw = raw.to_string();
        self.run_blocking("read_file", None, move |_gate| {
            let target = resolve_within_root(&root, &raw)?;
            filesystem::read_file(&target)
        })
        .await
    }

    /// Atomically replace or create a file. Returns the normalised path.
    pub async fn write_file(&self, raw: &str, content: String) -> Result<String, StorageError> {
        let guard = self.lock(raw).await?;
        let root = self.root.clone();
        let raw = raw.to_string();
        self.run_blocking("write_file", Some(guard), move |gate| {
            let target = resolve_within_root(&root, &raw)?;
            filesystem::write_file(&root, &target, &content, gate)?;
            Ok(target.relative)
        })
        .await
    }

    /// Delete a file or an empty folder. Returns the normalised path.
    pub async fn delete(&self, raw: &str) -> Result<String, StorageError> {
        let guard = self.lock(raw).await?;
        let root = self.root.clone();
        let raw = raw.to_string();
        self.run_blocking("delete", Some(guard), move |gate| {
            let target = resolve_within_root(&root, &raw)?;
            filesystem::delete_entry(&target, gate)?;
            Ok(target.relative)
        })
        .await
    }

    /// Validate the path lexically and take its mutation lock.
    async fn lock(&self, raw: &str) -> Result<PathGuard, StorageError> {
        let relative = normalize_relative_path(raw)?;
        tokio::time::timeout(self.timeout, self.locks.acquire(&relative))
            .await
            .map_err(|_| {
                warn!("Timed out waiting for lock on \"{}\"", relative);
                StorageError::Timeout(self.timeout_ms())
            })
    }

    /// Run `op` on the blocking pool, bounded by the storage timeout.
    ///
    /// The path guard moves into the blocking task, so the lock is held until
    /// the filesystem work really ends, even if the caller stopped waiting.
    async fn run_blocking<T, F>(
        &self,
        operation: &'static str,
        guard: Option<PathGuard>,
        op: F,
    ) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&CommitGate) -> Result<T, StorageError> + Send + 'static,
    {
        let outcome = run_gated(self.timeout, move |gate| {
            let _guard = guard;
            op(gate)
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(GateError::TimedOut) => {
                warn!(
                    "Storage operation {} timed out after {} ms",
                    operation,
                    self.timeout_ms()
                );
                Err(StorageError::Timeout(self.timeout_ms()))
            }
            Err(GateError::Failed(e)) => Err(StorageError::Io(std::io::Error::other(format!(
                "{} task failed: {}",
                operation, e
            )))),
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}
