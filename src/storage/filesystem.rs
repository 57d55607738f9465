//! File system operations
//!
//! Blocking primitives behind every workspace mutation. Each function takes
//! an already-contained `ResolvedPath` and calls `gate.try_commit()` right
//! before its first visible change; until then nothing on disk differs from
//! the prior state except reserved-name temporary files.

use log::{debug, info, warn};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::commit::CommitGate;
use crate::storage::validation::{ResolvedPath, TEMP_PREFIX};

/// Create a folder, including any missing parents.
///
/// Parents created here are removed again if a later step fails.
pub fn create_folder(
    root: &Path,
    target: &ResolvedPath,
    gate: &CommitGate,
) -> Result<(), StorageError> {
    if entry_exists(&target.real)? {
        return Err(StorageError::AlreadyExists(target.relative.clone()));
    }

    let missing = missing_parents(root, target)?;

    if !gate.try_commit() {
        return Err(StorageError::Abandoned(target.relative.clone()));
    }

    let created = create_parents(&missing)?;
    match fs::create_dir(&target.real) {
        Ok(()) => {
            debug!("Folder \"{}\" created", target.relative);
            Ok(())
        }
        Err(e) => {
            rollback(&created);
            if e.kind() == io::ErrorKind::AlreadyExists {
                Err(StorageError::AlreadyExists(target.relative.clone()))
            } else {
                Err(StorageError::Io(e))
            }
        }
    }
}

/// Read a whole text file.
pub fn read_file(target: &ResolvedPath) -> Result<String, StorageError> {
    match fs::symlink_metadata(&target.real) {
        Ok(meta) if meta.is_dir() => return Err(StorageError::IsFolder(target.relative.clone())),
        Ok(_) => {}
        Err(e) if is_missing(&e) => return Err(StorageError::NotFound(target.relative.clone())),
        Err(e) => return Err(StorageError::Io(e)),
    }

    match fs::read_to_string(&target.real) {
        Ok(content) => Ok(content),
        Err(e) if is_missing(&e) => Err(StorageError::NotFound(target.relative.clone())),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            Err(StorageError::NotText(target.relative.clone()))
        }
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Replace (or create) a file's entire content atomically.
///
/// Content goes to a reserved-name temp file in an existing folder, is
/// synced, and is renamed over the target only after the gate commits.
pub fn write_file(
    root: &Path,
    target: &ResolvedPath,
    content: &str,
    gate: &CommitGate,
) -> Result<(), StorageError> {
    match fs::symlink_metadata(&target.real) {
        Ok(meta) if meta.is_dir() => return Err(StorageError::IsFolder(target.relative.clone())),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) if e.kind() == io::ErrorKind::NotADirectory => {
            return Err(StorageError::InvalidPath(format!(
                "{} has a file as a parent",
                target.relative
            )));
        }
        Err(e) => return Err(StorageError::Io(e)),
    }

    let missing = missing_parents(root, target)?;
    // Stage next to the target when possible; otherwise in the closest
    // existing ancestor. Either way the final rename stays on one filesystem.
    let staging_dir = match missing.first() {
        Some(first_missing) => first_missing.parent().unwrap_or(root).to_path_buf(),
        None => target.real.parent().unwrap_or(root).to_path_buf(),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(&staging_dir)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;

    if !gate.try_commit() {
        debug!("Write to \"{}\" abandoned before commit", target.relative);
        return Err(StorageError::Abandoned(target.relative.clone()));
    }

    let created = create_parents(&missing)?;
    match temp.persist(&target.real) {
        Ok(_) => {
            sync_dir(target.real.parent().unwrap_or(root));
            info!(
                "File \"{}\" written ({} bytes)",
                target.relative,
                content.len()
            );
            Ok(())
        }
        Err(e) => {
            rollback(&created);
            if target.real.is_dir() {
                Err(StorageError::IsFolder(target.relative.clone()))
            } else {
                Err(StorageError::Io(e.error))
            }
        }
    }
}

/// Delete a file, or a folder only if it is empty.
pub fn delete_entry(target: &ResolvedPath, gate: &CommitGate) -> Result<(), StorageError> {
    let meta = match fs::symlink_metadata(&target.real) {
        Ok(meta) => meta,
        Err(e) if is_missing(&e) => return Err(StorageError::NotFound(target.relative.clone())),
        Err(e) => return Err(StorageError::Io(e)),
    };

    if meta.is_dir() {
        // Staging files are invisible to users and do not make a folder non-empty
        let (has_entries, staged) = scan_folder(&target.real)?;
        if has_entries {
            return Err(StorageError::NotEmpty(target.relative.clone()));
        }
        if !gate.try_commit() {
            return Err(StorageError::Abandoned(target.relative.clone()));
        }
        for temp in staged {
            match fs::remove_file(&temp) {
                Ok(()) => debug!("Removed staging file {}", temp.display()),
                Err(e) if is_missing(&e) => {}
                Err(e) => return Err(StorageError::Io(e)),
            }
        }
        // remove_dir itself refuses non-empty folders, covering entries added since the check
        match fs::remove_dir(&target.real) {
            Ok(()) => {
                debug!("Folder \"{}\" deleted", target.relative);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {
                Err(StorageError::NotEmpty(target.relative.clone()))
            }
            Err(e) if is_missing(&e) => Err(StorageError::NotFound(target.relative.clone())),
            Err(e) => Err(StorageError::Io(e)),
        }
    } else {
        if !gate.try_commit() {
            return Err(StorageError::Abandoned(target.relative.clone()));
        }
        match fs::remove_file(&target.real) {
            Ok(()) => {
                debug!("File \"{}\" deleted", target.relative);
                Ok(())
            }
            Err(e) if is_missing(&e) => Err(StorageError::NotFound(target.relative.clone())),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Remove staging files left behind by an interrupted write, anywhere under `root`.
///
/// Links are not followed. Returns how many files were removed.
pub fn remove_stale_temp_files(root: &Path) -> Result<usize, StorageError> {
    let mut removed = 0;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if is_missing(&e) => continue,
            Err(e) => return Err(StorageError::Io(e)),
        };
        for entry in entries {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() && is_staging_name(&entry.file_name().to_string_lossy()) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
    }

    if removed > 0 {
        info!("Removed {} stale staging files under {}", removed, root.display());
    }
    Ok(removed)
}

/// Whether `dir` holds anything besides staging files, plus the staging files found.
fn scan_folder(dir: &Path) -> Result<(bool, Vec<PathBuf>), StorageError> {
    let mut staged = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_missing(&e) => continue,
            Err(e) => return Err(StorageError::Io(e)),
        };
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file && is_staging_name(&entry.file_name().to_string_lossy()) {
            staged.push(entry.path());
        } else {
            return Ok((true, staged));
        }
    }
    Ok((false, staged))
}

fn is_staging_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX)
}

/// Whether anything (file, folder, or link) sits at `path`.
fn entry_exists(path: &Path) -> Result<bool, StorageError> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        // A file in the middle of the path: nothing can exist below it
        Err(e) if e.kind() == io::ErrorKind::NotADirectory => Ok(false),
        Err(e) => Err(StorageError::Io(e)),
    }
}

fn is_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Ancestors of the target (below `root`) that do not exist yet, outermost first.
///
/// Fails if the nearest existing ancestor is not a folder.
fn missing_parents(root: &Path, target: &ResolvedPath) -> Result<Vec<PathBuf>, StorageError> {
    let mut missing = Vec::new();
    let mut current = target.real.parent();

    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        match fs::symlink_metadata(dir) {
            Ok(meta) if meta.is_dir() => break,
            Ok(_) => {
                return Err(StorageError::InvalidPath(format!(
                    "{} has a file as a parent",
                    target.relative
                )));
            }
            Err(e) if is_missing(&e) => missing.push(dir.to_path_buf()),
            Err(e) => return Err(StorageError::Io(e)),
        }
        current = dir.parent();
    }

    missing.reverse();
    Ok(missing)
}

/// Create folders in order; on failure remove the ones this call created.
fn create_parents(missing: &[PathBuf]) -> Result<Vec<PathBuf>, StorageError> {
    let mut created = Vec::with_capacity(missing.len());
    for dir in missing {
        match fs::create_dir(dir) {
            Ok(()) => created.push(dir.clone()),
            // Created concurrently by another writer; fine as long as it is a folder
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => {}
            Err(e) => {
                rollback(&created);
                return Err(StorageError::Io(e));
            }
        }
    }
    Ok(created)
}

/// Remove folders created by this operation, innermost first.
fn rollback(created: &[PathBuf]) {
    for dir in created.iter().rev() {
        if let Err(e) = fs::remove_dir(dir) {
            warn!("Rollback could not remove {}: {}", dir.display(), e);
        }
    }
}

/// Persist the rename itself; best effort, not every platform supports it.
fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        if let Ok(handle) = fs::File::open(dir) {
            let _ = handle.sync_all();
        }
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
}
