//! Workspace traversal
//!
//! `WorkspaceWalker` is a lazy depth-first, pre-order iterator over the
//! workspace. Each instance starts from scratch; nothing is cached between
//! walks. Entries inside one folder are yielded in name order. Symlinks and
//! in-flight temporary files are skipped. A folder that vanishes mid-walk is
//! treated as empty.

use log::warn;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::vec::IntoIter;

use crate::error::StorageError;
use crate::storage::validation::TEMP_PREFIX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Folder,
    File,
}

/// One item of a workspace listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceEntry {
    /// Slash-delimited path relative to the workspace root
    pub path: String,
    pub kind: EntryKind,
}

impl WorkspaceEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// A child waiting to be yielded: its entry plus where to descend if it is a folder.
type Pending = (WorkspaceEntry, PathBuf);

pub struct WorkspaceWalker {
    root: PathBuf,
    stack: Vec<IntoIter<Pending>>,
    started: bool,
}

impl WorkspaceWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stack: Vec::new(),
            started: false,
        }
    }
}

impl Iterator for WorkspaceWalker {
    type Item = Result<WorkspaceEntry, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            match read_children(&self.root, "") {
                Ok(children) => self.stack.push(children.into_iter()),
                Err(e) => return Some(Err(e)),
            }
        }

        loop {
            let frame = self.stack.last_mut()?;
            match frame.next() {
                Some((entry, real)) => {
                    if entry.is_folder() {
                        match read_children(&real, &entry.path) {
                            Ok(children) => self.stack.push(children.into_iter()),
                            Err(e) => return Some(Err(e)),
                        }
                    }
                    return Some(Ok(entry));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

fn read_children(dir: &Path, prefix: &str) -> Result<Vec<Pending>, StorageError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        // Removed by a concurrent delete since we saw it
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::Io(e)),
    };

    let mut children = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(StorageError::Io(e)),
        };

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping non UTF-8 name in {}", dir.display());
            continue;
        };
        if name.starts_with(TEMP_PREFIX) {
            continue;
        }

        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(StorageError::Io(e)),
        };
        let kind = if file_type.is_dir() {
            EntryKind::Folder
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            warn!("Skipping non-regular entry {}", entry.path().display());
            continue;
        };

        let path = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };
        children.push((WorkspaceEntry { path, kind }, entry.path()));
    }

    children.sort_by(|a, b| a.0.path.cmp(&b.0.path));
    Ok(children)
}
