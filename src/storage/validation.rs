//! Path validation
//!
//! Every caller-supplied path goes through `resolve_within_root` before any
//! filesystem call touches it. Normalisation is purely lexical; the
//! containment check then canonicalises the deepest existing ancestor so
//! symlinks cannot smuggle a path outside the root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Name prefix reserved for in-flight temporary files.
pub const TEMP_PREFIX: &str = ".vellum-tmp-";

/// A path that passed containment checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Normalised, slash-delimited path relative to the workspace root
    pub relative: String,
    /// Absolute location on disk
    pub real: PathBuf,
}

/// Lexically normalise a workspace-relative path.
///
/// Resolves `.` and `..`, collapses repeated slashes, and rejects empty,
/// absolute, drive-prefixed, backslash-, NUL-, or control-character-bearing
/// input as well as anything that climbs above the root or names the root
/// itself.
pub fn normalize_relative_path(raw: &str) -> Result<String, StorageError> {
    if raw.trim().is_empty() {
        return Err(StorageError::InvalidPath("Empty path".into()));
    }

    if raw.contains('\0') {
        return Err(StorageError::InvalidPath(format!(
            "{:?} contains a NUL byte",
            raw
        )));
    }

    if raw.chars().any(|c| c.is_control()) {
        return Err(StorageError::InvalidPath(format!(
            "{:?} contains control characters",
            raw
        )));
    }

    if raw.starts_with('/') || Path::new(raw).has_root() || has_drive_prefix(raw) {
        return Err(StorageError::InvalidPath(format!("{} is absolute", raw)));
    }

    if raw.contains('\\') {
        return Err(StorageError::InvalidPath(format!(
            "{} contains a backslash",
            raw
        )));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return Err(StorageError::InvalidPath(format!(
                        "{} escapes the workspace root",
                        raw
                    )));
                }
            }
            name if name.starts_with(TEMP_PREFIX) => {
                return Err(StorageError::InvalidPath(format!(
                    "{} uses a reserved name",
                    raw
                )));
            }
            name => segments.push(name),
        }
    }

    if segments.is_empty() {
        return Err(StorageError::InvalidPath(format!(
            "{} refers to the workspace root",
            raw
        )));
    }

    Ok(segments.join("/"))
}

/// Normalise `raw`, join it to `root`, and verify the result stays inside.
///
/// `root` must already be canonical.
pub fn resolve_within_root(root: &Path, raw: &str) -> Result<ResolvedPath, StorageError> {
    let relative = normalize_relative_path(raw)?;
    let real = root.join(&relative);
    ensure_contained(root, &real, raw)?;
    Ok(ResolvedPath { relative, real })
}

/// Checks that the deepest existing ancestor of `real` canonicalises to a
/// location under `root`.
fn ensure_contained(root: &Path, real: &Path, raw: &str) -> Result<(), StorageError> {
    let mut cursor = real;
    loop {
        match fs::symlink_metadata(cursor) {
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                cursor = cursor.parent().ok_or_else(|| {
                    StorageError::InvalidPath(format!("{} has no existing ancestor", raw))
                })?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotADirectory => {
                // Some ancestor is a file; let the operation report it
                cursor = cursor.parent().ok_or_else(|| {
                    StorageError::InvalidPath(format!("{} has no existing ancestor", raw))
                })?;
            }
            Err(e) => return Err(StorageError::Io(e)),
        }
    }

    let canonical = match cursor.canonicalize() {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StorageError::InvalidPath(format!(
                "{} passes through a dangling link",
                raw
            )));
        }
        Err(e) => return Err(StorageError::Io(e)),
    };

    if !canonical.starts_with(root) {
        return Err(StorageError::InvalidPath(format!(
            "{} escapes the workspace root",
            raw
        )));
    }

    Ok(())
}

/// `C:` style prefixes, rejected on every platform for portability.
fn has_drive_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn invalid(raw: &str) -> bool {
        matches!(normalize_relative_path(raw), Err(e) if e.kind() == ErrorKind::InvalidPath)
    }

    #[test]
    fn normalizes_dots_and_slashes() {
        assert_eq!(normalize_relative_path("a/b.txt").unwrap(), "a/b.txt");
        assert_eq!(normalize_relative_path("./a//b/./c").unwrap(), "a/b/c");
        assert_eq!(normalize_relative_path("a/x/../b").unwrap(), "a/b");
        assert_eq!(normalize_relative_path("a/").unwrap(), "a");
        assert_eq!(normalize_relative_path("notes v2.txt").unwrap(), "notes v2.txt");
    }

    #[test]
    fn rejects_traversal() {
        assert!(invalid("../../etc/passwd"));
        assert!(invalid(".."));
        assert!(invalid("a/../../b"));
        assert!(invalid("a/b/../../../c"));
    }

    #[test]
    fn rejects_absolute_and_prefixed() {
        assert!(invalid("/etc/passwd"));
        assert!(invalid("//server/share"));
        assert!(invalid("C:\\Windows"));
        assert!(invalid("c:relative"));
        assert!(invalid("a\\..\\..\\b"));
    }

    #[test]
    fn rejects_nul_and_control_bytes() {
        assert!(invalid("file\0.txt"));
        assert!(invalid("a/b\0/../c"));
        assert!(invalid("line\nbreak"));
    }

    #[test]
    fn rejects_root_and_empty() {
        assert!(invalid(""));
        assert!(invalid("   "));
        assert!(invalid("."));
        assert!(invalid("./"));
        assert!(invalid("a/.."));
    }

    #[test]
    fn rejects_reserved_temp_names() {
        assert!(invalid(".vellum-tmp-abc"));
        assert!(invalid("docs/.vellum-tmp-x/y"));
    }

    #[test]
    fn resolves_inside_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();

        let resolved = resolve_within_root(&root, "docs/new/file.txt").unwrap();
        assert_eq!(resolved.relative, "docs/new/file.txt");
        assert_eq!(resolved.real, root.join("docs/new/file.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escape() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("escape")).unwrap();

        let err = resolve_within_root(&root, "escape/secret.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
        let err = resolve_within_root(&root, "escape").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
    }
}
