//! File system storage management
//!
//! Handles path validation, atomic file operations, and workspace traversal.

pub mod commit;
pub mod filesystem;
pub mod locks;
pub mod validation;
pub mod walker;
pub mod workspace;

pub use validation::{ResolvedPath, TEMP_PREFIX, normalize_relative_path, resolve_within_root};
pub use walker::{EntryKind, WorkspaceEntry, WorkspaceWalker};
pub use workspace::Workspace;
