//! Small cross-cutting utilities
//!
//! Currently path handling: cache keys and visited-set entries must compare
//! equal for every spelling of the same file, so all schema paths are run
//! through [`normalize_path`] before use.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path without touching the filesystem.
///
/// Resolves `.` and `..` components and drops redundant separators. Unlike
/// `std::fs::canonicalize` this never fails and does not require the path to
/// exist, which matters for cache keys of files that may have been deleted.
///
/// Leading `..` components on relative paths are preserved since there is
/// nothing to collapse them against.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = normalized.components().next_back().is_some_and(|c| {
                    !matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
                });
                if popped {
                    normalized.pop();
                } else if !matches!(
                    normalized.components().next_back(),
                    Some(Component::RootDir | Component::Prefix(_))
                ) {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

/// Check whether a string is a syntactically valid directive key identifier:
/// a letter or underscore followed by letters, digits, `_`, or `-`.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
