//! File-open helper shared by the durable components
//!
//! Resolves a path to an absolute, lexically cleaned form, creates missing
//! parent directories and the file itself if absent, then opens it for
//! read + append.

use crate::{Result, SiltError};
use std::fs::{self, File, OpenOptions};
use std::path::{Component, Path, PathBuf};

/// Open the file at `path`, creating it and any missing parent directories
///
/// Returns the handle together with the resolved path.
pub(crate) fn open_or_create(path: &Path) -> Result<(File, PathBuf)> {
    let path = resolve(path)?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|e| SiltError::Path(format!("creating {}: {}", dir.display(), e)))?;
    }
    let file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(&path)?;
    Ok((file, path))
}

/// Absolute, lexically cleaned form of `path`; `.` and `..` components are
/// resolved without touching the file system
fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| SiltError::Path(format!("resolving working directory: {}", e)))?
            .join(path)
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_creates_missing_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a/b/c/file.log");
        let (mut file, resolved) = open_or_create(&path).unwrap();
        assert!(resolved.is_absolute());
        file.write_all(b"hello").unwrap();
        assert_eq!(fs::read(&resolved).unwrap(), b"hello");
    }

    #[test]
    fn test_reopens_existing_for_append() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.log");
        {
            let (mut file, _) = open_or_create(&path).unwrap();
            file.write_all(b"one").unwrap();
        }
        let (mut file, _) = open_or_create(&path).unwrap();
        file.write_all(b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"onetwo");
    }

    #[test]
    fn test_cleans_dot_components() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sub/./../sub/file.log");
        let (_, resolved) = open_or_create(&path).unwrap();
        assert_eq!(resolved, temp_dir.path().join("sub/file.log"));
    }
}
