//! Filesystem operation abstractions for dependency injection.
//!
//! Provides the [`FileSystemOps`] trait so that repository sync and installers
//! can be unit-tested without touching the real filesystem. Production code
//! uses [`SystemFileSystemOps`]; tests use `MockFileSystemOps`.

use anyhow::{Context as _, Result};
use std::path::Path;

/// Abstraction over the filesystem work done by sync and installers.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `path` exists on the filesystem.
    fn exists(&self, path: &Path) -> bool;

    /// Recursively copy the directory `src` to `dst`, skipping `.git`.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created or a file copied.
    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Copy a single file, creating the parent directory of `dst`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent cannot be created or the copy fails.
    fn copy_file(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Remove `path` whether it is a file, symlink, or directory tree.
    /// Removing a path that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the path exists but cannot be removed.
    fn remove_all(&self, path: &Path) -> Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<()> {
        copy_dir_recursive(src, dst)
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create parent: {}", parent.display()))?;
        }
        std::fs::copy(src, dst)
            .with_context(|| format!("copying {} to {}", src.display(), dst.display()))?;
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        let Ok(meta) = std::fs::symlink_metadata(path) else {
            return Ok(());
        };
        if meta.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
        .with_context(|| format!("removing {}", path.display()))
    }
}

/// Recursively copy a directory tree, leaving out `.git` directories.
///
/// Symlinks within the source tree are followed, so directory symlinks are
/// materialised rather than copied as links.
fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)
        .with_context(|| format!("creating directory {}", dst.display()))?;
    for entry in
        std::fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?
    {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            if entry.file_name() == ".git" {
                continue;
            }
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path).with_context(|| {
                format!("copying {} to {}", src_path.display(), dst_path.display())
            })?;
        }
    }
    Ok(())
}

/// Mock [`FileSystemOps`] for unit tests.
///
/// Pre-configure existing paths with [`with_existing`](Self::with_existing);
/// copies and removals are recorded (and reflected in `exists`) but never
/// touch the disk.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockFileSystemOps {
    existing: std::sync::Mutex<std::collections::HashSet<std::path::PathBuf>>,
    copies: std::sync::Mutex<Vec<(std::path::PathBuf, std::path::PathBuf)>>,
    removed: std::sync::Mutex<Vec<std::path::PathBuf>>,
    fail_copies: bool,
}

#[cfg(test)]
impl MockFileSystemOps {
    /// Create an empty mock with nothing configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as existing.
    #[must_use]
    pub fn with_existing(self, path: impl Into<std::path::PathBuf>) -> Self {
        self.existing
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(path.into());
        self
    }

    /// Make every copy fail.
    #[must_use]
    pub const fn failing_copies(mut self) -> Self {
        self.fail_copies = true;
        self
    }

    /// `(src, dst)` pairs of all copies so far.
    pub fn copies(&self) -> Vec<(std::path::PathBuf, std::path::PathBuf)> {
        self.copies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Paths removed so far.
    pub fn removed(&self) -> Vec<std::path::PathBuf> {
        self.removed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn record_copy(&self, src: &Path, dst: &Path) -> Result<()> {
        if self.fail_copies {
            anyhow::bail!("mock: copy of {} refused", src.display());
        }
        self.copies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((src.to_path_buf(), dst.to_path_buf()));
        self.existing
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(dst.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
impl FileSystemOps for MockFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        self.existing
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(path)
    }

    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<()> {
        self.record_copy(src, dst)
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        self.record_copy(src, dst)
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        self.existing
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(path);
        self.removed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn copy_tree_copies_files_and_subdirectories() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        std::fs::write(src.path().join("a.txt"), b"aaa").unwrap();
        std::fs::create_dir(src.path().join("sub")).unwrap();
        std::fs::write(src.path().join("sub/b.txt"), b"bbb").unwrap();

        let target = dst.path().join("out");
        SystemFileSystemOps.copy_tree(src.path(), &target).unwrap();

        assert_eq!(std::fs::read(target.join("a.txt")).unwrap(), b"aaa");
        assert_eq!(std::fs::read(target.join("sub/b.txt")).unwrap(), b"bbb");
    }

    #[test]
    fn copy_tree_skips_git_directory() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        std::fs::write(src.path().join("file.txt"), b"content").unwrap();
        std::fs::create_dir(src.path().join(".git")).unwrap();
        std::fs::write(src.path().join(".git/HEAD"), b"ref: refs/heads/main").unwrap();

        let target = dst.path().join("out");
        SystemFileSystemOps.copy_tree(src.path(), &target).unwrap();

        assert!(target.join("file.txt").exists());
        assert!(
            !target.join(".git").exists(),
            ".git directory should be skipped"
        );
    }

    #[test]
    fn copy_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tool");
        std::fs::write(&src, b"#!/bin/sh\n").unwrap();
        let dst = dir.path().join("bin/nested/tool");
        SystemFileSystemOps.copy_file(&src, &dst).unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"#!/bin/sh\n");
    }

    #[test]
    fn remove_all_removes_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("pkg");
        std::fs::create_dir_all(tree.join("a/b")).unwrap();
        std::fs::write(tree.join("a/b/c.txt"), "c").unwrap();
        SystemFileSystemOps.remove_all(&tree).unwrap();
        assert!(!tree.exists());
    }

    #[test]
    fn remove_all_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tool");
        std::fs::write(&file, "x").unwrap();
        SystemFileSystemOps.remove_all(&file).unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn remove_all_noop_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        SystemFileSystemOps
            .remove_all(&dir.path().join("nonexistent"))
            .unwrap();
    }

    #[test]
    fn mock_tracks_copies_and_removals() {
        let fs = MockFileSystemOps::new().with_existing("/cache/pkg");
        fs.copy_tree(Path::new("/cache/pkg"), Path::new("/target/pkg"))
            .unwrap();
        assert!(fs.exists(Path::new("/target/pkg")));
        fs.remove_all(Path::new("/target/pkg")).unwrap();
        assert!(!fs.exists(Path::new("/target/pkg")));
        assert_eq!(fs.removed(), vec![std::path::PathBuf::from("/target/pkg")]);
    }
}
