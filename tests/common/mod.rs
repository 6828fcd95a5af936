// Shared helpers for integration tests.
//
// Provides throwaway upstream git repositories backed by temporary
// directories, so each test can exercise real clone/fetch/reset/checkout
// sequences without network access.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

/// Run git in `dir` with a fixed identity and no user or system config,
/// panicking on failure. Returns trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=packsync tests",
            "-c",
            "user.email=tests@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .output()
        .expect("failed to launch git");
    assert!(
        output.status.success(),
        "git {args:?} failed in {}: {}",
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Read a file to a string, panicking if it is missing.
pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}

/// A source repository with a `main` default branch.
///
/// The repository's HEAD always points back at `main` after each helper
/// returns, so clones see `main` as the remote default branch.
pub struct Upstream {
    dir: tempfile::TempDir,
}

impl Upstream {
    /// Create a repository with one commit writing `README` = `"v1\n"`.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create upstream dir");
        git(dir.path(), &["init", "-q"]);
        git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        let upstream = Self { dir };
        upstream.commit("README", "v1\n", "initial");
        upstream
    }

    /// Path to the repository, usable as a clone source.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The repository path as a string remote.
    pub fn remote(&self) -> String {
        self.path().display().to_string()
    }

    /// The repository as a `file://` URL.
    pub fn url(&self) -> String {
        format!("file://{}", self.path().display())
    }

    /// Commit `contents` to `file` on the current branch.
    pub fn commit(&self, file: &str, contents: &str, message: &str) {
        let path = self.path().join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, contents).expect("write upstream file");
        git(self.path(), &["add", "--all"]);
        git(self.path(), &["commit", "-q", "-m", message]);
    }

    /// Commit `contents` to `file` on `branch` (created from `main` if new),
    /// then switch back to `main`.
    pub fn commit_on(&self, branch: &str, file: &str, contents: &str) {
        let exists = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .current_dir(self.path())
            .output()
            .is_ok_and(|o| o.status.success());
        if exists {
            git(self.path(), &["checkout", "-q", branch]);
        } else {
            git(self.path(), &["checkout", "-q", "-b", branch, "main"]);
        }
        self.commit(file, contents, &format!("{branch}: {file}"));
        git(self.path(), &["checkout", "-q", "main"]);
    }

    /// Tag the current `main` commit.
    pub fn tag(&self, name: &str) {
        git(self.path(), &["tag", name, "main"]);
    }

    /// Commit id `rev` resolves to.
    pub fn rev(&self, rev: &str) -> String {
        git(self.path(), &["rev-parse", rev])
    }
}

/// Commit id checked out in a local working copy.
pub fn head(local: &Path) -> String {
    git(local, &["rev-parse", "HEAD"])
}

/// A scratch directory that local working copies live under.
pub struct Scratch {
    dir: tempfile::TempDir,
}

impl Scratch {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create scratch dir"),
        }
    }

    /// A path under the scratch directory (not created).
    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
