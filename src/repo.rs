//! Repository synchronization.
//!
//! [`RepoSync`] makes a local working copy match a remote repository at a
//! given reference. When the local path holds no working copy it is cloned;
//! otherwise the existing copy is fetched and hard-reset, discarding any local
//! changes. The working copy is a cache, never a user workspace.
//!
//! The sequence stops at the first failing git command. A clone whose
//! follow-up checkout fails is left on disk: the next sync sees `.git`, takes
//! the update path, and repairs it.
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::SyncError;
use crate::exec::{Executor, SystemExecutor};
use crate::operations::{FileSystemOps, SystemFileSystemOps};

const GIT: &str = "git";
const ORIGIN: &str = "origin";
const ORIGIN_HEAD: &str = "origin/HEAD";
const CONTROL_DIR: &str = ".git";

/// Which reference to check out after synchronizing.
///
/// With neither field set the working copy follows the remote default branch.
/// Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Branch to check out.
    pub branch: Option<String>,
    /// Tag to check out.
    pub tag: Option<String>,
}

impl SyncOptions {
    /// Options that check out `name` as a branch.
    #[must_use]
    pub fn branch(name: impl Into<String>) -> Self {
        Self {
            branch: Some(name.into()),
            tag: None,
        }
    }

    /// Options that check out `name` as a tag.
    #[must_use]
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            branch: None,
            tag: Some(name.into()),
        }
    }

    /// Resolve the reference to check out. A branch takes precedence over a
    /// tag when both are given.
    #[must_use]
    pub fn target(&self) -> Option<GitRef> {
        let branch = self.branch.as_deref().filter(|b| !b.is_empty());
        let tag = self.tag.as_deref().filter(|t| !t.is_empty());
        match (branch, tag) {
            (Some(branch), Some(tag)) => {
                tracing::warn!("both branch '{branch}' and tag '{tag}' given, using the branch");
                Some(GitRef::Branch(branch.to_string()))
            }
            (Some(branch), None) => Some(GitRef::Branch(branch.to_string())),
            (None, Some(tag)) => Some(GitRef::Tag(tag.to_string())),
            (None, None) => None,
        }
    }
}

/// A named reference in a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    /// A branch, checked out to match `origin/<name>`.
    Branch(String),
    /// A tag, checked out as a detached HEAD.
    Tag(String),
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch(name) => write!(f, "branch {name}"),
            Self::Tag(name) => write!(f, "tag {name}"),
        }
    }
}

/// Clones or updates local working copies.
///
/// Holds no state between calls; clones share the same executor. Concurrent
/// syncs against the same local path race on clone-vs-update detection and
/// must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct RepoSync {
    executor: Arc<dyn Executor>,
    fs_ops: Arc<dyn FileSystemOps>,
}

impl Default for RepoSync {
    fn default() -> Self {
        Self::new()
    }
}

impl RepoSync {
    /// Create a syncer that runs the system `git`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_executor(Arc::new(SystemExecutor))
    }

    /// Create a syncer with a custom [`Executor`] and the real filesystem.
    #[must_use]
    pub fn with_executor(executor: Arc<dyn Executor>) -> Self {
        Self::with_ops(executor, Arc::new(SystemFileSystemOps))
    }

    /// Create a syncer with custom command and filesystem implementations.
    #[must_use]
    pub fn with_ops(executor: Arc<dyn Executor>, fs_ops: Arc<dyn FileSystemOps>) -> Self {
        Self { executor, fs_ops }
    }

    /// Whether `local` already holds a working copy.
    #[must_use]
    pub fn is_working_copy(&self, local: &Path) -> bool {
        self.fs_ops.exists(&local.join(CONTROL_DIR))
    }

    /// Synchronize `local` with `remote`, blocking until done.
    ///
    /// Returns the captured output of the last git command.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CommandFailed`] carrying the captured output of the
    /// first git command that exits non-zero, or [`SyncError::Launch`] if git
    /// cannot be started.
    pub fn sync(
        &self,
        remote: &str,
        local: &Path,
        options: &SyncOptions,
    ) -> Result<String, SyncError> {
        let target = options.target();

        let mut output = if self.is_working_copy(local) {
            tracing::info!("updating {} from {remote}", local.display());
            self.update(local)?
        } else {
            tracing::info!("cloning {remote} into {}", local.display());
            self.clone_into(remote, local)?
        };

        if let Some(target) = target {
            tracing::debug!("checking out {target} in {}", local.display());
            output = self.checkout(local, &target)?;
        }

        Ok(output)
    }

    /// Synchronize on the worker pool and report through `completion`.
    ///
    /// `completion` runs exactly once, on a worker thread, after this call has
    /// returned. There is no cancellation and no retry.
    pub fn update_or_clone<F>(
        &self,
        remote: impl Into<String>,
        local: impl Into<PathBuf>,
        options: SyncOptions,
        completion: F,
    ) where
        F: FnOnce(Result<String, SyncError>) + Send + 'static,
    {
        let this = self.clone();
        let remote = remote.into();
        let local = local.into();
        rayon::spawn(move || {
            let result = this.sync(&remote, &local, &options);
            if let Err(e) = &result {
                tracing::warn!("sync of {} failed: {e}", local.display());
            }
            completion(result);
        });
    }

    /// [`update_or_clone`](Self::update_or_clone) following the remote default branch.
    pub fn update_or_clone_default<F>(
        &self,
        remote: impl Into<String>,
        local: impl Into<PathBuf>,
        completion: F,
    ) where
        F: FnOnce(Result<String, SyncError>) + Send + 'static,
    {
        self.update_or_clone(remote, local, SyncOptions::default(), completion);
    }

    fn clone_into(&self, remote: &str, local: &Path) -> Result<String, SyncError> {
        let local = local.to_string_lossy();
        self.git(None, &["clone", "--", remote, &local])
    }

    fn update(&self, local: &Path) -> Result<String, SyncError> {
        self.git(Some(local), &["fetch", "--tags", "--force", ORIGIN])?;
        // fetch never moves origin/HEAD; follow the remote's current default.
        self.git(Some(local), &["remote", "set-head", ORIGIN, "--auto"])?;
        self.git(Some(local), &["reset", "--hard", ORIGIN_HEAD])?;
        self.git(Some(local), &["clean", "-fd"])
    }

    fn checkout(&self, local: &Path, target: &GitRef) -> Result<String, SyncError> {
        match target {
            GitRef::Branch(branch) => {
                let upstream = format!("{ORIGIN}/{branch}");
                self.git(Some(local), &["checkout", "-B", branch, &upstream])
            }
            GitRef::Tag(tag) => {
                let tag_ref = format!("refs/tags/{tag}");
                self.git(Some(local), &["checkout", "--detach", &tag_ref])
            }
        }
    }

    fn git(&self, dir: Option<&Path>, args: &[&str]) -> Result<String, SyncError> {
        let command = command_line(args);
        tracing::debug!("running {command}");

        let result = match dir {
            Some(dir) => self.executor.run_in_unchecked(dir, GIT, args),
            None => self.executor.run_unchecked(GIT, args),
        }
        .map_err(|e| SyncError::Launch {
            command: command.clone(),
            reason: format!("{e:#}"),
        })?;

        if !result.success {
            return Err(SyncError::CommandFailed {
                command,
                code: result.code,
                output: result.combined(),
            });
        }
        Ok(result.combined())
    }
}

fn command_line(args: &[&str]) -> String {
    let mut line = GIT.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::{MockExecutor, UnlaunchableExecutor};
    use crate::operations::MockFileSystemOps;
    use std::sync::mpsc;
    use std::time::Duration;

    const REMOTE: &str = "https://example.com/acme/widgets.git";

    fn fresh(executor: &Arc<MockExecutor>) -> RepoSync {
        RepoSync::with_ops(executor.clone(), Arc::new(MockFileSystemOps::new()))
    }

    fn existing(executor: &Arc<MockExecutor>) -> RepoSync {
        RepoSync::with_ops(
            executor.clone(),
            Arc::new(MockFileSystemOps::new().with_existing("/cache/widgets/.git")),
        )
    }

    // -----------------------------------------------------------------------
    // SyncOptions::target
    // -----------------------------------------------------------------------

    #[test]
    fn target_defaults_to_none() {
        assert_eq!(SyncOptions::default().target(), None);
    }

    #[test]
    fn target_branch() {
        assert_eq!(
            SyncOptions::branch("deploy").target(),
            Some(GitRef::Branch("deploy".to_string()))
        );
    }

    #[test]
    fn target_tag() {
        assert_eq!(
            SyncOptions::tag("1.2.1").target(),
            Some(GitRef::Tag("1.2.1".to_string()))
        );
    }

    #[test]
    fn target_branch_wins_over_tag() {
        let options = SyncOptions {
            branch: Some("deploy".to_string()),
            tag: Some("1.2.1".to_string()),
        };
        assert_eq!(
            options.target(),
            Some(GitRef::Branch("deploy".to_string()))
        );
    }

    #[test]
    fn target_ignores_empty_names() {
        let options = SyncOptions {
            branch: Some(String::new()),
            tag: Some("v2".to_string()),
        };
        assert_eq!(options.target(), Some(GitRef::Tag("v2".to_string())));
    }

    // -----------------------------------------------------------------------
    // Clone path
    // -----------------------------------------------------------------------

    #[test]
    fn clone_when_no_working_copy() {
        let executor = Arc::new(MockExecutor::ok("Cloning into 'widgets'..."));
        let output = fresh(&executor)
            .sync(REMOTE, Path::new("/cache/widgets"), &SyncOptions::default())
            .unwrap();
        assert_eq!(output, "Cloning into 'widgets'...");
        assert_eq!(
            executor.lines(),
            vec![format!("git clone -- {REMOTE} /cache/widgets")]
        );
        assert_eq!(executor.calls()[0].dir, None);
    }

    #[test]
    fn clone_then_checkout_branch() {
        let executor = Arc::new(MockExecutor::with_responses(vec![
            (true, String::new()),
            (true, "Switched to a new branch 'deploy'".to_string()),
        ]));
        let output = fresh(&executor)
            .sync(
                REMOTE,
                Path::new("/cache/widgets"),
                &SyncOptions::branch("deploy"),
            )
            .unwrap();
        assert_eq!(output, "Switched to a new branch 'deploy'");
        insta::assert_snapshot!(executor.lines().join("\n"), @r"
        git clone -- https://example.com/acme/widgets.git /cache/widgets
        git checkout -B deploy origin/deploy
        ");
        assert_eq!(
            executor.calls()[1].dir.as_deref(),
            Some(Path::new("/cache/widgets"))
        );
    }

    #[test]
    fn clone_then_checkout_tag() {
        let executor = Arc::new(MockExecutor::succeeding(2));
        fresh(&executor)
            .sync(
                REMOTE,
                Path::new("/cache/widgets"),
                &SyncOptions::tag("1.2.1"),
            )
            .unwrap();
        assert_eq!(
            executor.lines()[1],
            "git checkout --detach refs/tags/1.2.1"
        );
    }

    #[test]
    fn both_branch_and_tag_checks_out_branch_only() {
        let executor = Arc::new(MockExecutor::succeeding(2));
        let options = SyncOptions {
            branch: Some("deploy".to_string()),
            tag: Some("1.2.1".to_string()),
        };
        fresh(&executor)
            .sync(REMOTE, Path::new("/cache/widgets"), &options)
            .unwrap();
        let lines = executor.lines();
        assert_eq!(lines.len(), 2, "exactly one checkout: {lines:?}");
        assert_eq!(lines[1], "git checkout -B deploy origin/deploy");
    }

    #[test]
    fn clone_failure_carries_output() {
        let executor = Arc::new(MockExecutor::fail(
            "fatal: repository 'https://example.com/acme/widgets.git/' not found",
        ));
        let err = fresh(&executor)
            .sync(
                REMOTE,
                Path::new("/cache/widgets"),
                &SyncOptions::branch("deploy"),
            )
            .unwrap_err();
        assert!(
            matches!(err, SyncError::CommandFailed { code: Some(128), .. }),
            "unexpected error: {err:?}"
        );
        assert!(err.output().contains("not found"));
        assert_eq!(executor.lines().len(), 1, "checkout must not run");
    }

    #[test]
    fn checkout_failure_after_clone_is_failure() {
        let executor = Arc::new(MockExecutor::with_responses(vec![
            (true, String::new()),
            (
                false,
                "fatal: 'origin/nope' is not a commit".to_string(),
            ),
        ]));
        let err = fresh(&executor)
            .sync(
                REMOTE,
                Path::new("/cache/widgets"),
                &SyncOptions::branch("nope"),
            )
            .unwrap_err();
        match err {
            SyncError::CommandFailed {
                command, output, ..
            } => {
                assert_eq!(command, "git checkout -B nope origin/nope");
                assert!(output.contains("is not a commit"));
            }
            other @ SyncError::Launch { .. } => panic!("unexpected error: {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Update path
    // -----------------------------------------------------------------------

    #[test]
    fn update_fetches_and_resets() {
        let executor = Arc::new(MockExecutor::with_responses(vec![
            (true, String::new()),
            (true, "origin/HEAD set to main".to_string()),
            (true, "HEAD is now at 0123abc Add widget".to_string()),
            (true, String::new()),
        ]));
        let output = existing(&executor)
            .sync(REMOTE, Path::new("/cache/widgets"), &SyncOptions::default())
            .unwrap();
        assert_eq!(output, "", "last command output (clean) is returned");
        insta::assert_snapshot!(executor.lines().join("\n"), @r"
        git fetch --tags --force origin
        git remote set-head origin --auto
        git reset --hard origin/HEAD
        git clean -fd
        ");
        assert!(
            executor
                .calls()
                .iter()
                .all(|c| c.dir.as_deref() == Some(Path::new("/cache/widgets"))),
            "update commands run inside the working copy"
        );
    }

    #[test]
    fn set_head_failure_stops_before_reset() {
        let executor = Arc::new(MockExecutor::with_responses(vec![
            (true, String::new()),
            (false, "error: Cannot determine remote HEAD".to_string()),
        ]));
        let err = existing(&executor)
            .sync(REMOTE, Path::new("/cache/widgets"), &SyncOptions::default())
            .unwrap_err();
        assert!(
            matches!(&err, SyncError::CommandFailed { command, .. } if command == "git remote set-head origin --auto"),
            "{err:?}"
        );
        assert_eq!(executor.lines().len(), 2, "no reset after set-head fails");
    }

    #[test]
    fn update_then_checkout_tag() {
        let executor = Arc::new(MockExecutor::with_responses(vec![
            (true, String::new()),
            (true, String::new()),
            (true, String::new()),
            (true, String::new()),
            (true, "HEAD is now at 9f8e7d6 Release 1.2.1".to_string()),
        ]));
        let output = existing(&executor)
            .sync(
                REMOTE,
                Path::new("/cache/widgets"),
                &SyncOptions::tag("1.2.1"),
            )
            .unwrap();
        assert_eq!(output, "HEAD is now at 9f8e7d6 Release 1.2.1");
        assert_eq!(
            executor.lines().last().map(String::as_str),
            Some("git checkout --detach refs/tags/1.2.1")
        );
    }

    #[test]
    fn fetch_failure_short_circuits() {
        let executor = Arc::new(MockExecutor::fail(
            "fatal: unable to access 'https://example.com/': Could not resolve host",
        ));
        let err = existing(&executor)
            .sync(REMOTE, Path::new("/cache/widgets"), &SyncOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("git fetch --tags --force origin"));
        assert!(err.output().contains("Could not resolve host"));
        assert_eq!(executor.lines().len(), 1, "no reset after a failed fetch");
    }

    #[test]
    fn unlaunchable_git_is_launch_error() {
        let sync = RepoSync::with_ops(
            Arc::new(UnlaunchableExecutor),
            Arc::new(MockFileSystemOps::new()),
        );
        let err = sync
            .sync(REMOTE, Path::new("/cache/widgets"), &SyncOptions::default())
            .unwrap_err();
        assert!(matches!(err, SyncError::Launch { .. }), "got {err:?}");
        assert!(err.output().contains("failed to execute"));
    }

    // -----------------------------------------------------------------------
    // Asynchronous entry points
    // -----------------------------------------------------------------------

    #[test]
    fn update_or_clone_completes_once_on_worker() {
        let executor = Arc::new(MockExecutor::ok("Cloning into 'widgets'..."));
        let (tx, rx) = mpsc::channel();
        let caller = std::thread::current().id();
        fresh(&executor).update_or_clone_default(REMOTE, "/cache/widgets", move |result| {
            tx.send((result, std::thread::current().id())).unwrap();
        });

        let (result, thread) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(result.unwrap(), "Cloning into 'widgets'...");
        assert_ne!(thread, caller, "completion must run on a worker thread");
        assert!(
            rx.recv_timeout(Duration::from_millis(200)).is_err(),
            "completion must run exactly once"
        );
    }

    #[test]
    fn update_or_clone_reports_failure() {
        let executor = Arc::new(MockExecutor::fail("fatal: Authentication failed"));
        let (tx, rx) = mpsc::channel();
        existing(&executor).update_or_clone(
            REMOTE,
            "/cache/widgets",
            SyncOptions::branch("deploy"),
            move |result| tx.send(result).unwrap(),
        );
        let err = rx
            .recv_timeout(Duration::from_secs(10))
            .unwrap()
            .unwrap_err();
        assert!(err.output().contains("Authentication failed"));
    }
}
