//! Installer that places a repository's files in a target directory.
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::BoxError;
use crate::operations::FileSystemOps;
use crate::package::{Installer, PackageInfo, Reporter};
use crate::repo::RepoSync;

use super::{package_path, require_url};

/// Syncs the package repository into `<cache_dir>/<name>` at the package's
/// checkout reference, then copies the working tree (without `.git`) to
/// `<target_dir>/<name>`.
#[derive(Debug)]
pub struct CopyInstaller {
    sync: RepoSync,
    fs_ops: Arc<dyn FileSystemOps>,
    cache_dir: PathBuf,
    target_dir: PathBuf,
}

impl CopyInstaller {
    /// Package kind handled by this installer.
    pub const KIND: &'static str = "files";

    /// Create a copy installer.
    #[must_use]
    pub fn new(
        sync: RepoSync,
        fs_ops: Arc<dyn FileSystemOps>,
        cache_dir: PathBuf,
        target_dir: PathBuf,
    ) -> Self {
        Self {
            sync,
            fs_ops,
            cache_dir,
            target_dir,
        }
    }

    fn try_install(&self, package: &PackageInfo, reporter: &mut Reporter) -> Result<(), BoxError> {
        reporter.progress(0.1);
        let url = require_url(package)?;
        let checkout = package_path(&self.cache_dir, &package.name)?;
        let target = package_path(&self.target_dir, &package.name)?;

        self.sync
            .sync(url.as_str(), &checkout, &package.checkout)?;
        reporter.progress(0.6);

        // Replace rather than merge so files dropped upstream disappear.
        self.fs_ops.remove_all(&target)?;
        self.fs_ops.copy_tree(&checkout, &target)?;
        tracing::debug!("copied {} to {}", checkout.display(), target.display());
        reporter.progress(1.0);
        Ok(())
    }

    fn try_remove(&self, package: &PackageInfo, reporter: &mut Reporter) -> Result<(), BoxError> {
        let target = package_path(&self.target_dir, &package.name)?;
        self.fs_ops.remove_all(&target)?;
        reporter.progress(1.0);
        Ok(())
    }
}

impl Installer for CopyInstaller {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn install(&self, package: &PackageInfo, mut reporter: Reporter) {
        let result = self.try_install(package, &mut reporter);
        reporter.finish(result);
    }

    fn remove(&self, package: &PackageInfo, mut reporter: Reporter) {
        let result = self.try_remove(package, &mut reporter);
        reporter.finish(result);
    }

    fn is_installed(&self, package: &PackageInfo) -> bool {
        package_path(&self.target_dir, &package.name).is_ok_and(|p| self.fs_ops.exists(&p))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{InstallerError, SyncError};
    use crate::exec::test_helpers::MockExecutor;
    use crate::installers::test_support::report;
    use crate::operations::MockFileSystemOps;
    use crate::repo::SyncOptions;
    use std::path::Path;
    use url::Url;

    fn xvim() -> PackageInfo {
        PackageInfo {
            name: "xvim".to_string(),
            description: "Vim keybindings".to_string(),
            url: Url::parse("https://github.com/example/xvim.git").ok(),
            ..PackageInfo::default()
        }
    }

    fn installer(executor: MockExecutor, fs: &Arc<MockFileSystemOps>) -> CopyInstaller {
        CopyInstaller::new(
            RepoSync::with_ops(Arc::new(executor), fs.clone()),
            fs.clone(),
            PathBuf::from("/cache"),
            PathBuf::from("/plugins"),
        )
    }

    #[test]
    fn install_clones_and_copies() {
        let fs = Arc::new(MockFileSystemOps::new());
        let installer = installer(MockExecutor::ok("Cloning into 'xvim'..."), &fs);

        let (progress, outcome) = report(|r| installer.install(&xvim(), r));
        outcome.unwrap();
        assert_eq!(progress, vec![0.1, 0.6, 1.0]);
        assert_eq!(
            fs.copies(),
            vec![(PathBuf::from("/cache/xvim"), PathBuf::from("/plugins/xvim"))]
        );
        assert!(installer.is_installed(&xvim()));
    }

    #[test]
    fn install_checks_out_the_pinned_reference() {
        let fs = Arc::new(MockFileSystemOps::new());
        let executor = Arc::new(MockExecutor::succeeding(2));
        let installer = CopyInstaller::new(
            RepoSync::with_ops(executor.clone(), fs.clone()),
            fs.clone(),
            PathBuf::from("/cache"),
            PathBuf::from("/plugins"),
        );
        let info = PackageInfo {
            checkout: SyncOptions::tag("1.0.0"),
            ..xvim()
        };

        let (_, outcome) = report(|r| installer.install(&info, r));
        outcome.unwrap();
        insta::assert_snapshot!(executor.lines().join("\n"), @r"
        git clone -- https://github.com/example/xvim.git /cache/xvim
        git checkout --detach refs/tags/1.0.0
        ");
    }

    #[test]
    fn install_replaces_previous_copy() {
        let fs = Arc::new(
            MockFileSystemOps::new()
                .with_existing("/cache/xvim/.git")
                .with_existing("/plugins/xvim"),
        );
        let installer = installer(MockExecutor::succeeding(4), &fs);

        let (_, outcome) = report(|r| installer.install(&xvim(), r));
        outcome.unwrap();
        assert_eq!(fs.removed(), vec![PathBuf::from("/plugins/xvim")]);
        assert_eq!(fs.copies().len(), 1);
    }

    #[test]
    fn sync_failure_is_forwarded() {
        let fs = Arc::new(MockFileSystemOps::new());
        let installer = installer(
            MockExecutor::fail("fatal: repository not found"),
            &fs,
        );

        let (progress, outcome) = report(|r| installer.install(&xvim(), r));
        let err = outcome.unwrap_err();
        let sync = err.downcast_ref::<SyncError>().expect("SyncError source");
        assert!(sync.output().contains("repository not found"));
        assert_eq!(progress, vec![0.1]);
        assert!(fs.copies().is_empty());
    }

    #[test]
    fn missing_url_fails_without_running_git() {
        let fs = Arc::new(MockFileSystemOps::new());
        let executor = MockExecutor::default();
        let installer = installer(executor, &fs);
        let info = PackageInfo {
            url: None,
            ..xvim()
        };

        let (_, outcome) = report(|r| installer.install(&info, r));
        let err = outcome.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallerError>(),
            Some(InstallerError::MissingUrl { .. })
        ));
    }

    #[test]
    fn copy_failure_is_reported() {
        let fs = Arc::new(MockFileSystemOps::new().failing_copies());
        let installer = installer(MockExecutor::succeeding(1), &fs);

        let (_, outcome) = report(|r| installer.install(&xvim(), r));
        assert!(outcome.unwrap_err().to_string().contains("refused"));
    }

    #[test]
    fn remove_deletes_target() {
        let fs = Arc::new(MockFileSystemOps::new().with_existing("/plugins/xvim"));
        let installer = installer(MockExecutor::default(), &fs);

        let (progress, outcome) = report(|r| installer.remove(&xvim(), r));
        outcome.unwrap();
        assert_eq!(progress, vec![1.0]);
        assert!(!fs.exists(Path::new("/plugins/xvim")));
        assert!(!installer.is_installed(&xvim()));
    }

    #[test]
    fn remove_absent_package_succeeds() {
        let fs = Arc::new(MockFileSystemOps::new());
        let installer = installer(MockExecutor::default(), &fs);
        let (_, outcome) = report(|r| installer.remove(&xvim(), r));
        outcome.unwrap();
    }

    #[test]
    fn traversal_names_are_rejected() {
        let fs = Arc::new(MockFileSystemOps::new());
        let installer = installer(MockExecutor::default(), &fs);
        let info = PackageInfo {
            name: "..".to_string(),
            ..xvim()
        };
        let (_, outcome) = report(|r| installer.remove(&info, r));
        assert!(outcome.is_err());
        assert!(fs.removed().is_empty());
    }
}
