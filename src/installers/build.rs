//! Installer that builds a repository and installs the resulting binary.
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::BuildConfig;
use crate::error::{BoxError, InstallerError};
use crate::exec::Executor;
use crate::operations::FileSystemOps;
use crate::package::{Installer, PackageInfo, Reporter};
use crate::repo::RepoSync;

use super::{package_path, require_url, run_tool};

/// Placeholder in the artifact template replaced by the package name.
const NAME_PLACEHOLDER: &str = "{name}";

/// Syncs the package repository into `<cache_dir>/<name>`, runs the build
/// command inside it, and copies the artifact to `<bin_dir>/<name>`.
#[derive(Debug)]
pub struct BuildInstaller {
    sync: RepoSync,
    executor: Arc<dyn Executor>,
    fs_ops: Arc<dyn FileSystemOps>,
    cache_dir: PathBuf,
    bin_dir: PathBuf,
    build: BuildConfig,
}

impl BuildInstaller {
    /// Package kind handled by this installer.
    pub const KIND: &'static str = "tools";

    /// Create a build installer.
    #[must_use]
    pub fn new(
        sync: RepoSync,
        executor: Arc<dyn Executor>,
        fs_ops: Arc<dyn FileSystemOps>,
        cache_dir: PathBuf,
        bin_dir: PathBuf,
        build: BuildConfig,
    ) -> Self {
        Self {
            sync,
            executor,
            fs_ops,
            cache_dir,
            bin_dir,
            build,
        }
    }

    fn try_install(&self, package: &PackageInfo, reporter: &mut Reporter) -> Result<(), BoxError> {
        reporter.progress(0.1);
        let url = require_url(package)?;
        let checkout = package_path(&self.cache_dir, &package.name)?;
        let binary = package_path(&self.bin_dir, &package.name)?;

        self.sync
            .sync(url.as_str(), &checkout, &package.checkout)?;
        reporter.progress(0.4);

        if let Some((program, args)) = self.build.command.split_first() {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            let result = run_tool(&*self.executor, Some(&checkout), program, &args)?;
            tracing::debug!("build of '{}' finished: {}", package.name, result.combined());
        }
        reporter.progress(0.8);

        let artifact = checkout.join(self.build.artifact.replace(NAME_PLACEHOLDER, &package.name));
        if !self.fs_ops.exists(&artifact) {
            return Err(InstallerError::MissingArtifact {
                path: artifact.display().to_string(),
            }
            .into());
        }
        self.fs_ops.copy_file(&artifact, &binary)?;
        tracing::debug!("installed {}", binary.display());
        reporter.progress(1.0);
        Ok(())
    }

    fn try_remove(&self, package: &PackageInfo, reporter: &mut Reporter) -> Result<(), BoxError> {
        let binary = package_path(&self.bin_dir, &package.name)?;
        self.fs_ops.remove_all(&binary)?;
        reporter.progress(1.0);
        Ok(())
    }
}

impl Installer for BuildInstaller {
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
        package_path(&self.bin_dir, &package.name).is_ok_and(|p| self.fs_ops.exists(&p))
    }
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
    use crate::exec::test_helpers::MockExecutor;
    use crate::installers::test_support::report;
    use crate::operations::MockFileSystemOps;
    use std::path::Path;
    use url::Url;

    fn ripgrep() -> PackageInfo {
        PackageInfo {
            name: "rg".to_string(),
            description: "Line-oriented search".to_string(),
            url: Url::parse("https://github.com/example/rg.git").ok(),
            ..PackageInfo::default()
        }
    }

    fn build_config() -> BuildConfig {
        BuildConfig {
            command: vec!["make".to_string(), "release".to_string()],
            artifact: "target/{name}".to_string(),
        }
    }

    fn installer(
        executor: &Arc<MockExecutor>,
        fs: &Arc<MockFileSystemOps>,
        build: BuildConfig,
    ) -> BuildInstaller {
        BuildInstaller::new(
            RepoSync::with_ops(executor.clone(), fs.clone()),
            executor.clone(),
            fs.clone(),
            PathBuf::from("/cache"),
            PathBuf::from("/home/me/.local/bin"),
            build,
        )
    }

    #[test]
    fn install_clones_builds_and_copies() {
        let executor = Arc::new(MockExecutor::succeeding(2));
        let fs = Arc::new(MockFileSystemOps::new().with_existing("/cache/rg/target/rg"));
        let installer = installer(&executor, &fs, build_config());

        let (progress, outcome) = report(|r| installer.install(&ripgrep(), r));
        outcome.unwrap();
        assert_eq!(progress, vec![0.1, 0.4, 0.8, 1.0]);
        assert_eq!(
            executor.lines(),
            vec![
                "git clone -- https://github.com/example/rg.git /cache/rg".to_string(),
                "make release".to_string(),
            ]
        );
        assert_eq!(
            executor.calls()[1].dir.as_deref(),
            Some(Path::new("/cache/rg"))
        );
        assert_eq!(
            fs.copies(),
            vec![(
                PathBuf::from("/cache/rg/target/rg"),
                PathBuf::from("/home/me/.local/bin/rg")
            )]
        );
        assert!(installer.is_installed(&ripgrep()));
    }

    #[test]
    fn build_failure_carries_output() {
        let executor = Arc::new(MockExecutor::with_responses(vec![
            (true, String::new()),
            (false, "error[E0425]: cannot find value `x`".to_string()),
        ]));
        let fs = Arc::new(MockFileSystemOps::new());
        let installer = installer(&executor, &fs, build_config());

        let (progress, outcome) = report(|r| installer.install(&ripgrep(), r));
        let err = outcome.unwrap_err();
        match err.downcast_ref::<InstallerError>() {
            Some(InstallerError::CommandFailed {
                command, output, ..
            }) => {
                assert_eq!(command, "make release");
                assert!(output.contains("E0425"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(progress, vec![0.1, 0.4]);
        assert!(fs.copies().is_empty());
    }

    #[test]
    fn missing_artifact_is_reported() {
        let executor = Arc::new(MockExecutor::succeeding(2));
        let fs = Arc::new(MockFileSystemOps::new());
        let installer = installer(&executor, &fs, build_config());

        let (_, outcome) = report(|r| installer.install(&ripgrep(), r));
        assert_eq!(
            outcome.unwrap_err().to_string(),
            "build did not produce /cache/rg/target/rg"
        );
    }

    #[test]
    fn empty_build_command_skips_build() {
        let executor = Arc::new(MockExecutor::succeeding(1));
        let fs = Arc::new(MockFileSystemOps::new().with_existing("/cache/rg/rg"));
        let installer = installer(
            &executor,
            &fs,
            BuildConfig {
                command: Vec::new(),
                artifact: "{name}".to_string(),
            },
        );

        let (_, outcome) = report(|r| installer.install(&ripgrep(), r));
        outcome.unwrap();
        assert_eq!(executor.lines().len(), 1, "only the clone runs");
    }

    #[test]
    fn remove_deletes_binary() {
        let executor = Arc::new(MockExecutor::default());
        let fs = Arc::new(MockFileSystemOps::new().with_existing("/home/me/.local/bin/rg"));
        let installer = installer(&executor, &fs, build_config());

        let (_, outcome) = report(|r| installer.remove(&ripgrep(), r));
        outcome.unwrap();
        assert_eq!(fs.removed(), vec![PathBuf::from("/home/me/.local/bin/rg")]);
        assert!(!installer.is_installed(&ripgrep()));
        assert!(executor.lines().is_empty());
    }
}
