//! VS Code extension installer.
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{BoxError, InstallerError};
use crate::exec::{ExecResult, Executor};
use crate::package::{Installer, PackageInfo, Reporter};

/// Installs packages as VS Code extensions. The package name is the
/// extension identifier (e.g. `rust-lang.rust-analyzer`).
#[derive(Debug)]
pub struct VsCodeExtensionInstaller {
    /// VS Code CLI command to use (e.g. "code-insiders" or "code").
    code_cmd: String,
    executor: Arc<dyn Executor>,
    /// Lower-cased IDs from the first `--list-extensions`, reused by
    /// `is_installed` until an install or remove runs.
    listed: Mutex<Option<HashSet<String>>>,
}

impl VsCodeExtensionInstaller {
    /// Package kind handled by this installer.
    pub const KIND: &'static str = "vscode_extensions";

    /// Create an installer driving `code_cmd`.
    #[must_use]
    pub fn new(code_cmd: impl Into<String>, executor: Arc<dyn Executor>) -> Self {
        Self {
            code_cmd: code_cmd.into(),
            executor,
            listed: Mutex::new(None),
        }
    }

    /// The VS Code CLI command in use.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.code_cmd
    }

    /// Query the full set of installed extension IDs in a single command.
    ///
    /// Returns **lower-cased** IDs; an empty set if the listing fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the VS Code CLI cannot be launched.
    pub fn installed_extensions(&self) -> Result<HashSet<String>, InstallerError> {
        let result = self.run_code(&["--list-extensions"])?;
        let mut set = HashSet::new();
        if result.success {
            for line in result.stdout.lines() {
                let id = line.trim().to_lowercase();
                if !id.is_empty() {
                    set.insert(id);
                }
            }
        }
        Ok(set)
    }

    fn try_change(&self, args: &[&str], reporter: &mut Reporter) -> Result<(), BoxError> {
        reporter.progress(0.1);
        let result = self.run_code(args)?;
        self.forget_listing();
        if !result.success {
            return Err(InstallerError::CommandFailed {
                command: format!("{} {}", self.code_cmd, args.join(" ")),
                code: result.code,
                output: result.combined(),
            }
            .into());
        }
        reporter.progress(1.0);
        Ok(())
    }

    fn forget_listing(&self) {
        *self.listed.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Run a VS Code CLI command. On Windows, `.cmd` wrappers need `cmd.exe /C`.
    fn run_code(&self, args: &[&str]) -> Result<ExecResult, InstallerError> {
        #[cfg(target_os = "windows")]
        let result = {
            let mut full_args = vec!["/C", self.code_cmd.as_str()];
            full_args.extend(args);
            self.executor.run_unchecked("cmd", &full_args)
        };

        #[cfg(not(target_os = "windows"))]
        let result = self.executor.run_unchecked(&self.code_cmd, args);

        result.map_err(|e| InstallerError::Launch {
            command: format!("{} {}", self.code_cmd, args.join(" ")),
            reason: format!("{e:#}"),
        })
    }
}

impl Installer for VsCodeExtensionInstaller {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn install(&self, package: &PackageInfo, mut reporter: Reporter) {
        let args = ["--install-extension", package.name.as_str(), "--force"];
        let result = self.try_change(&args, &mut reporter);
        reporter.finish(result);
    }

    fn remove(&self, package: &PackageInfo, mut reporter: Reporter) {
        let args = ["--uninstall-extension", package.name.as_str()];
        let result = self.try_change(&args, &mut reporter);
        reporter.finish(result);
    }

    fn is_installed(&self, package: &PackageInfo) -> bool {
        let mut listed = self.listed.lock().unwrap_or_else(PoisonError::into_inner);
        let installed = listed.get_or_insert_with(|| {
            self.installed_extensions().unwrap_or_else(|e| {
                tracing::debug!("cannot list VS Code extensions: {e}");
                HashSet::new()
            })
        });
        installed.contains(&package.name.to_lowercase())
    }
}

/// Find the VS Code CLI command, preferring code-insiders.
#[must_use]
pub fn find_code_command(executor: &dyn Executor) -> Option<String> {
    ["code-insiders", "code"]
        .into_iter()
        .find(|cmd| executor.which(cmd))
        .map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::{MockExecutor, UnlaunchableExecutor};
    use crate::installers::test_support::report;

    fn extension(id: &str) -> PackageInfo {
        PackageInfo {
            name: id.to_string(),
            ..PackageInfo::default()
        }
    }

    fn installer(executor: &Arc<MockExecutor>) -> VsCodeExtensionInstaller {
        VsCodeExtensionInstaller::new("code", executor.clone())
    }

    // ------------------------------------------------------------------
    // installed_extensions / is_installed
    // ------------------------------------------------------------------

    #[test]
    fn installed_extensions_parses_and_lowercases() {
        let executor = Arc::new(MockExecutor::ok(
            "GitHub.Copilot\nms-python.python\nRust-lang.Rust-analyzer\n",
        ));
        let installed = installer(&executor).installed_extensions().unwrap();
        assert!(installed.contains("github.copilot"));
        assert!(installed.contains("ms-python.python"));
        assert!(installed.contains("rust-lang.rust-analyzer"));
    }

    #[test]
    fn installed_extensions_empty_when_command_fails() {
        let executor = Arc::new(MockExecutor::fail("code: command not found"));
        let installed = installer(&executor).installed_extensions().unwrap();
        assert!(installed.is_empty());
    }

    #[test]
    fn is_installed_case_insensitive() {
        let executor = Arc::new(MockExecutor::ok("rust-lang.rust-analyzer\n"));
        assert!(installer(&executor).is_installed(&extension("Rust-lang.Rust-Analyzer")));
        assert_eq!(executor.lines(), vec!["code --list-extensions"]);
    }

    #[test]
    fn is_installed_lists_once_for_many_packages() {
        let executor = Arc::new(MockExecutor::ok("github.copilot\nms-python.python\n"));
        let installer = installer(&executor);
        assert!(installer.is_installed(&extension("github.copilot")));
        assert!(installer.is_installed(&extension("ms-python.python")));
        assert!(!installer.is_installed(&extension("rust-lang.rust-analyzer")));
        assert_eq!(executor.lines(), vec!["code --list-extensions"]);
    }

    #[test]
    fn install_refreshes_the_listing() {
        let executor = Arc::new(MockExecutor::with_responses(vec![
            (true, String::new()),
            (true, String::new()),
            (true, "github.copilot\n".to_string()),
        ]));
        let installer = installer(&executor);
        let copilot = extension("github.copilot");
        assert!(!installer.is_installed(&copilot));

        let (_, outcome) = report(|r| installer.install(&copilot, r));
        outcome.unwrap();
        assert!(installer.is_installed(&copilot));
        insta::assert_snapshot!(executor.lines().join("\n"), @r"
        code --list-extensions
        code --install-extension github.copilot --force
        code --list-extensions
        ");
    }

    #[test]
    fn is_installed_false_when_unlaunchable() {
        let installer = VsCodeExtensionInstaller::new("code", Arc::new(UnlaunchableExecutor));
        assert!(!installer.is_installed(&extension("github.copilot")));
    }

    // ------------------------------------------------------------------
    // install / remove
    // ------------------------------------------------------------------

    #[test]
    fn install_runs_install_extension() {
        let executor = Arc::new(MockExecutor::ok(
            "Extension 'github.copilot' was successfully installed.",
        ));
        let (progress, outcome) =
            report(|r| installer(&executor).install(&extension("github.copilot"), r));
        outcome.unwrap();
        assert_eq!(progress, vec![0.1, 1.0]);
        assert_eq!(
            executor.lines(),
            vec!["code --install-extension github.copilot --force"]
        );
    }

    #[test]
    fn install_failure_carries_output() {
        let executor = Arc::new(MockExecutor::fail("Extension 'nope.nope' not found."));
        let (_, outcome) = report(|r| installer(&executor).install(&extension("nope.nope"), r));
        let err = outcome.unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
        assert!(err.downcast_ref::<InstallerError>().is_some());
    }

    #[test]
    fn remove_runs_uninstall_extension() {
        let executor = Arc::new(MockExecutor::ok(""));
        let (_, outcome) =
            report(|r| installer(&executor).remove(&extension("github.copilot"), r));
        outcome.unwrap();
        assert_eq!(
            executor.lines(),
            vec!["code --uninstall-extension github.copilot"]
        );
    }

    // ------------------------------------------------------------------
    // find_code_command
    // ------------------------------------------------------------------

    #[test]
    fn find_code_command_prefers_insiders() {
        let executor = MockExecutor::default().with_which(true);
        assert_eq!(
            find_code_command(&executor),
            Some("code-insiders".to_string())
        );
    }

    #[test]
    fn find_code_command_none_when_missing() {
        assert_eq!(find_code_command(&MockExecutor::default()), None);
    }
}
