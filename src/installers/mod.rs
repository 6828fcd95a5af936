//! Bundled [`Installer`](crate::package::Installer) implementations.
//!
//! - [`CopyInstaller`] syncs a repository and copies its tree into place
//! - [`BuildInstaller`] syncs a repository, builds it, and installs one binary
//! - [`VsCodeExtensionInstaller`] drives the VS Code CLI
//!
//! Repository-backed installers keep their working copies under a shared
//! cache directory, one subdirectory per package name.
mod build;
mod copy;
mod vscode;

pub use build::BuildInstaller;
pub use copy::CopyInstaller;
pub use vscode::{VsCodeExtensionInstaller, find_code_command};

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use url::Url;

use crate::config::Config;
use crate::error::InstallerError;
use crate::exec::{ExecResult, Executor};
use crate::operations::FileSystemOps;
use crate::package::{InstallerRegistry, PackageInfo};
use crate::repo::RepoSync;

/// Build a registry holding every bundled installer, configured from `config`.
///
/// The VS Code installer is only registered when a VS Code CLI is configured
/// or found on `PATH`.
#[must_use]
pub fn standard_registry(
    config: &Config,
    executor: &Arc<dyn Executor>,
    fs_ops: &Arc<dyn FileSystemOps>,
) -> InstallerRegistry {
    let sync = RepoSync::with_ops(Arc::clone(executor), Arc::clone(fs_ops));
    let mut registry = InstallerRegistry::new();

    registry.register(Arc::new(CopyInstaller::new(
        sync.clone(),
        Arc::clone(fs_ops),
        config.cache_dir.clone(),
        config.install_dir.clone(),
    )));
    registry.register(Arc::new(BuildInstaller::new(
        sync,
        Arc::clone(executor),
        Arc::clone(fs_ops),
        config.cache_dir.clone(),
        config.bin_dir.clone(),
        config.build.clone(),
    )));

    let code_cmd = config
        .vscode
        .command
        .clone()
        .or_else(|| find_code_command(executor.as_ref()));
    match code_cmd {
        Some(cmd) => {
            registry.register(Arc::new(VsCodeExtensionInstaller::new(
                cmd,
                Arc::clone(executor),
            )));
        }
        None => tracing::debug!("no VS Code CLI found, extension packages unavailable"),
    }

    registry
}

/// Source location of `package`, or [`InstallerError::MissingUrl`].
fn require_url(package: &PackageInfo) -> Result<&Url, InstallerError> {
    package
        .url
        .as_ref()
        .ok_or_else(|| InstallerError::MissingUrl {
            package: package.name.clone(),
        })
}

/// `base/<name>`, provided `name` is a single plain path component.
fn package_path(base: &Path, name: &str) -> Result<PathBuf, InstallerError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(base.join(name)),
        _ => Err(InstallerError::InvalidName {
            name: name.to_string(),
        }),
    }
}

/// Run a tool and turn a launch failure or non-zero exit into an
/// [`InstallerError`]. Returns the captured output on success.
fn run_tool(
    executor: &dyn Executor,
    dir: Option<&Path>,
    program: &str,
    args: &[&str],
) -> Result<ExecResult, InstallerError> {
    let command = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    tracing::debug!("running {command}");

    let result = match dir {
        Some(dir) => executor.run_in_unchecked(dir, program, args),
        None => executor.run_unchecked(program, args),
    }
    .map_err(|e| InstallerError::Launch {
        command: command.clone(),
        reason: format!("{e:#}"),
    })?;

    if !result.success {
        return Err(InstallerError::CommandFailed {
            command,
            code: result.code,
            output: result.combined(),
        });
    }
    Ok(result)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex, PoisonError};

    use crate::package::{Outcome, Reporter};

    /// Run `operation` with a reporter and collect what it reported.
    pub fn report(operation: impl FnOnce(Reporter)) -> (Vec<f64>, Outcome) {
        let progress: Arc<Mutex<Vec<f64>>> = Arc::default();
        let outcome: Arc<Mutex<Option<Outcome>>> = Arc::default();
        let progress_sink = Arc::clone(&progress);
        let outcome_sink = Arc::clone(&outcome);
        operation(Reporter::new(
            move |f| {
                progress_sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(f);
            },
            move |o| {
                *outcome_sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(o);
            },
        ));
        let progress = progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let outcome = outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| Err("no outcome reported".into()));
        (progress, outcome)
    }
}
