//! Domain-specific error types for packsync.
//!
//! Library modules return these typed errors; the CLI boundary converts them
//! to [`anyhow::Error`] via `?`.
//!
//! # Error hierarchy
//!
//! ```text
//! SyncError        a git command failed or could not be launched
//! PackageError     install/remove failed (wraps the installer's cause), busy, unknown kind
//! InstallerError   a bundled installer could not do its work
//! ConfigError      settings or catalog could not be read or parsed
//! ```

use thiserror::Error;

/// Boxed error carried as the source of installer failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by repository synchronization.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A version-control command exited non-zero.
    #[error("`{command}` failed (exit {}): {output}", display_code(.code))]
    CommandFailed {
        /// The command line that failed.
        command: String,
        /// Exit code, `None` if the process was terminated by a signal.
        code: Option<i32>,
        /// Captured stdout and stderr.
        output: String,
    },

    /// A version-control command could not be started.
    #[error("could not run `{command}`: {reason}")]
    Launch {
        /// The command line that could not be started.
        command: String,
        /// Why the launch failed.
        reason: String,
    },
}

impl SyncError {
    /// Captured diagnostic output of the failing command.
    #[must_use]
    pub fn output(&self) -> &str {
        match self {
            Self::CommandFailed { output, .. } => output,
            Self::Launch { reason, .. } => reason,
        }
    }
}

#[allow(clippy::ref_option)]
fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Errors reported by package install and remove operations.
#[derive(Error, Debug)]
pub enum PackageError {
    /// The installer could not install the package.
    #[error("failed to install '{package}': {source}")]
    InstallFailed {
        /// Name of the package.
        package: String,
        /// Cause reported by the installer.
        source: BoxError,
    },

    /// The installer could not remove the package.
    #[error("failed to remove '{package}': {source}")]
    RemoveFailed {
        /// Name of the package.
        package: String,
        /// Cause reported by the installer.
        source: BoxError,
    },

    /// Another install or remove is already running for this package.
    #[error("'{package}' is busy: another operation is in progress")]
    Busy {
        /// Name of the package.
        package: String,
    },

    /// No installer is registered for the package kind.
    #[error("no installer registered for package kind '{kind}'")]
    UnknownKind {
        /// The unrecognised kind.
        kind: String,
    },

    /// The operation ended without the installer reporting an outcome.
    #[error("installer finished without reporting an outcome")]
    Abandoned,
}

/// Errors raised by the bundled installers.
///
/// These travel as the `source` of [`PackageError::InstallFailed`] and
/// [`PackageError::RemoveFailed`], alongside any forwarded [`SyncError`].
#[derive(Error, Debug)]
pub enum InstallerError {
    /// The package has no usable source location.
    #[error("package '{package}' has no source url")]
    MissingUrl {
        /// Name of the package.
        package: String,
    },

    /// The package name cannot be used as a directory or file name.
    #[error("'{name}' is not a valid package name")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A tool run by the installer exited non-zero.
    #[error("`{command}` failed (exit {}): {output}", display_code(.code))]
    CommandFailed {
        /// The command line that failed.
        command: String,
        /// Exit code, `None` if the process was terminated by a signal.
        code: Option<i32>,
        /// Captured stdout and stderr.
        output: String,
    },

    /// A tool run by the installer could not be started.
    #[error("could not run `{command}`: {reason}")]
    Launch {
        /// The command line that could not be started.
        command: String,
        /// Why the launch failed.
        reason: String,
    },

    /// A build succeeded but left no artifact at the expected path.
    #[error("build did not produce {path}")]
    MissingArtifact {
        /// Where the artifact was expected.
        path: String,
    },
}

/// Errors that arise while loading settings or the package catalog.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path to the file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for the expected schema.
    #[error("invalid settings in {path}: {source}")]
    Toml {
        /// Path to the file.
        path: String,
        /// Underlying parse error.
        source: toml::de::Error,
    },

    /// The catalog file is not valid JSON.
    #[error("invalid catalog JSON in {path}: {source}")]
    Json {
        /// Path to the file.
        path: String,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// The catalog parsed but does not have the expected shape.
    #[error("invalid catalog {path}: {reason}")]
    InvalidCatalog {
        /// Path to the file.
        path: String,
        /// What is wrong with it.
        reason: String,
    },
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn command_failed_display_includes_output() {
        let e = SyncError::CommandFailed {
            command: "git fetch --tags --force origin".to_string(),
            code: Some(128),
            output: "fatal: could not read from remote repository".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "`git fetch --tags --force origin` failed (exit 128): fatal: could not read from remote repository"
        );
        assert_eq!(e.output(), "fatal: could not read from remote repository");
    }

    #[test]
    fn command_failed_without_code_reports_signal() {
        let e = SyncError::CommandFailed {
            command: "git clone a b".to_string(),
            code: None,
            output: String::new(),
        };
        assert!(e.to_string().contains("exit signal"));
    }

    #[test]
    fn launch_display() {
        let e = SyncError::Launch {
            command: "git clone a b".to_string(),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "could not run `git clone a b`: No such file or directory"
        );
    }

    #[test]
    fn install_failed_wraps_sync_error() {
        let sync = SyncError::CommandFailed {
            command: "git clone x y".to_string(),
            code: Some(128),
            output: "repository not found".to_string(),
        };
        let e = PackageError::InstallFailed {
            package: "xvim".to_string(),
            source: Box::new(sync),
        };
        assert!(e.to_string().starts_with("failed to install 'xvim'"));
        let source = e.source().unwrap();
        assert!(source.downcast_ref::<SyncError>().is_some());
    }

    #[test]
    fn busy_display() {
        let e = PackageError::Busy {
            package: "xvim".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "'xvim' is busy: another operation is in progress"
        );
    }

    #[test]
    fn unknown_kind_display() {
        let e = PackageError::UnknownKind {
            kind: "fonts".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "no installer registered for package kind 'fonts'"
        );
    }

    #[test]
    fn installer_command_failed_display() {
        let e = InstallerError::CommandFailed {
            command: "make release".to_string(),
            code: Some(2),
            output: "cc: error: no input files".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "`make release` failed (exit 2): cc: error: no input files"
        );
    }

    #[test]
    fn config_io_has_source() {
        let e = ConfigError::Io {
            path: "/etc/packsync.toml".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.to_string().contains("/etc/packsync.toml"));
        assert!(e.source().is_some());
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<SyncError>();
        assert_send_sync::<PackageError>();
        assert_send_sync::<InstallerError>();
        assert_send_sync::<ConfigError>();
    }

    #[test]
    fn errors_convert_to_anyhow() {
        let _sync: anyhow::Error = SyncError::Launch {
            command: "git".to_string(),
            reason: "missing".to_string(),
        }
        .into();
        let _pkg: anyhow::Error = PackageError::Abandoned.into();
    }
}
