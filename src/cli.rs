//! Command-line interface definitions.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "packsync",
    about = "Fetch, update, and install packages from git repositories",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Settings file (default: $XDG_CONFIG_HOME/packsync/packsync.toml)
    #[arg(short, long, global = true, env = "PACKSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the catalog path from the settings file
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Run package operations one at a time (they run concurrently by default)
    #[arg(long = "no-parallel", global = true, action = clap::ArgAction::SetFalse)]
    pub parallel: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List catalog packages and whether they are installed
    List(ListOpts),
    /// Install packages from the catalog
    Install(PackageOpts),
    /// Remove installed packages
    Remove(PackageOpts),
    /// Clone or update a repository into a local directory
    Sync(SyncOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::Install(_) => "install",
            Self::Remove(_) => "remove",
            Self::Sync(_) => "sync",
            Self::Version => "version",
        }
    }
}

/// Options for the `list` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ListOpts {
    /// Only show installed packages
    #[arg(long)]
    pub installed: bool,
}

/// Options for the `install` and `remove` subcommands.
#[derive(Parser, Debug, Clone)]
pub struct PackageOpts {
    /// Package names as listed in the catalog
    #[arg(required = true)]
    pub names: Vec<String>,
}

/// Options for the `sync` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct SyncOpts {
    /// Remote repository location
    pub remote: String,

    /// Local working copy directory
    pub local: PathBuf,

    /// Branch to check out (takes precedence over --tag)
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Tag to check out
    #[arg(short, long)]
    pub tag: Option<String>,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_install_names() {
        let cli = Cli::parse_from(["packsync", "install", "xvim", "solarized"]);
        assert!(
            matches!(&cli.command, Command::Install(_)),
            "Expected Install command"
        );
        if let Command::Install(opts) = cli.command {
            assert_eq!(opts.names, vec!["xvim", "solarized"]);
        }
    }

    #[test]
    fn install_requires_a_name() {
        assert!(Cli::try_parse_from(["packsync", "install"]).is_err());
    }

    #[test]
    fn parse_remove() {
        let cli = Cli::parse_from(["packsync", "remove", "xvim"]);
        assert!(matches!(cli.command, Command::Remove(_)));
        assert_eq!(cli.command.name(), "remove");
    }

    #[test]
    fn parse_list_installed() {
        let cli = Cli::parse_from(["packsync", "list", "--installed"]);
        assert!(matches!(cli.command, Command::List(ListOpts { installed: true })));
    }

    #[test]
    fn parse_sync_with_branch() {
        let cli = Cli::parse_from([
            "packsync",
            "sync",
            "https://example.com/acme/widgets.git",
            "/tmp/widgets",
            "--branch",
            "deploy",
        ]);
        assert!(
            matches!(&cli.command, Command::Sync(_)),
            "Expected Sync command"
        );
        if let Command::Sync(opts) = cli.command {
            assert_eq!(opts.remote, "https://example.com/acme/widgets.git");
            assert_eq!(opts.local, PathBuf::from("/tmp/widgets"));
            assert_eq!(opts.branch.as_deref(), Some("deploy"));
            assert_eq!(opts.tag, None);
        }
    }

    #[test]
    fn parse_sync_with_tag_short() {
        let cli = Cli::parse_from(["packsync", "sync", "r", "l", "-t", "1.2.1"]);
        assert!(
            matches!(&cli.command, Command::Sync(opts) if opts.tag.as_deref() == Some("1.2.1")),
            "Expected Sync command with a tag"
        );
    }

    #[test]
    fn parse_config_override() {
        let cli = Cli::parse_from(["packsync", "--config", "/etc/packsync.toml", "list"]);
        assert_eq!(cli.global.config, Some(PathBuf::from("/etc/packsync.toml")));
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["packsync", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["packsync", "-v", "list"]);
        assert!(cli.verbose);
    }

    #[test]
    fn parallel_is_enabled_by_default() {
        let cli = Cli::parse_from(["packsync", "install", "xvim"]);
        assert!(cli.global.parallel, "parallel should be true by default");
    }

    #[test]
    fn no_parallel_disables_parallel() {
        let cli = Cli::parse_from(["packsync", "--no-parallel", "install", "xvim"]);
        assert!(!cli.global.parallel);
    }
}
