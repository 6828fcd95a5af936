//! Subcommand implementations.
pub mod install;
pub mod list;
pub mod remove;
pub mod sync;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::config::Config;
use crate::config::catalog::Catalog;
use crate::error::PackageError;
use crate::exec::{Executor, SystemExecutor};
use crate::installers;
use crate::operations::{FileSystemOps, SystemFileSystemOps};
use crate::package::{self, InstallerRegistry, Package};

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    /// Loaded settings, with any `--catalog` override applied.
    pub config: Config,
    /// The parsed package catalog.
    pub catalog: Catalog,
    /// Installers for every supported package kind.
    pub registry: InstallerRegistry,
}

impl CommandSetup {
    /// Load settings and the catalog, and register the bundled installers.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file or the catalog cannot be loaded.
    pub fn init(global: &GlobalOpts) -> Result<Self> {
        let path = global.config.clone().unwrap_or_else(Config::default_path);

        tracing::info!(target: "packsync::stage", "Loading configuration");
        let mut config = Config::load(&path)?;
        if let Some(catalog) = &global.catalog {
            config.catalog.clone_from(catalog);
        }
        let catalog = Catalog::load(&config.catalog)
            .with_context(|| format!("loading catalog (settings: {})", path.display()))?;

        let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
        let fs_ops: Arc<dyn FileSystemOps> = Arc::new(SystemFileSystemOps);
        let registry = installers::standard_registry(&config, &executor, &fs_ops);

        tracing::info!(
            "{} packages in {}",
            catalog.entries().len(),
            config.catalog.display()
        );
        tracing::debug!(
            "installers: {}",
            registry.kinds().collect::<Vec<_>>().join(", ")
        );
        Ok(Self {
            config,
            catalog,
            registry,
        })
    }

    /// Packages named in `names`, in the order given.
    ///
    /// # Errors
    ///
    /// Returns an error naming every requested package that is not in the
    /// catalog or whose kind has no installer.
    pub fn select(&self, names: &[String]) -> Result<Vec<Package>> {
        select(self.catalog.packages(&self.registry), names)
    }
}

/// Pick `names` out of `packages`, dropping duplicate requests.
fn select(packages: Vec<Package>, names: &[String]) -> Result<Vec<Package>> {
    let mut seen = HashSet::new();
    let mut selected = Vec::new();
    let mut unknown = Vec::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            continue;
        }
        match packages.iter().find(|p| p.name() == name) {
            Some(package) => selected.push(package.clone()),
            None => unknown.push(name.as_str()),
        }
    }
    if !unknown.is_empty() {
        anyhow::bail!("unknown package(s): {}", unknown.join(", "));
    }
    Ok(selected)
}

/// Which package operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Install (or update) the package.
    Install,
    /// Remove the package.
    Remove,
}

impl Action {
    const fn past_tense(self) -> &'static str {
        match self {
            Self::Install => "installed",
            Self::Remove => "removed",
        }
    }
}

/// Run `action` on every package and log one result line per package.
///
/// With `parallel` all operations are started at once on the worker pool;
/// otherwise each waits for the previous one.
///
/// # Errors
///
/// Returns an error if any operation failed.
pub fn run_to_completion(packages: &[Package], action: Action, parallel: bool) -> Result<()> {
    let results: Vec<(&Package, Result<(), PackageError>)> = if parallel {
        let pending: Vec<_> = packages
            .iter()
            .map(|p| {
                let events = match action {
                    Action::Install => p.install_events(),
                    Action::Remove => p.remove_events(),
                };
                (p, events)
            })
            .collect();
        pending
            .into_iter()
            .map(|(p, events)| (p, package::wait(events, |f| log_progress(p, f))))
            .collect()
    } else {
        packages
            .iter()
            .map(|p| {
                let progress = |f: f64| log_progress(p, f);
                let result = match action {
                    Action::Install => p.install_blocking(progress),
                    Action::Remove => p.remove_blocking(progress),
                };
                (p, result)
            })
            .collect()
    };

    let mut failed = 0usize;
    for (package, result) in results {
        match result {
            Ok(()) => tracing::info!("{}: {}", package.name(), action.past_tense()),
            Err(e) => {
                failed += 1;
                tracing::error!("{e:#}");
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} package(s) failed");
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn log_progress(package: &Package, fraction: f64) {
    tracing::debug!("{}: {}%", package.name(), (fraction * 100.0).round() as u8);
}
