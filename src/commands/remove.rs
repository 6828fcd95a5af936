//! `remove`: remove installed catalog packages.
use anyhow::Result;

use super::{Action, CommandSetup, run_to_completion};
use crate::cli::{GlobalOpts, PackageOpts};

/// Run the remove command. Packages that are not installed are skipped.
///
/// # Errors
///
/// Returns an error if setup fails, a name is unknown, or any removal fails.
pub fn run(global: &GlobalOpts, opts: &PackageOpts) -> Result<()> {
    let setup = CommandSetup::init(global)?;
    let (installed, absent): (Vec<_>, Vec<_>) = setup
        .select(&opts.names)?
        .into_iter()
        .partition(crate::package::Package::is_installed);

    for package in &absent {
        tracing::info!("{}: not installed, skipping", package.name());
    }
    if installed.is_empty() {
        return Ok(());
    }

    tracing::info!(target: "packsync::stage", "Removing {} package(s)", installed.len());
    run_to_completion(&installed, Action::Remove, global.parallel)
}
