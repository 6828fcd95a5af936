//! `install`: install or update catalog packages.
use anyhow::Result;

use super::{Action, CommandSetup, run_to_completion};
use crate::cli::{GlobalOpts, PackageOpts};

/// Run the install command. Installed packages are updated in place.
///
/// # Errors
///
/// Returns an error if setup fails, a name is unknown, or any install fails.
pub fn run(global: &GlobalOpts, opts: &PackageOpts) -> Result<()> {
    let setup = CommandSetup::init(global)?;
    let packages = setup.select(&opts.names)?;

    tracing::info!(target: "packsync::stage", "Installing {} package(s)", packages.len());
    for package in packages.iter().filter(|p| p.is_installed()) {
        tracing::debug!("{} is already installed, updating", package.name());
    }
    run_to_completion(&packages, Action::Install, global.parallel)
}
