//! `list`: show catalog packages and their install state.
use anyhow::Result;

use super::CommandSetup;
use crate::cli::{GlobalOpts, ListOpts};
use crate::package::Package;

/// Run the list command.
///
/// # Errors
///
/// Returns an error if settings or the catalog cannot be loaded.
pub fn run(global: &GlobalOpts, opts: &ListOpts) -> Result<()> {
    let setup = CommandSetup::init(global)?;
    let packages = setup.catalog.packages(&setup.registry);

    tracing::info!(target: "packsync::stage", "Packages");
    for line in render(&packages, opts.installed) {
        tracing::info!("{line}");
    }
    Ok(())
}

/// One line per package: marker, name, kind, description.
fn render(packages: &[Package], installed_only: bool) -> Vec<String> {
    let width = packages.iter().map(|p| p.name().len()).max().unwrap_or(0);
    packages
        .iter()
        .filter(|p| !installed_only || p.is_installed())
        .map(|p| {
            let marker = if p.is_installed() { '*' } else { ' ' };
            let line = format!(
                "{marker} {:<width$}  [{}] {}",
                p.name(),
                p.installer().kind(),
                p.description()
            );
            line.trim_end().to_string()
        })
        .collect()
}
