//! `sync`: clone or update a single repository.
use anyhow::Result;

use crate::cli::SyncOpts;
use crate::repo::{RepoSync, SyncOptions};

/// Run the sync command: clone or update a single repository.
///
/// # Errors
///
/// Returns an error carrying git's output if any step fails.
pub fn run(opts: &SyncOpts) -> Result<()> {
    let options = SyncOptions {
        branch: opts.branch.clone(),
        tag: opts.tag.clone(),
    };

    tracing::info!(
        target: "packsync::stage",
        "Syncing {} into {}",
        opts.remote,
        opts.local.display()
    );
    let output = RepoSync::new().sync(&opts.remote, &opts.local, &options)?;
    for line in output.lines() {
        tracing::debug!("{line}");
    }
    tracing::info!("{} is up to date", opts.local.display());
    Ok(())
}
