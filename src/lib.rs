//! Package synchronization and installation engine.
//!
//! Fetches third-party packages from git repositories and installs them with
//! a strategy chosen per package kind.
//!
//! The public API is organised into layers:
//!
//! - **[`repo`]**: idempotent clone-or-update of a local working copy
//! - **[`package`]**: the package lifecycle and the [`package::Installer`] plug-in contract
//! - **[`installers`]**: bundled installers (file copy, build, VS Code extension)
//! - **[`config`]**: settings file and package catalog
//! - **[`commands`]**: top-level subcommand orchestration (`list`, `install`, `remove`, `sync`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod installers;
pub mod logging;
pub mod operations;
pub mod package;
pub mod repo;
