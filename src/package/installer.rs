//! The installer plug-in contract and the registry that maps package kinds
//! to installers.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{Metadata, Package, PackageInfo, Reporter};
use serde_json::Value;
use crate::error::PackageError;

/// A strategy that knows how to put one kind of package on the system and
/// take it off again.
///
/// `install` and `remove` run on a worker thread and may block. They report
/// through the [`Reporter`]: progress any number of times, then exactly one
/// of `complete` or `fail`. An installer keeps no per-package state between
/// calls and may be shared by many packages.
#[cfg_attr(test, mockall::automock)]
pub trait Installer: Send + Sync + fmt::Debug {
    /// Package kind this installer handles, as named in the catalog.
    fn kind(&self) -> &'static str;

    /// Install `package`.
    fn install(&self, package: &PackageInfo, reporter: Reporter);

    /// Remove `package`.
    fn remove(&self, package: &PackageInfo, reporter: Reporter);

    /// Whether `package` is currently present on the system.
    fn is_installed(&self, package: &PackageInfo) -> bool {
        let _ = package;
        false
    }
}

/// Maps package kinds to their installers.
///
/// New package kinds are added by registering an installer; [`Package`]
/// itself never changes.
#[derive(Debug, Default, Clone)]
pub struct InstallerRegistry {
    installers: BTreeMap<String, Arc<dyn Installer>>,
}

impl InstallerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `installer` under its own [`Installer::kind`], returning any
    /// installer it replaces.
    pub fn register(&mut self, installer: Arc<dyn Installer>) -> Option<Arc<dyn Installer>> {
        let kind = installer.kind().to_string();
        self.register_as(kind, installer)
    }

    /// Register `installer` under an explicit kind name.
    pub fn register_as(
        &mut self,
        kind: impl Into<String>,
        installer: Arc<dyn Installer>,
    ) -> Option<Arc<dyn Installer>> {
        let kind = kind.into();
        tracing::debug!("registering installer for '{kind}'");
        self.installers.insert(kind, installer)
    }

    /// Installer registered for `kind`.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&Arc<dyn Installer>> {
        self.installers.get(kind)
    }

    /// Registered kinds in sorted order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.installers.keys().map(String::as_str)
    }

    /// Build a package of `kind` from a metadata record.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::UnknownKind`] if no installer handles `kind`.
    pub fn package(&self, kind: &str, metadata: &Metadata) -> Result<Package, PackageError> {
        let installer = self
            .get(kind)
            .ok_or_else(|| PackageError::UnknownKind {
                kind: kind.to_string(),
            })?;
        Ok(Package::from_metadata(metadata, Arc::clone(installer)))
    }

    /// Like [`package`](Self::package), but when the record does not assert
    /// an `installed` value the installer is asked whether the package is
    /// already present on the system.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::UnknownKind`] if no installer handles `kind`.
    pub fn probe(&self, kind: &str, metadata: &Metadata) -> Result<Package, PackageError> {
        if metadata.get("installed").is_some_and(Value::is_boolean) {
            return self.package(kind, metadata);
        }
        let installer = self
            .get(kind)
            .ok_or_else(|| PackageError::UnknownKind {
                kind: kind.to_string(),
            })?;
        let info = PackageInfo::from_metadata(metadata);
        let installed = installer.is_installed(&info);
        Ok(Package::with_installed(info, Arc::clone(installer), installed))
    }
}
