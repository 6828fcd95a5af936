//! Package catalog loading.
//!
//! The catalog groups package metadata records by kind:
//!
//! ```json
//! {
//!   "packages": {
//!     "files": [
//!       { "name": "xvim", "description": "Vim keybindings", "url": "https://...", "tag": "v2.1" }
//!     ],
//!     "vscode_extensions": [ { "name": "rust-lang.rust-analyzer" } ]
//!   }
//! }
//! ```
use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;

use crate::error::ConfigError;
use crate::package::{InstallerRegistry, Metadata, Package};

/// One catalog record and the kind it was listed under.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Package kind, selecting the installer.
    pub kind: String,
    /// The package's metadata record.
    pub metadata: Metadata,
}

impl CatalogEntry {
    /// The record's `name`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// A parsed catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Read and parse the catalog at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Json`] if it is not JSON, or
    /// [`ConfigError::InvalidCatalog`] if it does not have the expected shape.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::parse(&text, &path.display().to_string())?;
        tracing::debug!(
            "loaded {} catalog entries from {}",
            catalog.entries.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Parse catalog JSON. `origin` names the source in errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] or [`ConfigError::InvalidCatalog`].
    pub fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidCatalog {
            path: origin.to_string(),
            reason,
        };

        let root: Value = serde_json::from_str(text).map_err(|source| ConfigError::Json {
            path: origin.to_string(),
            source,
        })?;
        let groups = root
            .get("packages")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("missing \"packages\" object".to_string()))?;

        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        for (kind, records) in groups {
            let records = records
                .as_array()
                .ok_or_else(|| invalid(format!("\"{kind}\" is not a list")))?;
            for (index, record) in records.iter().enumerate() {
                let metadata = record
                    .as_object()
                    .ok_or_else(|| invalid(format!("{kind}[{index}] is not an object")))?;
                let entry = CatalogEntry {
                    kind: kind.clone(),
                    metadata: metadata.clone(),
                };
                if entry.name().is_empty() {
                    return Err(invalid(format!("{kind}[{index}] has no \"name\"")));
                }
                if !seen.insert(entry.name().to_string()) {
                    tracing::warn!("'{}' is listed more than once, keeping the first", entry.name());
                    continue;
                }
                entries.push(entry);
            }
        }
        Ok(Self { entries })
    }

    /// All entries, grouped by kind in sorted kind order.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// The entry named `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Build a [`Package`] for every entry whose kind has an installer, asking
    /// each installer whether its package is already present.
    /// Entries of unknown kinds are logged and skipped.
    #[must_use]
    pub fn packages(&self, registry: &InstallerRegistry) -> Vec<Package> {
        self.entries
            .iter()
            .filter_map(|entry| match registry.probe(&entry.kind, &entry.metadata) {
                Ok(package) => Some(package),
                Err(e) => {
                    tracing::warn!("skipping '{}': {e}", entry.name());
                    None
                }
            })
            .collect()
    }
}
