//! Settings and package catalog.
//!
//! Settings live in `packsync.toml`; every key is optional. The catalog is a
//! JSON document listing packages grouped by kind (see [`catalog`]).
pub mod catalog;
pub mod toml_loader;

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

const APP_DIR: &str = "packsync";
const CONFIG_FILE: &str = "packsync.toml";
const CATALOG_FILE: &str = "catalog.json";

/// Loaded settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where repository working copies are cached.
    pub cache_dir: PathBuf,
    /// Where file packages are copied to.
    pub install_dir: PathBuf,
    /// Where built binaries are installed.
    pub bin_dir: PathBuf,
    /// Catalog path; relative paths resolve against the settings file.
    pub catalog: PathBuf,
    /// Build installer settings.
    pub build: BuildConfig,
    /// VS Code installer settings.
    pub vscode: VsCodeConfig,
}

/// Settings for the build installer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Program and arguments run inside the checkout. Empty skips the build.
    pub command: Vec<String>,
    /// Artifact path relative to the checkout; `{name}` is replaced by the
    /// package name.
    pub artifact: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: vec!["make".to_string()],
            artifact: "{name}".to_string(),
        }
    }
}

/// Settings for the VS Code extension installer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VsCodeConfig {
    /// VS Code CLI command; detected on `PATH` when unset.
    pub command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults_for(&Dirs::from_env())
    }
}

impl Config {
    fn defaults_for(dirs: &Dirs) -> Self {
        Self {
            cache_dir: dirs.cache.join(APP_DIR).join("repos"),
            install_dir: dirs.data.join(APP_DIR).join("packages"),
            bin_dir: dirs.home.join(".local").join("bin"),
            catalog: PathBuf::from(CATALOG_FILE),
            build: BuildConfig::default(),
            vscode: VsCodeConfig::default(),
        }
    }

    /// Load settings from `path`. A missing file yields the defaults.
    ///
    /// `~/` prefixes are expanded and a relative `catalog` is resolved
    /// against the directory holding `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or is
    /// not valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let dirs = Dirs::from_env();
        let mut config: Self = toml_loader::load_config(path)?;
        config.resolve(path, &dirs);
        tracing::debug!("loaded settings from {}", path.display());
        Ok(config)
    }

    /// Default settings file location:
    /// `$XDG_CONFIG_HOME/packsync/packsync.toml` (or `~/.config/packsync/`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        Dirs::from_env().config.join(APP_DIR).join(CONFIG_FILE)
    }

    fn resolve(&mut self, path: &Path, dirs: &Dirs) {
        for dir in [
            &mut self.cache_dir,
            &mut self.install_dir,
            &mut self.bin_dir,
            &mut self.catalog,
        ] {
            *dir = expand_home(dir, &dirs.home);
        }
        if self.catalog.is_relative()
            && let Some(parent) = path.parent()
        {
            self.catalog = parent.join(&self.catalog);
        }
    }
}

/// Replace a leading `~` component with `home`.
fn expand_home(path: &Path, home: &Path) -> PathBuf {
    path.strip_prefix("~")
        .map_or_else(|_| path.to_path_buf(), |rest| home.join(rest))
}

/// Base directories resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Dirs {
    pub home: PathBuf,
    pub cache: PathBuf,
    pub config: PathBuf,
    pub data: PathBuf,
}

impl Dirs {
    pub fn from_env() -> Self {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Resolve from a variable lookup, following the XDG base directory
    /// conventions with `HOME` (or `USERPROFILE`) as the fallback root.
    fn resolve(var: impl Fn(&str) -> Option<String>) -> Self {
        let set = |key: &str| var(key).filter(|v| !v.is_empty());
        let home = set("HOME")
            .or_else(|| set("USERPROFILE"))
            .map_or_else(|| PathBuf::from("."), PathBuf::from);
        let xdg = |key: &str, fallback: &[&str]| {
            set(key).map_or_else(
                || fallback.iter().fold(home.clone(), |p, c| p.join(c)),
                PathBuf::from,
            )
        };
        Self {
            cache: xdg("XDG_CACHE_HOME", &[".cache"]),
            config: xdg("XDG_CONFIG_HOME", &[".config"]),
            data: xdg("XDG_DATA_HOME", &[".local", "share"]),
            home,
        }
    }
}
