//! Installable packages.
//!
//! A [`Package`] is a named, describable unit with a lifecycle state. It does
//! not know how to install itself: that work is delegated to the
//! [`Installer`] it was built with. Operations run on the worker pool and
//! report progress, completion, and failure through caller-supplied sinks.
mod installer;
mod reporter;

pub use installer::{Installer, InstallerRegistry};
pub use reporter::{Event, Outcome, Reporter};

#[cfg(test)]
pub use installer::MockInstaller;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use url::Url;

use crate::error::{BoxError, PackageError};
use crate::repo::SyncOptions;

/// A flat key/value record describing one package.
pub type Metadata = serde_json::Map<String, Value>;

/// Descriptive data for a package. Installers receive this, never the
/// [`Package`] itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    /// Package name, also used as its directory name by file installers.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Source location; `None` if absent or not a valid URL.
    pub url: Option<Url>,
    /// Reference installers check out after syncing `url`.
    pub checkout: SyncOptions,
}

impl PackageInfo {
    /// Read `name`, `description`, `url`, `branch`, and `tag` from a
    /// metadata record.
    ///
    /// Missing or non-string values become empty; an unparsable `url` becomes
    /// `None`. Unrecognised keys are ignored.
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let text = |key: &str| {
            metadata
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let url = metadata
            .get("url")
            .and_then(Value::as_str)
            .and_then(|raw| match Url::parse(raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::debug!("ignoring invalid url '{raw}': {e}");
                    None
                }
            });
        let reference = |key: &str| {
            metadata
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            name: text("name"),
            description: text("description"),
            url,
            checkout: SyncOptions {
                branch: reference("branch"),
                tag: reference("tag"),
            },
        }
    }
}

/// Where a package is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    /// Not installed and nothing running.
    Idle,
    /// An install is running.
    Installing,
    /// Installed and nothing running.
    Installed,
    /// A remove is running.
    Removing,
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "not installed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Removing => "removing",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Install,
    Remove,
}

impl Operation {
    const fn verb(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
        }
    }

    fn failed(self, package: String, source: BoxError) -> PackageError {
        match self {
            Self::Install => PackageError::InstallFailed { package, source },
            Self::Remove => PackageError::RemoveFailed { package, source },
        }
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    installed: bool,
    running: Option<Operation>,
}

/// A package bound to the installer that handles it.
///
/// Clones share lifecycle state, so an operation started through one clone is
/// visible (and blocks new operations) through all of them.
#[derive(Debug, Clone)]
pub struct Package {
    info: Arc<PackageInfo>,
    installer: Arc<dyn Installer>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl Package {
    /// Create a package that is not installed.
    #[must_use]
    pub fn new(info: PackageInfo, installer: Arc<dyn Installer>) -> Self {
        Self::with_installed(info, installer, false)
    }

    /// Create a package from a metadata record.
    ///
    /// An `installed: true` entry marks the package as already installed.
    #[must_use]
    pub fn from_metadata(metadata: &Metadata, installer: Arc<dyn Installer>) -> Self {
        let installed = metadata
            .get("installed")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self::with_installed(PackageInfo::from_metadata(metadata), installer, installed)
    }

    /// Create a package whose installed state is already known, for example
    /// from [`Installer::is_installed`].
    #[must_use]
    pub fn with_installed(info: PackageInfo, installer: Arc<dyn Installer>, installed: bool) -> Self {
        Self {
            info: Arc::new(info),
            installer,
            lifecycle: Arc::new(Mutex::new(Lifecycle {
                installed,
                running: None,
            })),
        }
    }

    /// Package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Package description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.info.description
    }

    /// Package source location.
    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.info.url.as_ref()
    }

    /// Descriptive data handed to the installer.
    #[must_use]
    pub fn info(&self) -> &PackageInfo {
        &self.info
    }

    /// The installer this package delegates to.
    #[must_use]
    pub fn installer(&self) -> &Arc<dyn Installer> {
        &self.installer
    }

    /// Whether the last successful operation was an install.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.lock().installed
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PackageState {
        let lifecycle = self.lock();
        match (lifecycle.running, lifecycle.installed) {
            (Some(Operation::Install), _) => PackageState::Installing,
            (Some(Operation::Remove), _) => PackageState::Removing,
            (None, true) => PackageState::Installed,
            (None, false) => PackageState::Idle,
        }
    }

    /// Install the package on the worker pool.
    ///
    /// `progress` receives fractions in `0.0..=1.0`. Exactly one of
    /// `completion` or `failure` runs, on a worker thread, after this call
    /// returns. On success [`is_installed`](Self::is_installed) is already
    /// `true` when `completion` runs; on failure it is unchanged.
    ///
    /// If another operation is running, `failure` receives
    /// [`PackageError::Busy`] and the installer is not called.
    pub fn install<P, C, F>(&self, progress: P, completion: C, failure: F)
    where
        P: FnMut(f64) + Send + 'static,
        C: FnOnce() + Send + 'static,
        F: FnOnce(PackageError) + Send + 'static,
    {
        self.start(Operation::Install, progress, completion, failure);
    }

    /// Remove the package on the worker pool.
    ///
    /// Same contract as [`install`](Self::install); on success
    /// [`is_installed`](Self::is_installed) is already `false` when
    /// `completion` runs.
    pub fn remove<P, C, F>(&self, progress: P, completion: C, failure: F)
    where
        P: FnMut(f64) + Send + 'static,
        C: FnOnce() + Send + 'static,
        F: FnOnce(PackageError) + Send + 'static,
    {
        self.start(Operation::Remove, progress, completion, failure);
    }

    /// Install and deliver notifications as [`Event`]s on a channel.
    ///
    /// The channel closes after the `Completed` or `Failed` event.
    #[must_use]
    pub fn install_events(&self) -> Receiver<Event> {
        self.events(Operation::Install)
    }

    /// Remove and deliver notifications as [`Event`]s on a channel.
    #[must_use]
    pub fn remove_events(&self) -> Receiver<Event> {
        self.events(Operation::Remove)
    }

    /// Install and wait for the outcome, forwarding progress to `on_progress`
    /// on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the [`PackageError`] the operation failed with.
    pub fn install_blocking(&self, on_progress: impl FnMut(f64)) -> Result<(), PackageError> {
        wait(self.events(Operation::Install), on_progress)
    }

    /// Remove and wait for the outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`PackageError`] the operation failed with.
    pub fn remove_blocking(&self, on_progress: impl FnMut(f64)) -> Result<(), PackageError> {
        wait(self.events(Operation::Remove), on_progress)
    }

    fn events(&self, op: Operation) -> Receiver<Event> {
        let (tx, rx) = mpsc::channel();
        let progress_tx = tx.clone();
        let completion_tx = tx.clone();
        // Send errors mean the receiver is gone, which leaves no one to tell.
        self.start(
            op,
            move |fraction| {
                let _ = progress_tx.send(Event::Progress(fraction));
            },
            move || {
                let _ = completion_tx.send(Event::Completed);
            },
            move |error| {
                let _ = tx.send(Event::Failed(error));
            },
        );
        rx
    }

    fn start<P, C, F>(&self, op: Operation, progress: P, completion: C, failure: F)
    where
        P: FnMut(f64) + Send + 'static,
        C: FnOnce() + Send + 'static,
        F: FnOnce(PackageError) + Send + 'static,
    {
        let name = self.info.name.clone();

        if !self.begin(op) {
            tracing::warn!("cannot {} '{name}': another operation is in progress", op.verb());
            rayon::spawn(move || failure(PackageError::Busy { package: name }));
            return;
        }
        tracing::info!("{} '{name}' via {}", op.verb(), self.installer.kind());

        let lifecycle = Arc::clone(&self.lifecycle);
        let reporter = Reporter::new(progress, move |outcome: Outcome| {
            let mut state = lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            state.running = None;
            match outcome {
                Ok(()) => {
                    state.installed = op == Operation::Install;
                    drop(state);
                    tracing::info!("{} '{name}' finished", op.verb());
                    completion();
                }
                Err(source) => {
                    drop(state);
                    tracing::warn!("{} '{name}' failed: {source}", op.verb());
                    failure(op.failed(name, source));
                }
            }
        });

        let installer = Arc::clone(&self.installer);
        let info = Arc::clone(&self.info);
        rayon::spawn(move || {
            // A panicking installer drops its reporter while unwinding, which
            // reports the operation as abandoned.
            let ran = panic::catch_unwind(AssertUnwindSafe(|| match op {
                Operation::Install => installer.install(&info, reporter),
                Operation::Remove => installer.remove(&info, reporter),
            }));
            if ran.is_err() {
                tracing::error!("{} installer panicked on '{}'", installer.kind(), info.name);
            }
        });
    }

    /// Claim the package for `op`, or return `false` if it is busy.
    fn begin(&self, op: Operation) -> bool {
        let mut lifecycle = self.lock();
        if lifecycle.running.is_some() {
            return false;
        }
        lifecycle.running = Some(op);
        true
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drain an operation's events, forwarding progress to `on_progress`, and
/// return its outcome. A channel that closes without a terminal event counts
/// as [`PackageError::Abandoned`].
///
/// # Errors
///
/// Returns the [`PackageError`] the operation failed with.
pub fn wait(events: Receiver<Event>, mut on_progress: impl FnMut(f64)) -> Result<(), PackageError> {
    for event in events {
        match event {
            Event::Progress(fraction) => on_progress(fraction),
            Event::Completed => return Ok(()),
            Event::Failed(error) => return Err(error),
        }
    }
    Err(PackageError::Abandoned)
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn metadata(value: &Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    fn xvim(installer: MockInstaller) -> Package {
        Package::new(
            PackageInfo {
                name: "xvim".to_string(),
                description: "Vim keybindings".to_string(),
                url: Url::parse("https://github.com/example/xvim").ok(),
                ..PackageInfo::default()
            },
            Arc::new(installer),
        )
    }

    fn installed_xvim(installer: MockInstaller) -> Package {
        Package::from_metadata(
            &metadata(&json!({ "name": "xvim", "installed": true })),
            Arc::new(installer),
        )
    }

    fn mock() -> MockInstaller {
        let mut installer = MockInstaller::new();
        installer.expect_kind().return_const("plugins");
        installer
    }

    fn collect(events: &Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = events.recv_timeout(TIMEOUT) {
            let terminal = matches!(event, Event::Completed | Event::Failed(_));
            out.push(event);
            if terminal {
                break;
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn from_metadata_reads_fields() {
        let package = Package::from_metadata(
            &metadata(&json!({
                "name": "xvim",
                "description": "Vim keybindings",
                "url": "https://github.com/example/xvim",
                "screenshot": "https://example.com/xvim.png",
            })),
            Arc::new(mock()),
        );
        assert_eq!(package.name(), "xvim");
        assert_eq!(package.description(), "Vim keybindings");
        assert_eq!(
            package.url().map(Url::as_str),
            Some("https://github.com/example/xvim")
        );
        assert!(!package.is_installed());
        assert_eq!(package.state(), PackageState::Idle);
    }

    #[test]
    fn from_metadata_reads_checkout_reference() {
        let info = PackageInfo::from_metadata(&metadata(&json!({
            "name": "xvim",
            "tag": "1.0.0",
            "branch": "",
        })));
        assert_eq!(info.checkout, SyncOptions::tag("1.0.0"));
    }

    #[test]
    fn from_metadata_tolerates_missing_and_bad_values() {
        let info = PackageInfo::from_metadata(&metadata(&json!({
            "name": 42,
            "url": "not a url",
            "branch": 7,
        })));
        assert_eq!(info, PackageInfo::default());
    }

    #[test]
    fn from_metadata_honours_installed_flag() {
        let package = installed_xvim(mock());
        assert!(package.is_installed());
        assert_eq!(package.state(), PackageState::Installed);
    }

    #[test]
    fn state_display() {
        assert_eq!(PackageState::Idle.to_string(), "not installed");
        assert_eq!(PackageState::Removing.to_string(), "removing");
    }

    #[test]
    fn wait_without_terminal_event_is_abandoned() {
        let (tx, rx) = mpsc::channel();
        tx.send(Event::Progress(0.5)).unwrap();
        drop(tx);
        let mut seen = Vec::new();
        let err = wait(rx, |f| seen.push(f)).unwrap_err();
        assert!(matches!(err, PackageError::Abandoned), "{err:?}");
        assert_eq!(seen, vec![0.5]);
    }

    // -----------------------------------------------------------------------
    // Install / remove
    // -----------------------------------------------------------------------

    #[test]
    fn install_reports_progress_then_completion() {
        let mut installer = mock();
        installer
            .expect_install()
            .times(1)
            .returning(|info, mut reporter| {
                assert_eq!(info.name, "xvim");
                reporter.progress(0.5);
                reporter.progress(1.0);
                reporter.complete();
            });
        let package = xvim(installer);

        let events = collect(&package.install_events());
        assert_eq!(events.len(), 3, "{events:?}");
        assert!(matches!(events[0], Event::Progress(f) if (f - 0.5).abs() < f64::EPSILON));
        assert!(matches!(events[2], Event::Completed));
        assert!(package.is_installed());
        assert_eq!(package.state(), PackageState::Installed);
    }

    #[test]
    fn installed_flag_is_set_before_completion_runs() {
        let mut installer = mock();
        installer
            .expect_install()
            .returning(|_, reporter| reporter.complete());
        let package = xvim(installer);

        let (tx, rx) = mpsc::channel();
        let observer = package.clone();
        let caller = std::thread::current().id();
        package.install(
            |_| {},
            move || {
                tx.send((observer.is_installed(), std::thread::current().id()))
                    .unwrap();
            },
            |e| panic!("unexpected failure: {e}"),
        );
        let (installed, thread) = rx.recv_timeout(TIMEOUT).unwrap();
        assert!(installed);
        assert_ne!(thread, caller, "completion runs on a worker thread");
    }

    #[test]
    fn install_failure_wraps_cause_and_keeps_state() {
        let mut installer = mock();
        installer
            .expect_install()
            .returning(|_, reporter| reporter.fail("repository not found"));
        let package = xvim(installer);

        let err = package.install_blocking(|_| {}).unwrap_err();
        match &err {
            PackageError::InstallFailed { package, source } => {
                assert_eq!(package, "xvim");
                assert_eq!(source.to_string(), "repository not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!package.is_installed());
        assert_eq!(package.state(), PackageState::Idle);
    }

    #[test]
    fn remove_clears_installed() {
        let mut installer = mock();
        installer
            .expect_remove()
            .times(1)
            .returning(|_, reporter| reporter.complete());
        let package = installed_xvim(installer);

        package.remove_blocking(|_| {}).unwrap();
        assert!(!package.is_installed());
        assert_eq!(package.state(), PackageState::Idle);
    }

    #[test]
    fn remove_failure_keeps_installed() {
        let mut installer = mock();
        installer
            .expect_remove()
            .returning(|_, reporter| reporter.fail("permission denied"));
        let package = installed_xvim(installer);

        let err = package.remove_blocking(|_| {}).unwrap_err();
        assert!(matches!(err, PackageError::RemoveFailed { .. }), "{err:?}");
        assert!(package.is_installed());
    }

    #[test]
    fn blocking_forwards_progress_on_caller() {
        let mut installer = mock();
        installer.expect_install().returning(|_, mut reporter| {
            reporter.progress(0.1);
            reporter.progress(0.6);
            reporter.complete();
        });
        let package = xvim(installer);

        let mut seen = Vec::new();
        package.install_blocking(|f| seen.push(f)).unwrap();
        assert_eq!(seen, vec![0.1, 0.6]);
    }

    #[test]
    fn dropped_reporter_fails_as_abandoned() {
        let mut installer = mock();
        installer.expect_install().returning(|_, reporter| drop(reporter));
        let package = xvim(installer);

        let err = package.install_blocking(|_| {}).unwrap_err();
        match err {
            PackageError::InstallFailed { source, .. } => {
                assert!(source.downcast_ref::<PackageError>().is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(package.state(), PackageState::Idle);
    }

    #[test]
    fn panicking_installer_still_fails_once() {
        let mut installer = mock();
        installer
            .expect_install()
            .returning(|_, _reporter| panic!("installer bug"));
        let package = xvim(installer);

        let events = collect(&package.install_events());
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::Failed(PackageError::InstallFailed { .. })));
        assert_eq!(package.state(), PackageState::Idle);
    }

    // -----------------------------------------------------------------------
    // Busy guard
    // -----------------------------------------------------------------------

    #[test]
    fn second_operation_while_busy_fails() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let mut installer = mock();
        installer
            .expect_install()
            .times(1)
            .returning(move |_, reporter| {
                started_tx.send(()).unwrap();
                release_rx.lock().unwrap().recv_timeout(TIMEOUT).unwrap();
                reporter.complete();
            });
        installer.expect_remove().never();
        let package = xvim(installer);

        let first = package.install_events();
        started_rx.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(package.state(), PackageState::Installing);

        let second = collect(&package.install_events());
        assert!(matches!(second.as_slice(), [Event::Failed(PackageError::Busy { .. })]));
        let third = collect(&package.remove_events());
        assert!(matches!(third.as_slice(), [Event::Failed(PackageError::Busy { .. })]));

        release_tx.send(()).unwrap();
        let first = collect(&first);
        assert!(matches!(first.as_slice(), [Event::Completed]));
        assert_eq!(package.state(), PackageState::Installed);
    }

    #[test]
    fn package_is_reusable_after_failure() {
        let mut installer = mock();
        let mut seq = mockall::Sequence::new();
        installer
            .expect_install()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, reporter| reporter.fail("network down"));
        installer
            .expect_install()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, reporter| reporter.complete());
        let package = xvim(installer);

        assert!(package.install_blocking(|_| {}).is_err());
        package.install_blocking(|_| {}).unwrap();
        assert!(package.is_installed());
    }
}
