//! Progress and outcome reporting for install/remove operations.
use std::fmt;

use crate::error::{BoxError, PackageError};

/// Outcome an installer reports for one operation.
pub type Outcome = Result<(), BoxError>;

/// A notification delivered for one install or remove operation.
///
/// Zero or more `Progress` events are followed by exactly one of `Completed`
/// or `Failed`.
#[derive(Debug)]
pub enum Event {
    /// Fraction of the work done, between 0.0 and 1.0.
    Progress(f64),
    /// The operation succeeded.
    Completed,
    /// The operation failed.
    Failed(PackageError),
}

/// Handed to an [`Installer`](super::Installer) for a single operation.
///
/// `progress` may be called any number of times. [`complete`](Self::complete)
/// and [`fail`](Self::fail) consume the reporter, so an operation can end only
/// once. A reporter dropped without either (including during a panic) reports
/// [`PackageError::Abandoned`].
pub struct Reporter {
    on_progress: Box<dyn FnMut(f64) + Send>,
    on_finish: Option<Box<dyn FnOnce(Outcome) + Send>>,
}

impl Reporter {
    /// Create a reporter from a progress sink and a terminal sink.
    pub fn new(
        on_progress: impl FnMut(f64) + Send + 'static,
        on_finish: impl FnOnce(Outcome) + Send + 'static,
    ) -> Self {
        Self {
            on_progress: Box::new(on_progress),
            on_finish: Some(Box::new(on_finish)),
        }
    }

    /// Report progress. Values are clamped to `0.0..=1.0`; NaN is dropped.
    pub fn progress(&mut self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        (self.on_progress)(fraction.clamp(0.0, 1.0));
    }

    /// Report success.
    pub fn complete(mut self) {
        self.settle(Ok(()));
    }

    /// Report failure with the underlying cause.
    pub fn fail(mut self, error: impl Into<BoxError>) {
        self.settle(Err(error.into()));
    }

    /// Report success or failure from a `Result`.
    pub fn finish<E: Into<BoxError>>(self, result: Result<(), E>) {
        match result {
            Ok(()) => self.complete(),
            Err(e) => self.fail(e),
        }
    }

    fn settle(&mut self, outcome: Outcome) {
        if let Some(on_finish) = self.on_finish.take() {
            on_finish(outcome);
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.settle(Err(Box::new(PackageError::Abandoned)));
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("finished", &self.on_finish.is_none())
            .finish_non_exhaustive()
    }
}
