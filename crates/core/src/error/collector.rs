use log::{error, warn};

use crate::error::RestoreError;

/// Run-scoped accumulator for errors which don't stop a restore.
///
/// Item and collection failures are added as recoverable errors and iteration goes on.
/// A hard failure is set either explicitly via [`FaultCollector::fail`] or, in `fail_fast`
/// mode, by the first recoverable error. Loops check [`FaultCollector::failure`] at each
/// boundary and stop once it is set.
#[derive(Debug, Default)]
pub struct FaultCollector {
    /// The first error which stops the operation
    failure: Option<RestoreError>,

    /// The recoverable errors collected
    recovered: Vec<RestoreError>,

    /// The warnings collected
    warnings: Vec<String>,

    /// Treat the first recoverable error as failure
    fail_fast: bool,

    /// Whether to log items directly during addition
    log: bool,
}

impl FaultCollector {
    /// Create a new [`FaultCollector`]
    ///
    /// # Arguments
    ///
    /// * `fail_fast` - If true, the first recoverable error becomes the failure of the run
    #[must_use]
    pub fn new(fail_fast: bool) -> Self {
        Self {
            failure: None,
            recovered: Vec::new(),
            warnings: Vec::new(),
            fail_fast,
            log: false,
        }
    }

    /// Log every issue when it is added.
    #[must_use]
    pub fn with_logging(mut self) -> Self {
        self.log = true;
        self
    }

    /// Set the failure of the run. Only the first failure is kept, later ones are
    /// added as recoverable errors.
    pub fn fail(&mut self, err: RestoreError) {
        if self.log {
            error!("{err}");
        }

        if self.failure.is_none() {
            self.failure = Some(err);
        } else {
            self.recovered.push(err);
        }
    }

    /// Add an error that doesn't stop the run (unless in `fail_fast` mode).
    pub fn add_recoverable(&mut self, err: RestoreError) {
        if self.log {
            error!("{err}");
        }

        if self.fail_fast && self.failure.is_none() {
            self.failure = Some(err);
            return;
        }

        self.recovered.push(err);
    }

    /// Add a warning message.
    pub fn add_warning(&mut self, message: &str) {
        if self.log {
            warn!("{message}");
        }

        self.warnings.push(message.to_owned());
    }

    /// The failure which stops the run, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&RestoreError> {
        self.failure.as_ref()
    }

    /// Take the failure out of the collector.
    pub fn take_failure(&mut self) -> Option<RestoreError> {
        self.failure.take()
    }

    /// The recoverable errors collected so far.
    #[must_use]
    pub fn recovered(&self) -> &[RestoreError] {
        &self.recovered
    }

    /// The warnings collected so far.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Whether any error has been collected.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.failure.is_some() || !self.recovered.is_empty()
    }

    /// Log everything collected.
    pub fn log_all(&self) {
        if let Some(failure) = &self.failure {
            error!("{failure}");
        }
        for err in &self.recovered {
            error!("{err}");
        }
        for warning in &self.warnings {
            warn!("{warning}");
        }
    }
}
