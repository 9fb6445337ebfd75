//! Cooperative cancellation of a restore operation.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::error::{RestoreError, RestoreResult};

/// A cloneable handle to signal and observe cancellation.
///
/// Cancelling sets a flag and disconnects an internal channel. The flag serves the checks at
/// loop boundaries, the channel lets blocking loops `select!` between their input and
/// cancellation.
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    // dropping the sender disconnects `rx`, which wakes up every `select!` on it
    tx: Arc<Mutex<Option<Sender<()>>>>,
    rx: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a new, not yet cancelled token.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            tx: Arc::new(Mutex::new(Some(tx))),
            rx,
        }
    }

    /// Signal cancellation to all clones of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Ok(mut tx) = self.tx.lock() {
            drop(tx.take());
        }
    }

    /// Check if cancellation has been signaled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return an error if cancellation has been signaled.
    ///
    /// # Errors
    ///
    /// * [`RestoreErrorKind::Cancelled`] - If the operation has been cancelled.
    ///
    /// [`RestoreErrorKind::Cancelled`]: crate::error::RestoreErrorKind::Cancelled
    pub fn check(&self) -> RestoreResult<()> {
        if self.is_cancelled() {
            return Err(RestoreError::cancelled());
        }
        Ok(())
    }

    /// A receiver which becomes ready (disconnected) once cancelled.
    ///
    /// Never yields a message; use it as one arm of `crossbeam_channel::select!`.
    #[must_use]
    pub fn cancelled(&self) -> &Receiver<()> {
        &self.rx
    }
}
