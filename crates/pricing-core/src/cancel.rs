//! # Cancellation
//!
//! Cooperative cancellation for engine runs, built on a `tokio::sync::watch`
//! channel so a run can be aborted from any thread or task.
//!
//! ```text
//! CancellationHandle ──cancel()──► watch<bool> ──► CancellationSignal
//!   (caller keeps)                                  (moved into RunContext;
//!                                                    polled between rules)
//! ```
//!
//! The pipeline polls the signal before every rule, never mid-evaluation.

use tokio::sync::watch;

/// Creates a connected handle / signal pair.
pub fn cancellation_pair() -> (CancellationHandle, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancellationHandle { tx },
        CancellationSignal { rx: Some(rx) },
    )
}

/// Caller side: requests cancellation.
#[derive(Debug)]
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
}

impl CancellationHandle {
    /// Requests cancellation. Idempotent; works even if every signal is gone.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Another signal observing this handle.
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: Some(self.tx.subscribe()),
        }
    }
}

/// Engine side: observed between rule executions.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancellationSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        CancellationSignal { rx: None }
    }

    /// True once the paired handle has called `cancel`.
    ///
    /// Dropping the handle without cancelling does not cancel the run.
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_observed() {
        let (handle, signal) = cancellation_pair();
        assert!(!signal.is_cancelled());

        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(handle.is_cancelled());
        assert!(handle.signal().is_cancelled());
    }

    #[test]
    fn test_never_signal() {
        assert!(!CancellationSignal::never().is_cancelled());
        assert!(!CancellationSignal::default().is_cancelled());
    }

    #[test]
    fn test_dropped_handle_does_not_cancel() {
        let (handle, signal) = cancellation_pair();
        drop(handle);
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let (handle, signal) = cancellation_pair();
        std::thread::spawn(move || handle.cancel()).join().unwrap();
        assert!(signal.is_cancelled());
    }
}
