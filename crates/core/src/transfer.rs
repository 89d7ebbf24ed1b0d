//! Byte transfer tracking.

use std::sync::{Arc, RwLock};

use crate::error::{DiskError, SharedError};
use crate::watch::{WatchFn, Watchable};

type Callback = Arc<dyn Fn(&Transfer) + Send + Sync>;

/// Observable record of the bytes moved by one relay job.
///
/// The relay worker that owns the transfer is its only writer;
/// arbitrary caller threads read concurrently, so the state sits
/// behind a read/write lock and callbacks are always invoked outside
/// of it. External callers receive a [`SealedTransfer`] and cannot
/// mutate.
pub struct Transfer {
    total: Option<u64>,
    state: RwLock<State>,
}

struct State {
    transferred: u64,
    done: bool,
    errors: Vec<SharedError>,
    callbacks: Vec<Callback>,
}

impl Transfer {
    /// Creates a new transfer. `total` is the number of bytes expected
    /// to move, or `None` when there is no expectation (progress cannot
    /// be calculated).
    pub fn create(total: Option<u64>) -> Arc<Self> {
        Arc::new(Self {
            total,
            state: RwLock::new(State {
                transferred: 0,
                done: false,
                errors: Vec::new(),
                callbacks: Vec::new(),
            }),
        })
    }

    /// Returns a read-only view of this transfer.
    pub fn seal(self: &Arc<Self>) -> SealedTransfer {
        SealedTransfer {
            backing: Arc::clone(self),
        }
    }

    /// The number of bytes transferred so far.
    pub fn transferred(&self) -> u64 {
        self.state.read().unwrap().transferred
    }

    /// The number of bytes expected to transfer, or `None` for no
    /// expectation.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// The most recent error raised on this transfer, if any.
    ///
    /// The transfer always completes; use this to test whether the
    /// completion was exceptional.
    pub fn error(&self) -> Option<SharedError> {
        self.state.read().unwrap().errors.last().cloned()
    }

    /// Errors that were absorbed by a later [`raise`](Self::raise),
    /// oldest first.
    pub fn suppressed(&self) -> Vec<SharedError> {
        let state = self.state.read().unwrap();
        match state.errors.len() {
            0 | 1 => Vec::new(),
            n => state.errors[..n - 1].to_vec(),
        }
    }

    /// Adds `bytes` to the transferred count and notifies watchers.
    ///
    /// Returns the applied delta; zero is a lock-free no-op.
    pub fn advance(&self, bytes: u64) -> u64 {
        if bytes == 0 {
            return 0;
        }
        let callbacks: Vec<Callback> = {
            let mut state = self.state.write().unwrap();
            state.transferred += bytes;
            state.callbacks.clone()
        };
        // Snapshot taken above; invoked outside the lock so a callback
        // may freely re-enter the transfer.
        for callback in &callbacks {
            callback(self);
        }
        bytes
    }

    /// Marks the transfer as complete, detaching and firing the
    /// registered callbacks. Only the first call delivers the terminal
    /// broadcast; subsequent calls are no-ops.
    pub fn complete(&self) {
        let callbacks: Vec<Callback> = {
            let mut state = self.state.write().unwrap();
            if state.done {
                return;
            }
            state.done = true;
            std::mem::take(&mut state.callbacks)
        };
        for callback in &callbacks {
            callback(self);
        }
    }

    /// Records an error without completing the transfer.
    ///
    /// When an error is already present the new one becomes primary and
    /// the old one is kept as [`suppressed`](Self::suppressed) rather
    /// than discarded.
    pub fn raise(&self, error: DiskError) {
        let mut state = self.state.write().unwrap();
        state.errors.push(Arc::new(error));
    }
}

impl Watchable for Transfer {
    fn watch(&self, callback: WatchFn<Self>) {
        let mut state = self.state.write().unwrap();
        if state.done {
            return;
        }
        state.callbacks.push(Arc::from(callback));
    }

    fn is_done(&self) -> bool {
        self.state.read().unwrap().done
    }

    fn has_progress(&self) -> bool {
        self.total.is_some()
    }

    fn progress(&self) -> Result<f64, DiskError> {
        let Some(total) = self.total else {
            return Err(DiskError::NoProgress);
        };
        if total == 0 {
            return Ok(1.0);
        }
        let transferred = self.transferred().min(total);
        Ok(transferred as f64 / total as f64)
    }
}

// ---------------------------------------------------------------------------
// SealedTransfer
// ---------------------------------------------------------------------------

/// Read-only view of a [`Transfer`].
///
/// All reads and watch registration delegate to the backing transfer;
/// mutation is simply not exposed. This is what
/// [`TransferService::submit`](crate::TransferService::submit) hands to
/// callers.
#[derive(Clone)]
pub struct SealedTransfer {
    backing: Arc<Transfer>,
}

impl SealedTransfer {
    /// The number of bytes transferred so far.
    pub fn transferred(&self) -> u64 {
        self.backing.transferred()
    }

    /// The number of bytes expected to transfer, or `None` for no
    /// expectation.
    pub fn total(&self) -> Option<u64> {
        self.backing.total()
    }

    /// The most recent error raised on the backing transfer, if any.
    pub fn error(&self) -> Option<SharedError> {
        self.backing.error()
    }

    /// Errors absorbed by a later raise, oldest first.
    pub fn suppressed(&self) -> Vec<SharedError> {
        self.backing.suppressed()
    }
}

impl Watchable for SealedTransfer {
    fn watch(&self, callback: WatchFn<Self>) {
        // Re-home the callback so watchers observe the sealed view, not
        // the mutable backing object.
        let view = self.clone();
        self.backing.watch(Box::new(move |_| callback(&view)));
    }

    fn is_done(&self) -> bool {
        self.backing.is_done()
    }

    fn has_progress(&self) -> bool {
        self.backing.has_progress()
    }

    fn progress(&self) -> Result<f64, DiskError> {
        self.backing.progress()
    }
}
