//! The shared observation contract for transfers and operations.

use std::sync::{Arc, Condvar, Mutex};

use crate::error::DiskError;

/// Callback registered through [`Watchable::watch`].
pub type WatchFn<W> = Box<dyn Fn(&W) + Send + Sync>;

/// A resource that may have progress, can be observed, and will
/// complete in the future.
///
/// Once [`is_done`](Watchable::is_done) reports `true` the resource
/// never changes again and registered callbacks are never invoked
/// again: the callback list is cleared in the same transaction that
/// commits the terminal transition.
pub trait Watchable {
    /// Registers a mutation callback, invoked whenever the resource
    /// changes. Registering on an already-complete resource is a no-op
    /// and the callback will never fire.
    fn watch(&self, callback: WatchFn<Self>)
    where
        Self: Sized;

    /// Returns `true` once the resource is complete (will no longer
    /// change).
    fn is_done(&self) -> bool;

    /// Returns `true` if this resource can report progress.
    fn has_progress(&self) -> bool {
        false
    }

    /// Progress as a value in `[0, 1]`.
    ///
    /// Fails with [`DiskError::NoProgress`] when the resource has no
    /// notion of total work (see [`has_progress`](Watchable::has_progress)).
    fn progress(&self) -> Result<f64, DiskError> {
        Err(DiskError::NoProgress)
    }

    /// Halts the calling thread until the resource completes.
    ///
    /// This is the only blocking primitive the SDK offers; everything
    /// else observes through callbacks or polling reads.
    fn wait_until_done(&self)
    where
        Self: Sized,
    {
        let signal = Arc::new((Mutex::new(false), Condvar::new()));
        let waker = Arc::clone(&signal);
        self.watch(Box::new(move |resource: &Self| {
            if resource.is_done() {
                let (flag, condvar) = &*waker;
                *flag.lock().unwrap() = true;
                condvar.notify_all();
            }
        }));

        let (flag, condvar) = &*signal;
        let mut fired = flag.lock().unwrap();
        // The terminal transition may have won the race against the
        // watch() above, in which case the callback was dropped and
        // will never fire.
        if self.is_done() {
            return;
        }
        while !*fired {
            fired = condvar.wait(fired).unwrap();
        }
    }
}
