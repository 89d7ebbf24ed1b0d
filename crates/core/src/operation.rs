//! Long-running remote operation tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, Once, RwLock};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{DiskError, SharedError};
use crate::id::IdAllocator;
use crate::watch::{WatchFn, Watchable};

/// Status of a remote asynchronous action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// The backend is still working.
    Pending,
    /// Terminal: the action finished.
    Success,
    /// Terminal: the action did not finish.
    Failed,
}

impl OperationStatus {
    /// Returns `true` for [`Pending`](OperationStatus::Pending).
    pub fn is_pending(self) -> bool {
        matches!(self, OperationStatus::Pending)
    }

    /// Returns `true` for [`Success`](OperationStatus::Success) or
    /// [`Failed`](OperationStatus::Failed).
    pub fn is_complete(self) -> bool {
        !self.is_pending()
    }
}

/// Synchronous probe returning the backend's status code for an
/// operation: one of `"success"`, `"failed"` or `"in-progress"`.
pub type StatusFn = Box<dyn Fn() -> Result<String, DiskError> + Send>;

const DEFAULT_REFRESH: Duration = Duration::from_millis(1000);

/// Numbers polling daemons process-wide so names stay small.
static DAEMON_IDS: LazyLock<IdAllocator> = LazyLock::new(IdAllocator::default);

/// Observable record of a server-side asynchronous action (a large
/// copy, move or delete).
///
/// Construction is cheap and side-effect free: the backend is not
/// contacted until the first [`status`](Self::status) or
/// [`watch`](Watchable::watch) call starts the polling daemon. The
/// daemon polls at the [refresh interval](Self::refresh_interval),
/// commits exactly one terminal transition and exits.
#[derive(Clone)]
pub struct Operation {
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    Terminal(OperationStatus),
    Live(Arc<LiveOperation>),
}

impl Operation {
    /// An operation the backend completed synchronously.
    ///
    /// # Panics
    ///
    /// Panics when `status` is still pending.
    pub fn completed(status: OperationStatus) -> Self {
        assert!(
            status.is_complete(),
            "a completed operation cannot be pending"
        );
        Self {
            repr: Repr::Terminal(status),
        }
    }

    /// An already-successful operation.
    pub fn success() -> Self {
        Self::completed(OperationStatus::Success)
    }

    /// An already-failed operation.
    pub fn failed() -> Self {
        Self::completed(OperationStatus::Failed)
    }

    /// An operation whose outcome must be polled through `probe`.
    pub fn pending(probe: StatusFn) -> Self {
        Self {
            repr: Repr::Live(Arc::new(LiveOperation {
                probe: Mutex::new(Some(probe)),
                state: RwLock::new(LiveState {
                    status: OperationStatus::Pending,
                    errors: Vec::new(),
                    callbacks: Vec::new(),
                }),
                refresh_ms: AtomicU64::new(DEFAULT_REFRESH.as_millis() as u64),
                daemon: Once::new(),
            })),
        }
    }

    /// The current status.
    ///
    /// Never blocks on the network: polling happens on the daemon
    /// thread, which this call starts on first use. After a failure the
    /// captured error is returned by every subsequent call, not just
    /// the first.
    pub fn status(&self) -> Result<OperationStatus, SharedError> {
        match &self.repr {
            Repr::Terminal(status) => Ok(*status),
            Repr::Live(live) => {
                LiveOperation::ensure_daemon(live);
                let state = live.state.read().unwrap();
                match state.errors.last() {
                    Some(error) => Err(Arc::clone(error)),
                    None => Ok(state.status),
                }
            }
        }
    }

    /// Time between polls of the status endpoint, or `None` for an
    /// operation that completed synchronously.
    pub fn refresh_interval(&self) -> Option<Duration> {
        match &self.repr {
            Repr::Terminal(_) => None,
            Repr::Live(live) => Some(Duration::from_millis(
                live.refresh_ms.load(Ordering::Relaxed),
            )),
        }
    }

    /// Sets the time between polls. The daemon re-reads the interval
    /// before each sleep, so an in-flight poll loop picks the change up
    /// on its next iteration. No-op for completed operations; does not
    /// start the daemon.
    pub fn set_refresh_interval(&self, interval: Duration) {
        if let Repr::Live(live) = &self.repr {
            live.refresh_ms
                .store(interval.as_millis() as u64, Ordering::Relaxed);
        }
    }
}

impl Watchable for Operation {
    fn watch(&self, callback: WatchFn<Self>) {
        match &self.repr {
            Repr::Terminal(_) => {}
            Repr::Live(live) => {
                LiveOperation::ensure_daemon(live);
                let mut state = live.state.write().unwrap();
                if state.status.is_complete() {
                    return;
                }
                state.callbacks.push(callback);
            }
        }
    }

    fn is_done(&self) -> bool {
        match self.status() {
            Ok(status) => status.is_complete(),
            // A captured error implies the terminal failed state.
            Err(_) => true,
        }
    }
}

struct LiveOperation {
    /// Taken by the daemon on startup; `None` afterwards.
    probe: Mutex<Option<StatusFn>>,
    state: RwLock<LiveState>,
    refresh_ms: AtomicU64,
    daemon: Once,
}

struct LiveState {
    status: OperationStatus,
    errors: Vec<SharedError>,
    callbacks: Vec<WatchFn<Operation>>,
}

impl LiveOperation {
    /// Starts the polling daemon at most once per operation.
    fn ensure_daemon(this: &Arc<LiveOperation>) {
        this.daemon.call_once(|| {
            let probe = this
                .probe
                .lock()
                .unwrap()
                .take()
                .expect("probe is present until the daemon starts");
            let id = DAEMON_IDS.acquire();
            let name = format!("yandisk operation daemon #{}", id + 1);
            let operation = Arc::clone(this);

            let spawned = thread::Builder::new().name(name).spawn(move || {
                let _slot = DaemonSlot(id);
                run_daemon(operation, probe);
            });

            if let Err(error) = spawned {
                DAEMON_IDS.release(id);
                warn!(error = %error, "failed to spawn operation daemon");
                this.record_error(DiskError::Io(error));
                LiveOperation::commit(this, OperationStatus::Failed);
            }
        });
    }

    /// Commits a terminal transition: the first commit wins, detaches
    /// the callback list under the write lock and delivers it outside.
    fn commit(this: &Arc<LiveOperation>, status: OperationStatus) {
        debug_assert!(status.is_complete());
        let callbacks = {
            let mut state = this.state.write().unwrap();
            if state.status.is_complete() {
                return;
            }
            state.status = status;
            std::mem::take(&mut state.callbacks)
        };
        debug!(?status, watchers = callbacks.len(), "operation completed");
        let handle = Operation {
            repr: Repr::Live(Arc::clone(this)),
        };
        for callback in &callbacks {
            callback(&handle);
        }
    }

    /// Captures an error; an earlier capture is kept as suppressed.
    fn record_error(&self, error: DiskError) {
        self.state.write().unwrap().errors.push(Arc::new(error));
    }
}

/// Releases the daemon's allocator id when its thread exits.
struct DaemonSlot(usize);

impl Drop for DaemonSlot {
    fn drop(&mut self) {
        DAEMON_IDS.release(self.0);
    }
}

fn run_daemon(operation: Arc<LiveOperation>, probe: StatusFn) {
    let status = match poll_until_complete(&operation, &probe) {
        Ok(status) => status,
        Err(error) => {
            debug!(error = %error, "operation poll failed");
            operation.record_error(error);
            OperationStatus::Failed
        }
    };
    LiveOperation::commit(&operation, status);
}

fn poll_until_complete(
    operation: &LiveOperation,
    probe: &StatusFn,
) -> Result<OperationStatus, DiskError> {
    loop {
        let code = probe()?;
        let status = match code.as_str() {
            "success" => OperationStatus::Success,
            "failed" => OperationStatus::Failed,
            "in-progress" => OperationStatus::Pending,
            other => {
                return Err(DiskError::Operation(format!(
                    "invalid status code \"{other}\""
                )));
            }
        };
        if status.is_complete() {
            return Ok(status);
        }
        let interval = operation.refresh_ms.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(interval));
    }
}
