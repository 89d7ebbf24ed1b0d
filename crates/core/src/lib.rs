//! Watchable transfer and operation tracking for the Yandex Disk SDK.
//!
//! Everything here is thread-based: byte relays run on worker threads
//! owned by a [`TransferService`], and long-running remote operations
//! are driven by per-operation polling daemons. Both expose the same
//! [`Watchable`] contract, so callers can observe completion, progress
//! and errors uniformly regardless of what is being tracked.

mod error;
mod id;
mod operation;
mod service;
mod transfer;
mod watch;

pub use error::{DiskError, SharedError};
pub use id::IdAllocator;
pub use operation::{Operation, OperationStatus, StatusFn};
pub use service::{ByteSink, ByteSource, CHUNK_SIZE, TransferService};
pub use transfer::{SealedTransfer, Transfer};
pub use watch::{WatchFn, Watchable};
