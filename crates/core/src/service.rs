//! Worker-thread byte relay service.

use std::io::{Read, Write};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::error::DiskError;
use crate::id::IdAllocator;
use crate::transfer::{SealedTransfer, Transfer};

/// Fixed relay chunk size: 8 KiB.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Boxed byte source handed to [`TransferService::submit`].
pub type ByteSource = Box<dyn Read + Send>;

/// A byte destination that can fail on finalization.
///
/// `commit` runs after a successful copy, before the sink is dropped.
/// Sinks whose close has an observable outcome (an upload response, a
/// handshake with a remote peer) surface that outcome here; everything
/// else inherits the flushing default.
pub trait ByteSink: Write + Send {
    /// Finalizes the sink.
    fn commit(&mut self) -> Result<(), DiskError> {
        self.flush()?;
        Ok(())
    }
}

impl ByteSink for std::fs::File {}
impl ByteSink for Vec<u8> {}

/// Relays bytes from a source to a sink on a worker thread, updating a
/// [`Transfer`] after every chunk.
///
/// One thread is spawned per job with no upper bound; callers are
/// expected to bound their own concurrency. Worker names draw from an
/// [`IdAllocator`] so thread numbers stay small across many transfers.
pub struct TransferService {
    descriptor: String,
    ids: Arc<IdAllocator>,
}

impl TransferService {
    /// Creates a service whose worker threads are labeled with
    /// `descriptor`.
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            ids: Arc::new(IdAllocator::default()),
        }
    }

    /// Submits a relay job and immediately returns a sealed view of its
    /// transfer.
    ///
    /// The job opens the source, then the sink, copies [`CHUNK_SIZE`]
    /// chunks and advances the transfer after every written chunk.
    /// Whatever happens, the transfer reaches its done state: failures
    /// are recorded on the transfer itself (see
    /// [`SealedTransfer::error`]), never thrown out of the worker.
    pub fn submit<I, O>(
        &self,
        open_source: I,
        open_sink: O,
        expected: Option<u64>,
    ) -> SealedTransfer
    where
        I: FnOnce() -> Result<ByteSource, DiskError> + Send + 'static,
        O: FnOnce() -> Result<Box<dyn ByteSink>, DiskError> + Send + 'static,
    {
        let transfer = Transfer::create(expected);
        let sealed = transfer.seal();

        let id = self.ids.acquire();
        let name = format!("yandisk {} worker #{}", self.descriptor, id + 1);
        let ids = Arc::clone(&self.ids);
        let job_transfer = Arc::clone(&transfer);

        let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
            let _slot = Slot { ids, id };
            let _finish = Finish(&job_transfer);
            debug!(worker = %name, "relay job started");
            if let Err(error) = relay(&job_transfer, open_source, open_sink) {
                debug!(worker = %name, error = %error, "relay job failed");
                job_transfer.raise(error);
            }
        });

        if let Err(error) = spawned {
            // The worker never existed; finalize inline.
            warn!(error = %error, "failed to spawn relay worker");
            self.ids.release(id);
            transfer.raise(DiskError::Io(error));
            transfer.complete();
        }

        sealed
    }
}

/// Releases the worker's allocator id when the thread exits, success or
/// not.
struct Slot {
    ids: Arc<IdAllocator>,
    id: usize,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.ids.release(self.id);
    }
}

/// Drives the transfer to done on every exit path, panics included.
struct Finish<'a>(&'a Transfer);

impl Drop for Finish<'_> {
    fn drop(&mut self) {
        self.0.complete();
    }
}

fn relay<I, O>(transfer: &Transfer, open_source: I, open_sink: O) -> Result<(), DiskError>
where
    I: FnOnce() -> Result<ByteSource, DiskError>,
    O: FnOnce() -> Result<Box<dyn ByteSink>, DiskError>,
{
    let mut source = open_source()?;
    let mut sink = open_sink()?;
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let read = source.read(&mut buf)?;
        if read == 0 {
            break;
        }
        sink.write_all(&buf[..read])?;
        transfer.advance(read as u64);
    }
    sink.commit()
}
