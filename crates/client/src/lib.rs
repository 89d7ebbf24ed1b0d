//! Blocking Rust client for the Yandex Disk REST API.
//!
//! Authentication, listing, uploads, downloads and file management,
//! with asynchronous transfer and operation tracking from
//! [`yandisk-core`](yandisk_core) underneath.
//!
//! ```no_run
//! use yandisk_client::{DiskPath, Watchable, YanDisk};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let disk = YanDisk::new("OAUTH_TOKEN");
//!
//! for entry in disk.list(&DiskPath::parse("disk:/photos")?, 20, 0)? {
//!     println!("{} ({})", entry.name(), entry.path());
//! }
//!
//! let transfer = disk
//!     .download(&DiskPath::parse("disk:/photos/cat.jpg")?)?
//!     .read_async_file("cat.jpg")?;
//! transfer.wait_until_done();
//! assert!(transfer.error().is_none());
//! # Ok(())
//! # }
//! ```

mod accessor;
mod auth;
mod client;
mod http;
mod node;
mod pages;
mod path;

pub use accessor::{Downloader, Link, UploadSink, Uploader};
pub use auth::{AuthHandler, AuthHandlerBuilder, AuthResponse, AuthScheme, AuthScope, auth};
pub use client::{DEFAULT_PAGE_SIZE, TokenSource, YanDisk};
pub use node::{DirectoryNode, FileNode, Node};
pub use pages::{PageFn, PageIter, Paginated};
pub use path::DiskPath;

pub use yandisk_core::{
    ByteSink, ByteSource, DiskError, Operation, OperationStatus, SealedTransfer, SharedError,
    StatusFn, Transfer, TransferService, WatchFn, Watchable,
};
