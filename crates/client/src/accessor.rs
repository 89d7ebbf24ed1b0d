//! Upload, download and status accessors returned by provisioning calls.

use std::io::{PipeWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::thread::{self, JoinHandle};

use reqwest::Method;
use reqwest::blocking::{Body, Client};
use serde::Deserialize;
use yandisk_core::{
    ByteSink, ByteSource, DiskError, Operation, SealedTransfer, TransferService,
};

use crate::http;

/// Shared relay services, one per direction, so worker numbering is
/// recycled within uploads and within downloads.
static DOWNLOADS: LazyLock<TransferService> =
    LazyLock::new(|| TransferService::new("download"));
static UPLOADS: LazyLock<TransferService> = LazyLock::new(|| TransferService::new("upload"));

/// An `href`/`method` pair pointing at an upload, download or status
/// endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
    pub method: String,
    #[serde(default)]
    pub templated: bool,
}

impl Link {
    /// Rejects templated links: the SDK has no rule to expand them.
    fn ensure_plain(&self) -> Result<(), DiskError> {
        if self.templated {
            return Err(DiskError::Operation(format!(
                "no rule to handle templated URL: {}",
                self.href
            )));
        }
        Ok(())
    }

    fn http_method(&self) -> Result<Method, DiskError> {
        Method::from_bytes(self.method.as_bytes()).map_err(|_| {
            DiskError::Operation(format!("unsupported HTTP method \"{}\"", self.method))
        })
    }
}

// ---------------------------------------------------------------------------
// Downloader
// ---------------------------------------------------------------------------

/// Reads a provisioned file download.
#[derive(Debug, Clone)]
pub struct Downloader {
    http: Client,
    link: Link,
}

impl Downloader {
    pub(crate) fn new(http: Client, link: Link) -> Result<Self, DiskError> {
        link.ensure_plain()?;
        Ok(Self { http, link })
    }

    /// The raw link backing this download.
    pub fn link(&self) -> &Link {
        &self.link
    }

    fn send(&self) -> Result<reqwest::blocking::Response, DiskError> {
        let response = self
            .http
            .request(self.link.http_method()?, &self.link.href)
            .send()
            .map_err(http::transport)?;
        let status = response.status();
        if status.is_server_error() {
            return Err(DiskError::Gateway(status.as_u16()));
        }
        if !status.is_success() {
            return Err(http::unknown_client_error(status));
        }
        Ok(response)
    }

    /// Opens the download stream.
    pub fn open(&self) -> Result<ByteSource, DiskError> {
        Ok(Box::new(self.send()?))
    }

    /// Pipes the download into a local file, blocking until done.
    pub fn read_to_file(&self, path: &Path) -> Result<(), DiskError> {
        let mut source = self.send()?;
        let mut file = std::fs::File::create(path)?;
        std::io::copy(&mut source, &mut file)?;
        file.flush()?;
        Ok(())
    }

    /// Downloads asynchronously into `sink`, reporting progress through
    /// the returned transfer.
    ///
    /// The connection is made eagerly, so connection failures surface
    /// here rather than on the transfer; the expected size comes from
    /// the response's `Content-Length`, when present.
    pub fn read_async<S>(&self, sink: S) -> Result<SealedTransfer, DiskError>
    where
        S: ByteSink + 'static,
    {
        let response = self.send()?;
        let expected = response.content_length();
        Ok(DOWNLOADS.submit(
            move || Ok(Box::new(response) as ByteSource),
            move || Ok(Box::new(sink) as Box<dyn ByteSink>),
            expected,
        ))
    }

    /// Downloads asynchronously into a local file created at `path`.
    pub fn read_async_file(&self, path: impl Into<PathBuf>) -> Result<SealedTransfer, DiskError> {
        let path = path.into();
        let response = self.send()?;
        let expected = response.content_length();
        Ok(DOWNLOADS.submit(
            move || Ok(Box::new(response) as ByteSource),
            move || {
                let file = std::fs::File::create(&path)?;
                Ok(Box::new(file) as Box<dyn ByteSink>)
            },
            expected,
        ))
    }
}

// ---------------------------------------------------------------------------
// Uploader
// ---------------------------------------------------------------------------

/// Writes a provisioned file upload.
#[derive(Debug, Clone)]
pub struct Uploader {
    http: Client,
    link: Link,
}

impl Uploader {
    pub(crate) fn new(http: Client, link: Link) -> Result<Self, DiskError> {
        link.ensure_plain()?;
        Ok(Self { http, link })
    }

    /// The raw link backing this upload.
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Starts the upload request and returns a sink streaming into its
    /// body.
    ///
    /// Everything written before [`commit`](ByteSink::commit) is sent
    /// as the file content; `commit` finishes the request and returns
    /// the backend's verdict.
    pub fn open(&self) -> Result<UploadSink, DiskError> {
        let (body, writer) = std::io::pipe()?;
        let request = self
            .http
            .request(self.link.http_method()?, &self.link.href)
            .body(Body::new(body));

        let sender = thread::Builder::new()
            .name("yandisk upload sender".into())
            .spawn(move || -> Result<(), DiskError> {
                let response = request.send().map_err(http::transport)?;
                unwrap_upload_status(response.status().as_u16())
            })
            .map_err(DiskError::Io)?;

        Ok(UploadSink {
            writer: Some(writer),
            sender: Some(sender),
        })
    }

    /// Uploads everything `content` yields, blocking until the backend
    /// acknowledges.
    pub fn write(&self, mut content: impl Read) -> Result<(), DiskError> {
        let mut sink = self.open()?;
        std::io::copy(&mut content, &mut sink)?;
        sink.commit()
    }

    /// Uploads a local file, blocking until the backend acknowledges.
    pub fn write_file(&self, path: &Path) -> Result<(), DiskError> {
        let file = std::fs::File::open(path)?;
        self.write(file)
    }

    /// Uploads `content` asynchronously. `size` is the expected number
    /// of bytes, or `None` when unknown.
    pub fn write_async<R>(&self, content: R, size: Option<u64>) -> SealedTransfer
    where
        R: Read + Send + 'static,
    {
        let uploader = self.clone();
        UPLOADS.submit(
            move || Ok(Box::new(content) as ByteSource),
            move || Ok(Box::new(uploader.open()?) as Box<dyn ByteSink>),
            size,
        )
    }

    /// Uploads the content served at `url`, blocking until the backend
    /// acknowledges.
    pub fn write_url(&self, url: &str) -> Result<(), DiskError> {
        self.write(self.fetch_source(url)?)
    }

    /// Uploads the content served at `url` asynchronously; the expected
    /// size is taken from the source's `Content-Length` when present.
    pub fn write_async_url(&self, url: &str) -> Result<SealedTransfer, DiskError> {
        let response = self.fetch_source(url)?;
        let expected = response.content_length();
        let uploader = self.clone();
        Ok(UPLOADS.submit(
            move || Ok(Box::new(response) as ByteSource),
            move || Ok(Box::new(uploader.open()?) as Box<dyn ByteSink>),
            expected,
        ))
    }

    fn fetch_source(&self, url: &str) -> Result<reqwest::blocking::Response, DiskError> {
        let response = self.http.get(url).send().map_err(http::transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiskError::transport(format!(
                "source URL answered HTTP {} ({url})",
                status.as_u16()
            )));
        }
        Ok(response)
    }

    /// Uploads a local file asynchronously; the expected size is taken
    /// from its metadata when available.
    pub fn write_async_file(&self, path: impl Into<PathBuf>) -> SealedTransfer {
        let path = path.into();
        let size = std::fs::metadata(&path).map(|meta| meta.len()).ok();
        let uploader = self.clone();
        UPLOADS.submit(
            move || {
                let file = std::fs::File::open(&path)?;
                Ok(Box::new(file) as ByteSource)
            },
            move || Ok(Box::new(uploader.open()?) as Box<dyn ByteSink>),
            size,
        )
    }
}

fn unwrap_upload_status(status: u16) -> Result<(), DiskError> {
    match status {
        200..=299 => Ok(()),
        413 => Err(DiskError::Limit("file too large (HTTP 413)".into())),
        507 => Err(DiskError::Limit("out of space (HTTP 507)".into())),
        500..=599 => Err(DiskError::Gateway(status)),
        other => Err(DiskError::transport(format!(
            "non-2XX HTTP response code {other}"
        ))),
    }
}

/// Streams bytes into an in-flight upload request.
///
/// Dropping the sink without committing abandons the upload: the
/// request still terminates, but its outcome is discarded.
#[derive(Debug)]
pub struct UploadSink {
    writer: Option<PipeWriter>,
    sender: Option<JoinHandle<Result<(), DiskError>>>,
}

impl Write for UploadSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(std::io::Error::other("upload sink already committed")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl ByteSink for UploadSink {
    /// Closes the body stream and returns the backend's verdict for the
    /// whole upload.
    fn commit(&mut self) -> Result<(), DiskError> {
        // Closing the pipe ends the request body.
        drop(self.writer.take());
        match self.sender.take() {
            Some(sender) => match sender.join() {
                Ok(result) => result,
                Err(_) => Err(DiskError::transport("upload sender thread panicked")),
            },
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// StatusPoller
// ---------------------------------------------------------------------------

/// Polls the status endpoint of a server-side asynchronous action.
#[derive(Debug, Clone)]
pub(crate) struct StatusPoller {
    http: Client,
    link: Link,
}

impl StatusPoller {
    pub(crate) fn new(http: Client, link: Link) -> Result<Self, DiskError> {
        link.ensure_plain()?;
        Ok(Self { http, link })
    }

    /// One status round trip; returns the backend's raw status code
    /// string.
    fn fetch_status(&self) -> Result<String, DiskError> {
        let response = self
            .http
            .request(self.link.http_method()?, &self.link.href)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(http::transport)?;
        let body = http::read_json(response)?;
        body.get("status")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| DiskError::Operation("status endpoint provided invalid data".into()))
    }

    /// Wires the poller into a pending [`Operation`].
    pub(crate) fn into_operation(self) -> Operation {
        Operation::pending(Box::new(move || self.fetch_status()))
    }
}
