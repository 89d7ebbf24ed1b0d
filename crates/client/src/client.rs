//! The Yandex Disk REST client.

use std::sync::Arc;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;
use yandisk_core::{DiskError, Operation};

use crate::accessor::{Downloader, Link, StatusPoller, Uploader};
use crate::auth::{AuthHandlerBuilder, AuthScheme};
use crate::http;
use crate::node::Node;
use crate::pages::Paginated;
use crate::path::DiskPath;

const BASE_URL: &str = "https://cloud-api.yandex.net/v1/disk/resources";

/// Default page size for paginated listings.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Supplies the current OAuth access token for each request.
pub type TokenSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Blocking client for the Yandex Disk REST API.
///
/// Cloning is cheap: clones share the underlying connection pool and
/// token source.
#[derive(Clone)]
pub struct YanDisk {
    http: Client,
    token: TokenSource,
    base: Url,
}

impl YanDisk {
    /// Provides a builder for an [`AuthHandler`](crate::AuthHandler)
    /// conforming to the given scheme. Alias for the crate-level
    /// `auth()` function.
    pub fn auth(scheme: AuthScheme) -> AuthHandlerBuilder {
        crate::auth::auth(scheme)
    }

    /// Creates a client with a fixed OAuth access token.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized.
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self::with_token_source(Arc::new(move || token.clone()))
    }

    /// Creates a client whose access token is produced on demand, for
    /// tokens that get refreshed while the client is alive.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized.
    pub fn with_token_source(token: TokenSource) -> Self {
        Self {
            http: http::build_client(),
            token,
            base: Url::parse(BASE_URL).expect("base URL is valid"),
        }
    }

    /// Points the client at a different resources endpoint. Intended
    /// for tests and self-hosted gateways.
    pub fn with_base_url(mut self, base: &str) -> Result<Self, DiskError> {
        self.base = Url::parse(base).map_err(DiskError::transport)?;
        Ok(self)
    }

    /// Lists files across the whole disk; one page of at most `limit`
    /// entries starting at `offset`.
    pub fn list_all(&self, limit: usize, offset: usize) -> Result<Vec<Node>, DiskError> {
        let mut url = self.endpoint(Some("files"));
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        let body = self.fetch_json(Method::GET, url)?;
        nodes_from(&body, "items")
    }

    /// Lists files across the whole disk as a paginated query.
    pub fn list_all_pages(&self, page_size: usize) -> Paginated<Node> {
        let client = self.clone();
        Paginated::new(
            page_size,
            Box::new(move |limit, offset| client.list_all(limit, offset)),
        )
    }

    /// Lists the entries parented to `root`; one page of at most
    /// `limit` entries starting at `offset`, sorted by path.
    ///
    /// Fails with [`DiskError::Operation`] when `root` is not a
    /// directory.
    pub fn list(&self, root: &DiskPath, limit: usize, offset: usize) -> Result<Vec<Node>, DiskError> {
        let mut url = self.endpoint(None);
        url.query_pairs_mut()
            .append_pair("path", &root.to_string())
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string())
            .append_pair("sort", "path");
        let body = self.fetch_json(Method::GET, url)?;

        if body.get("type").and_then(Value::as_str) != Some("dir") {
            return Err(DiskError::Operation(format!(
                "path \"{root}\" is not a directory"
            )));
        }
        let embedded = body
            .get("_embedded")
            .ok_or_else(|| malformed("directory listing carries no _embedded member"))?;
        nodes_from(embedded, "items")
    }

    /// Lists the entries parented to `root` as a paginated query.
    pub fn list_pages(&self, root: &DiskPath, page_size: usize) -> Paginated<Node> {
        let client = self.clone();
        let root = root.clone();
        Paginated::new(
            page_size,
            Box::new(move |limit, offset| client.list(&root, limit, offset)),
        )
    }

    /// Provisions a file upload to `path`. Use the returned
    /// [`Uploader`] to send the content.
    pub fn upload(&self, path: &DiskPath, overwrite: bool) -> Result<Uploader, DiskError> {
        let mut url = self.endpoint(Some("upload"));
        url.query_pairs_mut()
            .append_pair("path", &path.to_string())
            .append_pair("overwrite", bool_str(overwrite));
        let body = self.fetch_json(Method::GET, url)?;
        Uploader::new(self.http.clone(), link_from(body)?)
    }

    /// Provisions a file download from `path`. Use the returned
    /// [`Downloader`] to receive the content.
    pub fn download(&self, path: &DiskPath) -> Result<Downloader, DiskError> {
        let mut url = self.endpoint(Some("download"));
        url.query_pairs_mut()
            .append_pair("path", &path.to_string());
        let body = self.fetch_json(Method::GET, url)?;
        Downloader::new(self.http.clone(), link_from(body)?)
    }

    /// Copies a file or folder. Large copies run asynchronously on the
    /// backend; track the returned [`Operation`].
    pub fn copy(
        &self,
        from: &DiskPath,
        to: &DiskPath,
        overwrite: bool,
    ) -> Result<Operation, DiskError> {
        let mut url = self.endpoint(Some("copy"));
        url.query_pairs_mut()
            .append_pair("from", &from.to_string())
            .append_pair("path", &to.to_string())
            .append_pair("overwrite", bool_str(overwrite));
        self.operation_request(Method::POST, url)
    }

    /// Moves a file or folder. Large moves run asynchronously on the
    /// backend; track the returned [`Operation`].
    pub fn move_node(
        &self,
        from: &DiskPath,
        to: &DiskPath,
        overwrite: bool,
    ) -> Result<Operation, DiskError> {
        let mut url = self.endpoint(Some("move"));
        url.query_pairs_mut()
            .append_pair("from", &from.to_string())
            .append_pair("path", &to.to_string())
            .append_pair("overwrite", bool_str(overwrite));
        self.operation_request(Method::POST, url)
    }

    /// Deletes a file or folder. With `permanent` the node skips the
    /// trash. Large deletions run asynchronously on the backend; track
    /// the returned [`Operation`].
    pub fn delete(&self, path: &DiskPath, permanent: bool) -> Result<Operation, DiskError> {
        let mut url = self.endpoint(None);
        url.query_pairs_mut()
            .append_pair("path", &path.to_string())
            .append_pair("permanently", bool_str(permanent));
        self.operation_request(Method::DELETE, url)
    }

    /// Creates a folder. Returns `true` if the folder was created; with
    /// `lazy`, an already-existing folder yields `false` instead of an
    /// error.
    pub fn mkdir(&self, path: &DiskPath, lazy: bool) -> Result<bool, DiskError> {
        let mut url = self.endpoint(None);
        url.query_pairs_mut()
            .append_pair("path", &path.to_string());
        match self.fetch_json(Method::PUT, url) {
            Ok(_) => Ok(true),
            Err(DiskError::Api { code, .. })
                if lazy && code == "DiskPathPointsToExistentDirectoryError" =>
            {
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    fn endpoint(&self, segment: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if let Some(segment) = segment {
            let path = format!("{}/{segment}", url.path().trim_end_matches('/'));
            url.set_path(&path);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(method = %method, url = %url, "disk API request");
        self.http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("OAuth {}", (self.token)()),
            )
    }

    fn send(&self, method: Method, url: Url) -> Result<Response, DiskError> {
        self.request(method, url).send().map_err(http::transport)
    }

    fn fetch_json(&self, method: Method, url: Url) -> Result<Value, DiskError> {
        http::read_json(self.send(method, url)?)
    }

    /// Issues a request that either completes synchronously or hands
    /// back a status link to poll (HTTP 202).
    fn operation_request(&self, method: Method, url: Url) -> Result<Operation, DiskError> {
        let response = self.send(method, url)?;
        let status = response.status();
        let body = http::read_json(response)?;
        if status == StatusCode::ACCEPTED {
            let poller = StatusPoller::new(self.http.clone(), link_from(body)?)?;
            return Ok(poller.into_operation());
        }
        Ok(Operation::success())
    }
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn malformed(detail: &str) -> DiskError {
    DiskError::Operation(format!("malformed API payload: {detail}"))
}

fn link_from(body: Value) -> Result<Link, DiskError> {
    serde_json::from_value(body).map_err(|err| malformed(&err.to_string()))
}

fn nodes_from(body: &Value, field: &str) -> Result<Vec<Node>, DiskError> {
    let items = body
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(&format!("missing \"{field}\" array")))?;
    items
        .iter()
        .map(|item| serde_json::from_value(item.clone()).map_err(|err| malformed(&err.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_extends_the_base_path() {
        let disk = YanDisk::new("t");
        assert_eq!(
            disk.endpoint(Some("files")).as_str(),
            "https://cloud-api.yandex.net/v1/disk/resources/files"
        );
        assert_eq!(
            disk.endpoint(None).as_str(),
            "https://cloud-api.yandex.net/v1/disk/resources"
        );
    }

    #[test]
    fn base_url_override() {
        let disk = YanDisk::new("t")
            .with_base_url("http://127.0.0.1:9999/v1/disk/resources")
            .unwrap();
        assert_eq!(
            disk.endpoint(Some("upload")).as_str(),
            "http://127.0.0.1:9999/v1/disk/resources/upload"
        );
        assert!(YanDisk::new("t").with_base_url("not a url").is_err());
    }

    #[test]
    fn nodes_from_rejects_missing_items() {
        let err = nodes_from(&serde_json::json!({}), "items").unwrap_err();
        assert!(matches!(err, DiskError::Operation(_)));
    }
}
