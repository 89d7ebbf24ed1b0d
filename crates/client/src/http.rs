//! Blocking HTTP plumbing shared by the client, accessors and auth.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde_json::Value;
use yandisk_core::DiskError;

pub(crate) const USER_AGENT: &str = concat!("yandisk/", env!("CARGO_PKG_VERSION"));

/// Builds the shared blocking client.
///
/// Transfers may stream for a long time, so there is no overall request
/// timeout; only connecting is bounded.
///
/// # Panics
///
/// Panics if the TLS backend cannot be initialized.
pub(crate) fn build_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(30))
        .timeout(None)
        .build()
        .expect("failed to build HTTP client")
}

/// Maps a reqwest failure into the SDK error type.
pub(crate) fn transport(err: reqwest::Error) -> DiskError {
    DiskError::transport(err)
}

/// Extracts the structured API error from a payload, if present.
pub(crate) fn api_error(body: &Value) -> Option<DiskError> {
    let code = body.get("error")?.as_str()?.to_owned();
    let description = ["error_description", "description"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_owned);
    Some(DiskError::api(code, description))
}

/// Error for a non-2xx response carrying no structured error payload.
pub(crate) fn unknown_client_error(status: StatusCode) -> DiskError {
    DiskError::transport(format!(
        "API reported a client error but provided no details (HTTP {})",
        status.as_u16()
    ))
}

/// Decodes a JSON response, honoring the API's error conventions.
///
/// HTTP 5xx → [`DiskError::Gateway`]; any payload carrying an `error`
/// member → [`DiskError::Api`]; other non-2xx responses without a
/// structured error → transport error.
pub(crate) fn read_json(response: Response) -> Result<Value, DiskError> {
    let status = response.status();
    if status.is_server_error() {
        return Err(DiskError::Gateway(status.as_u16()));
    }
    let body: Value = match response.json() {
        Ok(body) => body,
        Err(_) if !status.is_success() => return Err(unknown_client_error(status)),
        Err(err) => return Err(transport(err)),
    };
    if let Some(error) = api_error(&body) {
        return Err(error);
    }
    if !status.is_success() {
        return Err(unknown_client_error(status));
    }
    Ok(body)
}
