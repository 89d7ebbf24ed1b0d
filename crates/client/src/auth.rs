//! OAuth authorization flows.

use reqwest::blocking::Client;
use serde::Deserialize;
use url::Url;
use yandisk_core::DiskError;

use crate::http;

const AUTHORIZE_URL: &str = "https://oauth.yandex.com/authorize";
const TOKEN_URL: &str = "https://oauth.yandex.com/token";

/// A permission to request via the OAuth flow. Each one must also be
/// declared in the application settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScope {
    /// Access information about the disk.
    Info,
    /// Read the whole disk.
    Read,
    /// Write to the whole disk.
    Write,
    /// Access the application folder only.
    AppFolder,
    /// A scope token not covered by the named variants.
    Custom(String),
}

impl AuthScope {
    /// The scope token sent to the OAuth endpoints.
    pub fn token(&self) -> &str {
        match self {
            AuthScope::Info => "cloud_api:disk.info",
            AuthScope::Read => "cloud_api:disk.read",
            AuthScope::Write => "cloud_api:disk.write",
            AuthScope::AppFolder => "cloud_api:disk.app_folder",
            AuthScope::Custom(token) => token,
        }
    }
}

/// How the authorization code reaches the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// The flow redirects to a URL registered in the application
    /// settings; the application harvests the code from there.
    Code,
    /// The flow lands on a page that shows the code to the user, who
    /// relays it to the application by hand.
    ScreenCode,
}

/// Builds an [`AuthHandler`] for the given scheme.
///
/// ```no_run
/// use yandisk_client::{auth, AuthScheme, AuthScope};
///
/// let handler = auth(AuthScheme::ScreenCode)
///     .client_id("YOUR_CLIENT_ID")
///     .client_secret("YOUR_CLIENT_SECRET")
///     .scopes([AuthScope::Info, AuthScope::Read])
///     .build();
///
/// handler.open_url().ok();
/// let code = "code the user pasted back";
/// let response = handler.exchange(code).unwrap();
/// println!("OAuth token: {}", response.access_token);
/// ```
pub fn auth(scheme: AuthScheme) -> AuthHandlerBuilder {
    AuthHandlerBuilder {
        scheme,
        client_id: None,
        client_secret: None,
        scopes: Vec::new(),
        device_id: None,
        device_name: None,
        state: None,
        redirect_uri: None,
    }
}

/// Builder for an [`AuthHandler`]; obtained from [`auth`].
#[derive(Debug)]
pub struct AuthHandlerBuilder {
    scheme: AuthScheme,
    client_id: Option<String>,
    client_secret: Option<String>,
    scopes: Vec<AuthScope>,
    device_id: Option<String>,
    device_name: Option<String>,
    state: Option<String>,
    redirect_uri: Option<String>,
}

impl AuthHandlerBuilder {
    /// Application identifier (required).
    pub fn client_id(mut self, value: impl Into<String>) -> Self {
        self.client_id = Some(value.into());
        self
    }

    /// Application secret (required).
    pub fn client_secret(mut self, value: impl Into<String>) -> Self {
        self.client_secret = Some(value.into());
        self
    }

    /// Adds one scope to request.
    pub fn scope(mut self, scope: AuthScope) -> Self {
        self.scopes.push(scope);
        self
    }

    /// Adds several scopes to request.
    pub fn scopes(mut self, scopes: impl IntoIterator<Item = AuthScope>) -> Self {
        self.scopes.extend(scopes);
        self
    }

    /// Device identifier forwarded to the OAuth endpoints.
    pub fn device_id(mut self, value: impl Into<String>) -> Self {
        self.device_id = Some(value.into());
        self
    }

    /// Device name forwarded to the OAuth endpoints.
    pub fn device_name(mut self, value: impl Into<String>) -> Self {
        self.device_name = Some(value.into());
        self
    }

    /// Opaque state echoed back through the redirect.
    pub fn state(mut self, value: impl Into<String>) -> Self {
        self.state = Some(value.into());
        self
    }

    /// Redirect URI for the [`Code`](AuthScheme::Code) scheme; ignored
    /// by [`ScreenCode`](AuthScheme::ScreenCode).
    pub fn redirect_uri(mut self, value: impl Into<String>) -> Self {
        self.redirect_uri = Some(value.into());
        self
    }

    /// Builds the handler.
    ///
    /// # Panics
    ///
    /// Panics when `client_id` or `client_secret` was not provided, or
    /// if the HTTP/TLS backend cannot be initialized.
    pub fn build(self) -> AuthHandler {
        let client_id = self.client_id.expect("client_id is required");
        let client_secret = self.client_secret.expect("client_secret is required");
        let redirect_uri = match self.scheme {
            AuthScheme::Code => self.redirect_uri,
            AuthScheme::ScreenCode => None,
        };
        AuthHandler {
            http: http::build_client(),
            scheme: self.scheme,
            client_id,
            client_secret,
            scopes: self.scopes,
            device_id: self.device_id,
            device_name: self.device_name,
            state: self.state,
            redirect_uri,
            token_url: Url::parse(TOKEN_URL).expect("token URL is valid"),
        }
    }
}

/// Drives one OAuth authorization-code flow.
#[derive(Debug)]
pub struct AuthHandler {
    http: Client,
    scheme: AuthScheme,
    client_id: String,
    client_secret: String,
    scopes: Vec<AuthScope>,
    device_id: Option<String>,
    device_name: Option<String>,
    state: Option<String>,
    redirect_uri: Option<String>,
    token_url: Url,
}

impl AuthHandler {
    /// The scheme this handler drives.
    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    /// The URL the user must visit to grant access.
    pub fn authorize_url(&self) -> String {
        let mut url = Url::parse(AUTHORIZE_URL).expect("authorize URL is valid");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.client_id);
            if let Some(device_id) = &self.device_id {
                query.append_pair("device_id", device_id);
            }
            if let Some(device_name) = &self.device_name {
                query.append_pair("device_name", device_name);
            }
            if let Some(redirect_uri) = &self.redirect_uri {
                query.append_pair("redirect_uri", redirect_uri);
            }
            if let Some(state) = &self.state {
                query.append_pair("state", state);
            }
            if !self.scopes.is_empty() {
                let tokens: Vec<&str> = self.scopes.iter().map(AuthScope::token).collect();
                query.append_pair("scope", &tokens.join(" "));
            }
        }
        url.into()
    }

    /// Opens the authorization URL in the system's default browser.
    pub fn open_url(&self) -> Result<(), DiskError> {
        let url = self.authorize_url();
        let mut command = if cfg!(target_os = "windows") {
            let mut c = std::process::Command::new("cmd");
            c.args(["/C", "start", ""]).arg(&url);
            c
        } else if cfg!(target_os = "macos") {
            let mut c = std::process::Command::new("open");
            c.arg(&url);
            c
        } else {
            let mut c = std::process::Command::new("xdg-open");
            c.arg(&url);
            c
        };
        command.spawn()?;
        Ok(())
    }

    /// Exchanges the authorization code shown to the user for an OAuth
    /// token.
    pub fn exchange(&self, code: &str) -> Result<AuthResponse, DiskError> {
        let mut form: Vec<(&str, String)> = vec![
            ("grant_type", "authorization_code".into()),
            ("code", code.into()),
        ];
        if let Some(device_id) = &self.device_id {
            form.push(("device_id", device_id.clone()));
        }
        if let Some(device_name) = &self.device_name {
            form.push(("device_name", device_name.clone()));
        }

        let response = self
            .http
            .post(self.token_url.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .map_err(http::transport)?;
        let body = http::read_json(response)?;
        serde_json::from_value(body)
            .map_err(|err| DiskError::Operation(format!("malformed token payload: {err}")))
    }
}

/// Token material returned by a successful code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

impl AuthResponse {
    /// The token type the API issues.
    pub fn token_type(&self) -> &'static str {
        "bearer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(scheme: AuthScheme) -> AuthHandlerBuilder {
        auth(scheme).client_id("id-123").client_secret("secret-456")
    }

    #[test]
    fn authorize_url_carries_the_basics() {
        let url = handler(AuthScheme::ScreenCode).build().authorize_url();
        assert!(url.starts_with("https://oauth.yandex.com/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=id-123"));
        assert!(!url.contains("scope="));
        assert!(!url.contains("redirect_uri="));
    }

    #[test]
    fn authorize_url_joins_scopes_with_spaces() {
        let url = handler(AuthScheme::ScreenCode)
            .scopes([AuthScope::Info, AuthScope::Read])
            .scope(AuthScope::Custom("cloud_api:disk.special".into()))
            .build()
            .authorize_url();
        assert!(url.contains(
            "scope=cloud_api%3Adisk.info+cloud_api%3Adisk.read+cloud_api%3Adisk.special"
        ));
    }

    #[test]
    fn redirect_uri_only_applies_to_the_code_scheme() {
        let url = handler(AuthScheme::Code)
            .redirect_uri("https://app.example/callback")
            .build()
            .authorize_url();
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example%2Fcallback"));

        let url = handler(AuthScheme::ScreenCode)
            .redirect_uri("https://app.example/callback")
            .build()
            .authorize_url();
        assert!(!url.contains("redirect_uri"));
    }

    #[test]
    fn device_info_and_state_are_forwarded() {
        let url = handler(AuthScheme::ScreenCode)
            .device_id("dev-1")
            .device_name("workstation")
            .state("xyzzy")
            .build()
            .authorize_url();
        assert!(url.contains("device_id=dev-1"));
        assert!(url.contains("device_name=workstation"));
        assert!(url.contains("state=xyzzy"));
    }

    #[test]
    #[should_panic(expected = "client_id is required")]
    fn build_requires_a_client_id() {
        let _ = auth(AuthScheme::ScreenCode)
            .client_secret("secret")
            .build();
    }

    #[test]
    fn named_scope_tokens() {
        assert_eq!(AuthScope::Info.token(), "cloud_api:disk.info");
        assert_eq!(AuthScope::Read.token(), "cloud_api:disk.read");
        assert_eq!(AuthScope::Write.token(), "cloud_api:disk.write");
        assert_eq!(AuthScope::AppFolder.token(), "cloud_api:disk.app_folder");
    }
}
