//! Credentials files and authorization settings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{GoogleError, GoogleResult};

/// Read-only Gmail access.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Full Drive access.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Google's authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google's token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Redirect used when the credentials file lists none.
const FALLBACK_REDIRECT_URI: &str = "http://localhost";

/// Installed-application OAuth client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledCredentials {
    /// The OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret from Google Cloud Console.
    pub client_secret: String,
    /// The redirect URI registered for this client (first of `redirect_uris`).
    pub redirect_uri: String,
}

impl InstalledCredentials {
    /// Creates new installed-app credentials.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Checks that every field is present.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        if self.redirect_uri.is_empty() {
            return Err("redirect_uri is required");
        }
        Ok(())
    }
}

/// Service-account key, as downloaded from Google Cloud Console.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceAccountKey {
    /// The service account's email, used as the JWT issuer.
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    /// Key identifier, sent as the JWT `kid` header when present.
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// Token endpoint override; Google's endpoint is used when absent.
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Creates a key from its two required parts.
    pub fn new(client_email: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            client_email: client_email.into(),
            private_key: private_key.into(),
            private_key_id: None,
            token_uri: None,
        }
    }

    /// Checks that every required field is present.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_email.is_empty() {
            return Err("client_email is required");
        }
        if !self.private_key.contains("PRIVATE KEY") {
            return Err("private_key must be a PEM-encoded key");
        }
        Ok(())
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Credentials loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// An installed-app client that authorizes on behalf of a user.
    Installed(InstalledCredentials),
    /// A service account that authorizes with signed JWT assertions.
    ServiceAccount(ServiceAccountKey),
}

/// Structure of Google's credentials JSON files.
///
/// Covers both shapes:
/// 1. `{"installed"|"web": {client_id, client_secret, redirect_uris}}`
/// 2. `{"type": "service_account", client_email, private_key, ...}`
///
/// A flat `{client_id, client_secret}` form (as written by gcloud) is also
/// accepted.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
    client_email: Option<String>,
    private_key: Option<String>,
    private_key_id: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

fn first_redirect(uris: Vec<String>) -> String {
    uris.into_iter()
        .next()
        .unwrap_or_else(|| FALLBACK_REDIRECT_URI.to_string())
}

impl Credentials {
    /// Loads credentials from a Google Cloud Console JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> GoogleResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GoogleError::configuration(format!(
                "failed to read credentials file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses credentials from either supported JSON shape.
    pub fn from_json(json: &str) -> GoogleResult<Self> {
        let file: CredentialsFile = serde_json::from_str(json).map_err(|e| {
            GoogleError::configuration(format!("failed to parse credentials JSON: {}", e))
        })?;

        if let (Some(client_email), Some(private_key)) = (file.client_email, file.private_key) {
            return Ok(Self::ServiceAccount(ServiceAccountKey {
                client_email,
                private_key,
                private_key_id: file.private_key_id,
                token_uri: file.token_uri,
            }));
        }

        if let Some(nested) = file.installed.or(file.web) {
            return Ok(Self::Installed(InstalledCredentials::new(
                nested.client_id,
                nested.client_secret,
                first_redirect(nested.redirect_uris),
            )));
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::Installed(InstalledCredentials::new(
                client_id,
                client_secret,
                first_redirect(file.redirect_uris),
            )));
        }

        Err(GoogleError::configuration(
            "credentials file must contain an 'installed'/'web' section, \
             'client_id'/'client_secret', or 'client_email'/'private_key'",
        ))
    }

    /// Validates whichever shape was loaded.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            Self::Installed(creds) => creds.validate(),
            Self::ServiceAccount(key) => key.validate(),
        }
    }

    /// Returns a short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Installed(_) => "installed",
            Self::ServiceAccount(_) => "service_account",
        }
    }
}

/// Settings shared by every authorization strategy.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth scopes to request.
    ///
    /// Defaults to read-only Gmail plus full Drive.
    pub scopes: Vec<String>,

    /// Path of the persisted token record.
    ///
    /// Defaults to `~/.local/share/gsandbox/gmail-token.json`.
    pub token_path: PathBuf,

    /// Request timeout for token-endpoint calls.
    pub timeout: Duration,

    /// User agent string for token-endpoint calls.
    pub user_agent: String,

    /// Authorization endpoint for the interactive grant.
    pub auth_url: String,

    /// Token endpoint for refresh and code exchange.
    pub token_url: String,
}

impl AuthConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a configuration with default scopes, paths and endpoints.
    pub fn new() -> Self {
        Self {
            scopes: Self::default_scopes(),
            token_path: Self::default_token_path(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("gsandbox/{}", env!("CARGO_PKG_VERSION")),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// The scopes requested when none are configured.
    pub fn default_scopes() -> Vec<String> {
        vec![GMAIL_READONLY_SCOPE.to_string(), DRIVE_SCOPE.to_string()]
    }

    /// Returns the default token storage path.
    pub fn default_token_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gsandbox")
            .join("gmail-token.json")
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the token storage path.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the authorization endpoint.
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    /// Sets the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> GoogleResult<()> {
        if self.scopes.is_empty() {
            return Err(GoogleError::configuration(
                "at least one OAuth scope is required",
            ));
        }
        if self.scopes.iter().any(|s| s.trim().is_empty()) {
            return Err(GoogleError::configuration("OAuth scopes must not be blank"));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}
