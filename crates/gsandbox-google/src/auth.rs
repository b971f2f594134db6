//! Authorization policy: turns credentials into a live [`Session`].
//!
//! Installed-app credentials follow the stored-token path first:
//!
//! 1. Load the stored token record (a missing file means "no prior grant")
//! 2. Refresh it exactly once; on success persist and authorize
//! 3. On any refresh failure, run the interactive grant exactly once
//!
//! Service-account credentials sign a JWT assertion instead and never touch
//! the token file.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use gsandbox_core::now_millis;

use crate::api::BoxFuture;
use crate::config::{AuthConfig, Credentials, InstalledCredentials, ServiceAccountKey};
use crate::error::{GoogleError, GoogleErrorCode, GoogleResult};
use crate::oauth::{OAuthClient, PkceFlow};
use crate::service_account::ServiceAccountFlow;
use crate::session::Session;
use crate::tokens::{Expiry, TokenStore};

/// Supplies the authorization code for an interactive grant.
///
/// Implementations show `auth_url` to the user and return the code Google
/// displays after consent.
pub trait CodePrompt: Send + Sync {
    fn request_code<'a>(&'a self, auth_url: &'a str) -> BoxFuture<'a, GoogleResult<String>>;
}

/// How credentials are turned into a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthStrategy {
    /// Refresh the stored token, falling back to an interactive grant.
    #[default]
    StoredToken,
    /// Always run the interactive grant.
    Interactive,
    /// Sign a JWT assertion with a service-account key.
    ServiceAccount,
}

impl AuthStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StoredToken => "stored-token",
            Self::Interactive => "interactive",
            Self::ServiceAccount => "service-account",
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthStrategy {
    type Err = GoogleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stored-token" => Ok(Self::StoredToken),
            "interactive" => Ok(Self::Interactive),
            "service-account" => Ok(Self::ServiceAccount),
            other => Err(GoogleError::configuration(format!(
                "unknown auth strategy '{}' (expected stored-token, interactive or service-account)",
                other
            ))),
        }
    }
}

/// The path that produced a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPath {
    /// A stored token was refreshed.
    Refreshed,
    /// The user completed an interactive grant.
    Granted,
    /// A service-account assertion was exchanged.
    ServiceAccount,
}

/// Builds authorized sessions from credentials and the token store.
pub struct AuthProvider {
    config: AuthConfig,
    credentials: Credentials,
    strategy: AuthStrategy,
    store: TokenStore,
    prompt: Arc<dyn CodePrompt>,
}

impl fmt::Debug for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthProvider")
            .field("credentials", &self.credentials.kind())
            .field("strategy", &self.strategy)
            .field("token_path", &self.store.path())
            .finish()
    }
}

impl AuthProvider {
    /// Creates a provider.
    ///
    /// Fails with a configuration error when the settings are invalid or the
    /// strategy does not fit the credential shape.
    pub fn new(
        config: AuthConfig,
        credentials: Credentials,
        strategy: AuthStrategy,
        prompt: Arc<dyn CodePrompt>,
    ) -> GoogleResult<Self> {
        config.validate()?;
        credentials
            .validate()
            .map_err(|e| GoogleError::configuration(format!("invalid credentials: {}", e)))?;

        let fits = matches!(
            (strategy, &credentials),
            (AuthStrategy::ServiceAccount, Credentials::ServiceAccount(_))
                | (
                    AuthStrategy::StoredToken | AuthStrategy::Interactive,
                    Credentials::Installed(_)
                )
        );
        if !fits {
            return Err(GoogleError::configuration(format!(
                "auth strategy '{}' cannot be used with {} credentials",
                strategy,
                credentials.kind()
            )));
        }

        let store = TokenStore::new(&config.token_path);
        Ok(Self {
            config,
            credentials,
            strategy,
            store,
            prompt,
        })
    }

    /// Returns a session bound to a freshly obtained token.
    ///
    /// Every call goes through the policy again; sessions are never reused.
    pub async fn ensure_authorized(&self) -> GoogleResult<Session> {
        match &self.credentials {
            Credentials::ServiceAccount(key) => self.authorize_service_account(key).await,
            Credentials::Installed(credentials) => {
                let client = OAuthClient::new(credentials.clone(), &self.config)?;
                if self.strategy == AuthStrategy::StoredToken
                    && let Some(session) = self.try_refresh(&client).await?
                {
                    return Ok(session);
                }
                self.grant(&client, credentials).await
            }
        }
    }

    /// Refreshes the stored token once.
    ///
    /// Returns `Ok(None)` when the caller should fall through to a grant.
    async fn try_refresh(&self, client: &OAuthClient) -> GoogleResult<Option<Session>> {
        let stored = match self.store.load() {
            Ok(token) => token,
            Err(e) if e.code() == GoogleErrorCode::NotFound => {
                debug!(path = %self.store.path().display(), "no stored token");
                return Ok(None);
            }
            Err(e) if e.code() == GoogleErrorCode::InvalidResponse => {
                warn!(error = %e, "stored token is unreadable, starting a new grant");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match stored.expiry_at(now_millis()) {
            Expiry::Valid { remaining } => {
                debug!(remaining_secs = remaining.num_seconds(), "stored token still valid")
            }
            Expiry::Expired { elapsed } => {
                debug!(elapsed_secs = elapsed.num_seconds(), "stored token expired")
            }
            Expiry::Unknown => debug!("stored token has no expiry"),
        }

        if !stored.is_refreshable() {
            warn!("stored token has no refresh token, starting a new grant");
            return Ok(None);
        }

        debug!("refreshing stored token");
        match client.refresh(&stored).await {
            Ok(token) => {
                self.store.save(&token)?;
                info!("authorized with refreshed token");
                Ok(Some(Session::new(&token, AuthPath::Refreshed, &self.config)?))
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, starting a new grant");
                Ok(None)
            }
        }
    }

    /// Runs the interactive grant once.
    async fn grant(
        &self,
        client: &OAuthClient,
        credentials: &InstalledCredentials,
    ) -> GoogleResult<Session> {
        let pkce = PkceFlow::new();
        let auth_url = client.authorization_url(&pkce, &self.config.scopes);

        debug!(client_id = %credentials.client_id, "awaiting authorization code");
        let code = self.prompt.request_code(&auth_url).await.map_err(denied)?;

        let token = client
            .exchange_code(&code, &pkce, &self.config.scopes)
            .await
            .map_err(denied)?;

        self.store.save(&token)?;
        info!(path = %self.store.path().display(), "authorized with new grant");
        Session::new(&token, AuthPath::Granted, &self.config)
    }

    async fn authorize_service_account(&self, key: &ServiceAccountKey) -> GoogleResult<Session> {
        let flow = ServiceAccountFlow::new(key.clone(), &self.config)?;
        let token = flow.authorize(&self.config.scopes).await.map_err(denied)?;
        Session::new(&token, AuthPath::ServiceAccount, &self.config)
    }
}

/// Reports any grant failure as `AuthDenied`, keeping configuration errors.
fn denied(error: GoogleError) -> GoogleError {
    match error.code() {
        GoogleErrorCode::AuthDenied | GoogleErrorCode::Configuration => error,
        _ => GoogleError::auth_denied(format!("authorization failed: {}", error.message()))
            .with_source(error),
    }
}
