//! OAuth 2.0 installed-app flow for Google APIs.
//!
//! Implements the two token-endpoint calls the credential lifecycle needs:
//!
//! 1. Authorization-code exchange, after the user visits the consent URL and
//!    pastes back the code shown by Google
//! 2. Refresh-token grant, to renew a stored token without user interaction
//!
//! The consent URL carries a PKCE challenge (RFC 7636); the matching verifier
//! is sent with the code exchange.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use gsandbox_core::now_millis;

use crate::config::{AuthConfig, InstalledCredentials};
use crate::error::{GoogleError, GoogleResult};
use crate::tokens::{TokenRecord, TokenResponse};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Builds the shared HTTP client used for token-endpoint calls.
pub(crate) fn http_client(timeout: Duration, user_agent: &str) -> GoogleResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| {
            GoogleError::configuration(format!("failed to create HTTP client: {}", e))
                .with_source(e)
        })
}

/// Posts a form to the token endpoint and decodes the token response.
///
/// Any non-success status is reported as `AuthDenied`; transport failures as
/// `RemoteError`.
pub(crate) async fn post_token_form(
    http: &reqwest::Client,
    token_url: &str,
    params: &[(&str, &str)],
    what: &str,
) -> GoogleResult<TokenResponse> {
    let response = http
        .post(token_url)
        .form(params)
        .send()
        .await
        .map_err(|e| GoogleError::remote(None, format!("{} request failed: {}", what, e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GoogleError::remote(None, format!("failed to read response: {}", e)))?;

    if !status.is_success() {
        return Err(GoogleError::auth_denied(format!(
            "{} failed ({}): {}",
            what, status, body
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| GoogleError::invalid_response(format!("invalid token response: {}", e)))
}

/// OAuth client for an installed application.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: InstalledCredentials,
    auth_url: String,
    token_url: String,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Creates a new OAuth client with the given credentials.
    pub fn new(credentials: InstalledCredentials, config: &AuthConfig) -> GoogleResult<Self> {
        Ok(Self {
            credentials,
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            http_client: http_client(config.timeout, &config.user_agent)?,
        })
    }

    /// Builds the consent URL for `scopes` using the given PKCE challenge.
    pub fn authorization_url(&self, pkce: &PkceFlow, scopes: &[String]) -> String {
        pkce.build_auth_url(
            &self.auth_url,
            &self.credentials.client_id,
            &self.credentials.redirect_uri,
            scopes,
        )
    }

    /// Exchanges an authorization code for a new token record.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce: &PkceFlow,
        scopes: &[String],
    ) -> GoogleResult<TokenRecord> {
        let code = code.trim();
        if code.is_empty() {
            return Err(GoogleError::auth_denied("empty authorization code"));
        }

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", pkce.verifier.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
        ];

        let response =
            post_token_form(&self.http_client, &self.token_url, &params, "token exchange").await?;

        info!("successfully obtained tokens");
        Ok(TokenRecord::from_response(response, scopes, now_millis()))
    }

    /// Renews `token` with its refresh token.
    ///
    /// Returns a replacement record; the refresh token is carried over when
    /// Google does not send a new one.
    pub async fn refresh(&self, token: &TokenRecord) -> GoogleResult<TokenRecord> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GoogleError::auth_denied("token record has no refresh token"))?;

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        debug!("requesting access token refresh");
        let response =
            post_token_form(&self.http_client, &self.token_url, &params, "token refresh").await?;

        info!("successfully refreshed access token");
        Ok(TokenRecord::from_response(response, &token.scope, now_millis())
            .inherit_refresh_token(token))
    }
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with a random verifier.
    ///
    /// No `state` parameter is generated: the code is pasted back by the
    /// user, so there is no redirect to check it against.
    pub fn new() -> Self {
        let verifier = random_urlsafe(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// Computes the SHA-256 challenge for a code verifier.
    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Builds the Google consent URL.
    pub fn build_auth_url(
        &self,
        auth_url: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&\
            access_type=offline&prompt=consent",
            auth_url,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_urlsafe(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}
