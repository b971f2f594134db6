//! Token records and their on-disk store.
//!
//! The JSON layout matches what Google's client libraries write
//! (`access_token`, `refresh_token`, `scope`, `token_type`, `expiry_date`),
//! so a token file can be shared with them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GoogleError, GoogleResult};

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Persisted OAuth credential state.
///
/// A record is never edited in place: refreshes and grants produce a new
/// record that replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// The bearer token sent with API requests.
    pub access_token: String,

    /// Long-lived token used to mint new access tokens. Absent for
    /// service-account tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Granted scopes. Written as a space-delimited string.
    #[serde(default, with = "scope_list")]
    pub scope: Vec<String>,

    /// Usually `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Access-token expiry as epoch milliseconds, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,

    /// Fields written by other clients (e.g. `id_token`), kept on round trip.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// How a token's expiry relates to a point in time.
///
/// Informational only: refresh is attempted regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The access token is still valid for `remaining`.
    Valid { remaining: Duration },
    /// The access token expired `elapsed` ago.
    Expired { elapsed: Duration },
    /// The record carries no expiry.
    Unknown,
}

impl TokenRecord {
    /// Creates a record from its core fields.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        scope: Vec<String>,
        expiry_date: Option<i64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            scope,
            token_type: default_token_type(),
            expiry_date,
            extra: BTreeMap::new(),
        }
    }

    /// Builds a record from a token-endpoint response received at `now_millis`.
    ///
    /// When the response does not list granted scopes, `requested` is recorded.
    pub(crate) fn from_response(
        response: TokenResponse,
        requested: &[String],
        now_millis: i64,
    ) -> Self {
        let scope = match response.scope {
            Some(ref s) => split_scopes(s),
            None => requested.to_vec(),
        };

        let mut extra = BTreeMap::new();
        if let Some(id_token) = response.id_token {
            extra.insert("id_token".to_string(), serde_json::Value::String(id_token));
        }

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            scope,
            token_type: response.token_type.unwrap_or_else(default_token_type),
            expiry_date: response
                .expires_in
                .map(|secs| now_millis.saturating_add(secs.saturating_mul(1000))),
            extra,
        }
    }

    /// Carries the previous refresh token forward when this record lacks one.
    ///
    /// Google only returns a refresh token on the first grant.
    pub fn inherit_refresh_token(mut self, previous: &TokenRecord) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.refresh_token.clone();
        }
        self
    }

    /// Returns true if the record can be refreshed without user interaction.
    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Compares the recorded expiry against `now_millis`.
    pub fn expiry_at(&self, now_millis: i64) -> Expiry {
        match self.expiry_date {
            None => Expiry::Unknown,
            Some(expiry) if expiry > now_millis => Expiry::Valid {
                remaining: Duration::milliseconds(expiry - now_millis),
            },
            Some(expiry) => Expiry::Expired {
                elapsed: Duration::milliseconds(now_millis - expiry),
            },
        }
    }
}

/// Response body of Google's token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

fn split_scopes(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

mod scope_list {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scopes {
        Joined(String),
        List(Vec<String>),
    }

    pub fn serialize<S: Serializer>(scopes: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&scopes.join(" "))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Scopes::deserialize(deserializer)? {
            Scopes::Joined(s) => super::split_scopes(&s),
            Scopes::List(list) => list,
        })
    }
}

/// File-backed store for a single token record.
///
/// The store is the only component that touches the token file. It is
/// single-writer: one invocation runs at a time, so no locking is done.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a store for the given path. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored token record.
    ///
    /// A missing file is reported as `NotFound`, meaning "no prior grant".
    pub fn load(&self) -> GoogleResult<TokenRecord> {
        if !self.path.exists() {
            debug!("no token file at {:?}", self.path);
            return Err(GoogleError::not_found(format!(
                "no token file at {}",
                self.path.display()
            )));
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            GoogleError::io(format!("failed to read token file: {}", e)).with_source(e)
        })?;

        let token: TokenRecord = serde_json::from_str(&content).map_err(|e| {
            GoogleError::invalid_response(format!("failed to parse token file: {}", e))
        })?;

        info!("loaded token from {:?}", self.path);
        Ok(token)
    }

    /// Writes the token record, replacing any previous one.
    pub fn save(&self, token: &TokenRecord) -> GoogleResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                GoogleError::io(format!("failed to create token directory: {}", e)).with_source(e)
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(token).map_err(|e| {
            GoogleError::invalid_response(format!("failed to serialize token: {}", e))
        })?;

        fs::write(&temp_path, &content).map_err(|e| {
            GoogleError::io(format!("failed to write token file: {}", e)).with_source(e)
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            GoogleError::io(format!("failed to rename token file: {}", e)).with_source(e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }

        debug!("token stored to {:?}", self.path);
        Ok(())
    }

    /// Removes the stored token, if any.
    pub fn clear(&self) -> GoogleResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                GoogleError::io(format!("failed to remove token file: {}", e)).with_source(e)
            })?;
            info!("cleared token at {:?}", self.path);
        }
        Ok(())
    }
}
