//! Google credential lifecycle, Gmail/Drive sessions and listings.
//!
//! - [`AuthProvider`] - Turns credentials into an authorized [`Session`]
//! - [`TokenStore`] - Persists the OAuth token record
//! - [`MailApi`] / [`DriveApi`] - API surfaces implemented by [`Session`]
//! - [`read_mail`] / [`list_files`] - Listing built on those surfaces
//! - [`GoogleError`] - Error type for every operation
//!
//! # Flow
//!
//! ```text
//! Credentials ──► AuthProvider ──► Session ──► read_mail / list_files
//!                     │
//!           TokenStore (refresh, grant)
//!           ServiceAccountFlow (JWT)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use gsandbox_google::{AuthProvider, AuthStrategy, MailQuery, read_mail};
//!
//! let provider = AuthProvider::new(config, credentials, AuthStrategy::StoredToken, prompt)?;
//! let session = provider.ensure_authorized().await?;
//! let messages = read_mail(&session, &MailQuery::default(), &tz).await?;
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod listing;
pub mod oauth;
pub mod service_account;
pub mod session;
pub mod tokens;

pub use api::{
    BoxFuture, DriveApi, DriveFile, FOLDER_MIME_TYPE, FileList, FileListRequest, MailApi,
    MessageList, MessageListRequest, Thread,
};
pub use auth::{AuthPath, AuthProvider, AuthStrategy, CodePrompt};
pub use config::{
    AuthConfig, Credentials, DRIVE_SCOPE, GMAIL_READONLY_SCOPE, InstalledCredentials,
    ServiceAccountKey,
};
pub use error::{GoogleError, GoogleErrorCode, GoogleResult};
pub use listing::{
    FilePage, FileQuery, MailQuery, MessageSummary, collect_all_files, list_files, read_mail,
};
pub use oauth::{OAuthClient, PkceFlow};
pub use service_account::ServiceAccountFlow;
pub use session::Session;
pub use tokens::{Expiry, TokenRecord, TokenStore};
