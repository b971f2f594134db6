//! Gmail and Drive API surfaces.
//!
//! [`MailApi`] and [`DriveApi`] are the seams between the listing code and
//! the HTTP session, so listing can run against in-memory fakes in tests.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::GoogleResult;

/// A boxed future for async trait methods.
///
/// Keeps [`MailApi`] and [`DriveApi`] object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Field selector used when a file listing does not ask for one.
pub const DEFAULT_FILE_FIELDS: &str = "nextPageToken, files(id, name, parents, mimeType, modifiedTime)";

/// Page size for Drive listings.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Gmail message listing.
pub trait MailApi: Send + Sync {
    /// Lists messages matching `request`.
    fn list_messages<'a>(
        &'a self,
        request: &'a MessageListRequest,
    ) -> BoxFuture<'a, GoogleResult<MessageList>>;

    /// Fetches the thread `id` owned by `user_id`.
    fn get_thread<'a>(&'a self, user_id: &'a str, id: &'a str)
    -> BoxFuture<'a, GoogleResult<Thread>>;
}

/// Drive file listing.
pub trait DriveApi: Send + Sync {
    /// Lists one page of files matching `request`.
    fn list_files<'a>(&'a self, request: &'a FileListRequest)
    -> BoxFuture<'a, GoogleResult<FileList>>;
}

/// Parameters of a `users.messages.list` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageListRequest {
    pub user_id: String,
    pub q: String,
    pub page_token: Option<String>,
}

/// Response of `users.messages.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub result_size_estimate: Option<u64>,
}

/// A message id as returned by the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Response of `users.threads.get`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thread {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// A message inside a thread.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: Option<String>,
    /// Epoch millis, as Gmail sends it (a decimal string).
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

/// Top-level MIME part of a message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePart {
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl Message {
    /// Returns the first header called `name` (ASCII case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .as_ref()?
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Parameters of a `files.list` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListRequest {
    /// Drive search query, e.g. `'<id>' in parents`.
    pub q: Option<String>,
    pub page_token: Option<String>,
    pub page_size: u32,
    pub fields: String,
}

impl Default for FileListRequest {
    fn default() -> Self {
        Self {
            q: None,
            page_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            fields: DEFAULT_FILE_FIELDS.to_string(),
        }
    }
}

/// Response of `files.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A Drive file or folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}
