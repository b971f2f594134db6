//! Mail and Drive listings built on [`MailApi`] and [`DriveApi`].

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use gsandbox_core::{Tz, format_header_date};

use crate::api::{DriveApi, DriveFile, FileListRequest, MailApi, MessageListRequest};
use crate::error::GoogleResult;

/// Gmail query used when none is given.
pub const DEFAULT_MAIL_QUERY: &str = "label:inbox";

/// Gmail user used when none is given.
pub const DEFAULT_USER_ID: &str = "me";

/// Parameters of a mail listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailQuery {
    #[serde(default, deserialize_with = "lenient_string")]
    pub q: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub page_token: Option<String>,
}

impl MailQuery {
    fn to_request(&self) -> MessageListRequest {
        let or_default = |value: &Option<String>, default: &str| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        MessageListRequest {
            user_id: or_default(&self.user_id, DEFAULT_USER_ID),
            q: or_default(&self.q, DEFAULT_MAIL_QUERY),
            page_token: self.page_token.clone().filter(|t| !t.is_empty()),
        }
    }
}

/// Headers and metadata of the first message of a thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "internalDate")]
    pub internal_date: String,
    pub snippet: String,
}

/// Lists messages matching `query` and summarizes each one's thread.
///
/// Threads are fetched one at a time in listing order. Entries without an id
/// and threads without messages are skipped; any fetch failure aborts the
/// whole listing.
pub async fn read_mail(
    api: &dyn MailApi,
    query: &MailQuery,
    tz: &Tz,
) -> GoogleResult<Vec<MessageSummary>> {
    let request = query.to_request();
    debug!(q = %request.q, user = %request.user_id, "listing messages");
    let list = api.list_messages(&request).await?;
    debug!(
        listed = list.messages.len(),
        estimate = ?list.result_size_estimate,
        "listed messages"
    );

    let mut summaries = Vec::with_capacity(list.messages.len());
    for entry in &list.messages {
        let Some(id) = entry.id.as_deref() else {
            debug!("skipping message without id");
            continue;
        };

        let thread = api.get_thread(&request.user_id, id).await?;
        let Some(message) = thread.messages.first() else {
            debug!(id, "skipping empty thread");
            continue;
        };

        let header = |name: &str| message.header(name).unwrap_or_default().to_string();
        summaries.push(MessageSummary {
            subject: header("Subject"),
            to: header("To"),
            from: header("From"),
            date: message
                .header("Date")
                .map(|d| format_header_date(d, tz))
                .unwrap_or_default(),
            internal_date: message.internal_date.clone().unwrap_or_default(),
            snippet: message
                .snippet
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_string(),
        });
    }

    info!(count = summaries.len(), "read messages");
    Ok(summaries)
}

/// Parameters of a file listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileQuery {
    #[serde(default, deserialize_with = "lenient_string")]
    pub parent_folder: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub page_token: Option<String>,
    /// Unset means recursive.
    #[serde(default)]
    pub recursive: Option<bool>,
    /// Path whose last segment names the folder to descend into.
    #[serde(default, deserialize_with = "lenient_string")]
    pub g_drive_prefix: Option<String>,
    #[serde(default)]
    pub list_folders: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fields: Option<String>,
    /// Follow `nextPageToken` and return every page at once.
    #[serde(default)]
    pub all_pages: Option<bool>,
}

/// Reads an optional string parameter that may have been typed as a number
/// or boolean on the command line (`--q=2024`).
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Flag(bool),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
        Raw::Flag(flag) => flag.to_string(),
    }))
}

/// One page of a file listing.
///
/// Without a prefix the page carries `files`; with a prefix it carries the
/// `folders` found instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    pub parent_folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<DriveFile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folders: Option<Vec<DriveFile>>,
}

/// Lists one page of files under the query's folder or `root_folder`.
///
/// When `gDrivePrefix` names a folder found on the page (and `listFolders`
/// is not set), that folder is listed instead with a non-recursive request.
pub async fn list_files(
    api: &dyn DriveApi,
    query: &FileQuery,
    root_folder: Option<&str>,
) -> GoogleResult<FilePage> {
    let folder = query
        .parent_folder
        .as_deref()
        .or(root_folder)
        .filter(|f| !f.is_empty());
    let recursive = query.recursive.unwrap_or(true);

    let mut request = FileListRequest {
        page_token: query.page_token.clone().filter(|t| !t.is_empty()),
        ..FileListRequest::default()
    };
    if let Some(fields) = query.fields.as_deref() {
        request.fields = fields.to_string();
    }
    if !recursive && let Some(folder) = folder {
        request.q = Some(parents_query(folder));
    }

    let list = api.list_files(&request).await?;
    debug!(count = list.files.len(), folder = ?folder, "listed files");

    let parent_folder = folder.map(str::to_string);
    let Some(prefix) = query.g_drive_prefix.as_deref().filter(|p| !p.is_empty()) else {
        return Ok(FilePage {
            parent_folder,
            next_page_token: list.next_page_token,
            files: Some(list.files),
            folders: None,
        });
    };

    let folders: Vec<DriveFile> = list.files.into_iter().filter(DriveFile::is_folder).collect();
    let target = last_segment(prefix);

    if !query.list_folders.unwrap_or(false)
        && let Some(found) = folders.iter().find(|f| f.name == target)
    {
        info!(name = %found.name, id = %found.id, "descending into prefix folder");
        let nested = FileQuery {
            parent_folder: Some(found.id.clone()),
            recursive: Some(false),
            ..FileQuery::default()
        };
        return Box::pin(list_files(api, &nested, root_folder)).await;
    }

    Ok(FilePage {
        parent_folder,
        next_page_token: list.next_page_token,
        files: None,
        folders: Some(folders),
    })
}

/// Follows `nextPageToken` until the listing is exhausted.
///
/// The pages are merged into one page without a `nextPageToken`. Once a
/// prefix resolves to a folder only that folder's files are kept; folders
/// seen on earlier root pages are dropped.
pub async fn collect_all_files(
    api: &dyn DriveApi,
    query: &FileQuery,
    root_folder: Option<&str>,
) -> GoogleResult<FilePage> {
    let mut query = query.clone();
    let mut merged = FilePage::default();
    let mut pages = 0;

    loop {
        let page = list_files(api, &query, root_folder).await?;
        pages += 1;
        if query.g_drive_prefix.is_some() && page.files.is_some() {
            debug!(folder = ?page.parent_folder, "prefix resolved, paging its folder");
            merged.folders = None;
            query = FileQuery {
                parent_folder: page.parent_folder.clone(),
                recursive: Some(false),
                ..FileQuery::default()
            };
        }

        merged.parent_folder = page.parent_folder;
        if let Some(files) = page.files {
            merged.files.get_or_insert_with(Vec::new).extend(files);
        }
        if let Some(folders) = page.folders {
            merged.folders.get_or_insert_with(Vec::new).extend(folders);
        }

        match page.next_page_token {
            Some(token) => query.page_token = Some(token),
            None => break,
        }
    }

    info!(pages, "collected all pages");
    Ok(merged)
}

fn parents_query(folder: &str) -> String {
    format!("'{}' in parents", folder.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn last_segment(prefix: &str) -> &str {
    prefix.rsplit(['/', '\\']).next().unwrap_or(prefix)
}
