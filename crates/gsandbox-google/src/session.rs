//! Authorized HTTP session for the Gmail and Drive REST APIs.

use std::fmt;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{
    BoxFuture, DriveApi, FileList, FileListRequest, MailApi, MessageList, MessageListRequest,
    Thread,
};
use crate::auth::AuthPath;
use crate::config::AuthConfig;
use crate::error::{GoogleError, GoogleResult};
use crate::oauth::http_client;
use crate::tokens::TokenRecord;

/// Gmail API base URL.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users";

/// Drive API base URL.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// An access token bound to the record it came from.
#[derive(Clone)]
struct AuthHandle {
    access_token: String,
    expiry_date: Option<i64>,
}

impl fmt::Debug for AuthHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHandle")
            .field("access_token", &"<redacted>")
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

/// Google error envelope: `{"error": {"code": 403, "message": "..."}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Callable Gmail/Drive endpoints for one authorized token.
///
/// A session is built by [`AuthProvider::ensure_authorized`] and never
/// outlives the token record it was built from.
///
/// [`AuthProvider::ensure_authorized`]: crate::auth::AuthProvider::ensure_authorized
#[derive(Debug)]
pub struct Session {
    handle: AuthHandle,
    path: AuthPath,
    gmail_base: String,
    drive_base: String,
    http_client: reqwest::Client,
}

impl Session {
    /// Creates a session for `token`, obtained through `path`.
    pub fn new(token: &TokenRecord, path: AuthPath, config: &AuthConfig) -> GoogleResult<Self> {
        Ok(Self {
            handle: AuthHandle {
                access_token: token.access_token.clone(),
                expiry_date: token.expiry_date,
            },
            path,
            gmail_base: GMAIL_API_BASE.to_string(),
            drive_base: DRIVE_API_BASE.to_string(),
            http_client: http_client(config.timeout, &config.user_agent)?,
        })
    }

    /// Points Gmail calls at `base` instead of Google.
    pub fn with_gmail_base(mut self, base: impl Into<String>) -> Self {
        self.gmail_base = base.into();
        self
    }

    /// Points Drive calls at `base` instead of Google.
    pub fn with_drive_base(mut self, base: impl Into<String>) -> Self {
        self.drive_base = base.into();
        self
    }

    /// How the underlying token was obtained.
    pub fn auth_path(&self) -> AuthPath {
        self.path
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> GoogleResult<T> {
        debug!(url, "GET");
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.handle.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GoogleError::remote(None, "request timeout")
                } else if e.is_connect() {
                    GoogleError::remote(None, format!("connection failed: {}", e))
                } else {
                    GoogleError::remote(None, format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GoogleError::remote(None, format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(GoogleError::remote(
                Some(status.as_u16()),
                error_message(&body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            GoogleError::invalid_response(format!("failed to parse response: {}", e))
        })
    }
}

/// Extracts Google's error message from a failure body, or returns the body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

impl MailApi for Session {
    fn list_messages<'a>(
        &'a self,
        request: &'a MessageListRequest,
    ) -> BoxFuture<'a, GoogleResult<MessageList>> {
        Box::pin(async move {
            let url = format!(
                "{}/{}/messages",
                self.gmail_base,
                urlencoding::encode(&request.user_id)
            );
            let mut query = vec![("q", request.q.as_str())];
            if let Some(token) = request.page_token.as_deref() {
                query.push(("pageToken", token));
            }
            self.get_json(&url, &query).await
        })
    }

    fn get_thread<'a>(
        &'a self,
        user_id: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, GoogleResult<Thread>> {
        Box::pin(async move {
            let url = format!(
                "{}/{}/threads/{}",
                self.gmail_base,
                urlencoding::encode(user_id),
                urlencoding::encode(id)
            );
            self.get_json(&url, &[]).await
        })
    }
}

impl DriveApi for Session {
    fn list_files<'a>(
        &'a self,
        request: &'a FileListRequest,
    ) -> BoxFuture<'a, GoogleResult<FileList>> {
        Box::pin(async move {
            let url = format!("{}/files", self.drive_base);
            let page_size = request.page_size.to_string();
            let mut query = vec![
                ("spaces", "drive"),
                ("pageSize", page_size.as_str()),
                ("fields", request.fields.as_str()),
            ];
            if let Some(q) = request.q.as_deref() {
                query.push(("q", q));
            }
            if let Some(token) = request.page_token.as_deref() {
                query.push(("pageToken", token));
            }
            self.get_json(&url, &query).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GoogleErrorCode;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session_for(server: &MockServer) -> Session {
        let token = TokenRecord::new("ya29.token", None, vec![], None);
        Session::new(&token, AuthPath::Refreshed, &AuthConfig::new())
            .unwrap()
            .with_gmail_base(format!("{}/gmail/v1/users", server.uri()))
            .with_drive_base(format!("{}/drive/v3", server.uri()))
    }

    #[tokio::test]
    async fn list_messages_sends_query_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("q", "label:inbox"))
            .and(header("authorization", "Bearer ya29.token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{"id": "m1", "threadId": "t1"}],
                "resultSizeEstimate": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = MessageListRequest {
            user_id: "me".to_string(),
            q: "label:inbox".to_string(),
            page_token: None,
        };
        let list = session_for(&server).list_messages(&request).await.unwrap();
        assert_eq!(list.messages.len(), 1);
        assert_eq!(list.messages[0].id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn get_thread_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/threads/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m1",
                "messages": [{"id": "m1", "snippet": "hi"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let thread = session_for(&server).get_thread("me", "m1").await.unwrap();
        assert_eq!(thread.messages[0].snippet.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn list_files_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("spaces", "drive"))
            .and(query_param("pageSize", "100"))
            .and(query_param("q", "'folder-1' in parents"))
            .and(query_param("pageToken", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{"id": "f1", "name": "a.txt", "mimeType": "text/plain"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = FileListRequest {
            q: Some("'folder-1' in parents".to_string()),
            page_token: Some("next".to_string()),
            ..FileListRequest::default()
        };
        let list = session_for(&server).list_files(&request).await.unwrap();
        assert_eq!(list.files[0].name, "a.txt");
        assert_eq!(list.next_page_token, None);
    }

    #[tokio::test]
    async fn api_error_carries_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": 403,
                    "message": "Insufficient Permission",
                    "errors": [{"reason": "insufficientPermissions"}]
                }
            })))
            .mount(&server)
            .await;

        let err = session_for(&server)
            .list_files(&FileListRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), GoogleErrorCode::RemoteError);
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.message(), "Insufficient Permission");
    }

    #[tokio::test]
    async fn unparseable_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/threads/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = session_for(&server).get_thread("me", "x").await.unwrap_err();
        assert_eq!(err.code(), GoogleErrorCode::InvalidResponse);
    }

    #[test]
    fn error_message_falls_back_to_body() {
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message(""), "empty response body");
        assert_eq!(
            error_message(r#"{"error": {"code": 404, "message": "File not found: x."}}"#),
            "File not found: x."
        );
    }

    #[test]
    fn debug_redacts_access_token() {
        let token = TokenRecord::new("ya29.secret", None, vec![], Some(5));
        let session = Session::new(&token, AuthPath::Granted, &AuthConfig::new()).unwrap();
        let debug = format!("{:?}", session);
        assert!(!debug.contains("ya29.secret"));
        assert_eq!(session.auth_path(), AuthPath::Granted);
        assert!(debug.contains("expiry_date: Some(5)"));
    }
}
