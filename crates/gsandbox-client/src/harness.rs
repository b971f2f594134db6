//! Invocation harness: resolves an operation by name, authorizes, runs it and
//! reports the outcome.
//!
//! Without `--inputFunction` the built-in example table runs instead; every
//! enabled entry runs in order and the last status wins.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use gsandbox_core::Tz;
use gsandbox_google::{
    AuthProvider, AuthStrategy, BoxFuture, CodePrompt, Credentials, DriveApi, FilePage, FileQuery,
    GoogleResult, MailApi, MailQuery, MessageSummary, collect_all_files, list_files, read_mail,
};

use crate::config::Settings;
use crate::error::{ClientError, ClientResult};
use crate::params::Params;

/// Operations the harness can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ReadGmail,
    ListFiles,
}

impl Operation {
    pub const ALL: [Operation; 2] = [Operation::ReadGmail, Operation::ListFiles];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadGmail => "readGmail",
            Self::ListFiles => "listFiles",
        }
    }

    /// Looks up an operation by its exact name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Parameter names the operation understands.
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            Self::ReadGmail => &["q", "userId", "pageToken"],
            Self::ListFiles => &[
                "parentFolder",
                "pageToken",
                "recursive",
                "gDrivePrefix",
                "listFolders",
                "fields",
                "allPages",
            ],
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Usage listing printed for invalid invocations.
pub fn usage() -> String {
    let mut text = String::from("Example usage:\n");
    text.push_str("  gsandbox --inputFunction=readGmail --q=label:inbox\n");
    text.push_str("  gsandbox --inputFunction=listFiles --gDrivePrefix=a\n");
    text.push_str("\nList of functions:\n");
    for op in Operation::ALL {
        text.push_str(&format!(
            "  {:<10} [{}]\n",
            op.name(),
            op.param_names().join(", ")
        ));
    }
    text
}

/// An entry of the built-in example table.
#[derive(Debug, Clone)]
pub struct Example {
    pub name: String,
    pub enabled: bool,
    pub operation: Operation,
    pub params: Params,
}

/// The example table run when no operation is given.
pub fn example_table(drive_prefix: &str) -> Vec<Example> {
    let params = |value: Value| match value {
        Value::Object(map) => map,
        _ => Params::new(),
    };

    vec![
        Example {
            name: "Read Gmail".to_string(),
            enabled: true,
            operation: Operation::ReadGmail,
            params: params(serde_json::json!({"q": "label:inbox"})),
        },
        Example {
            name: format!("List Files in {}", drive_prefix),
            enabled: true,
            operation: Operation::ListFiles,
            params: params(serde_json::json!({
                "pageToken": null,
                "recursive": true,
                "gDrivePrefix": drive_prefix
            })),
        },
        Example {
            name: format!("List Folders in {}", drive_prefix),
            enabled: false,
            operation: Operation::ListFiles,
            params: params(serde_json::json!({
                "pageToken": null,
                "recursive": true,
                "gDrivePrefix": drive_prefix,
                "listFolders": true
            })),
        },
    ]
}

/// Supplies authorized API surfaces to the harness.
pub trait Backend: Send + Sync {
    fn mail(&self) -> BoxFuture<'_, GoogleResult<Box<dyn MailApi>>>;
    fn drive(&self) -> BoxFuture<'_, GoogleResult<Box<dyn DriveApi>>>;
}

/// Backend that authorizes against Google for every operation.
pub struct GoogleBackend {
    settings: Settings,
    prompt: Arc<dyn CodePrompt>,
}

impl GoogleBackend {
    pub fn new(settings: Settings, prompt: Arc<dyn CodePrompt>) -> Self {
        Self { settings, prompt }
    }

    fn provider(&self, strategy: AuthStrategy) -> GoogleResult<AuthProvider> {
        let path = match strategy {
            AuthStrategy::ServiceAccount => &self.settings.service_account_path,
            AuthStrategy::StoredToken | AuthStrategy::Interactive => {
                &self.settings.credentials_path
            }
        };
        debug!(path = %path.display(), %strategy, "loading credentials");
        let credentials = Credentials::from_file(path)?;
        AuthProvider::new(
            self.settings.auth_config(),
            credentials,
            strategy,
            self.prompt.clone(),
        )
    }
}

impl Backend for GoogleBackend {
    fn mail(&self) -> BoxFuture<'_, GoogleResult<Box<dyn MailApi>>> {
        Box::pin(async move {
            let provider = self.provider(self.settings.mail_strategy)?;
            let session = provider.ensure_authorized().await?;
            Ok(Box::new(session) as Box<dyn MailApi>)
        })
    }

    fn drive(&self) -> BoxFuture<'_, GoogleResult<Box<dyn DriveApi>>> {
        Box::pin(async move {
            let provider = self.provider(self.settings.drive_strategy)?;
            let session = provider.ensure_authorized().await?;
            Ok(Box::new(session) as Box<dyn DriveApi>)
        })
    }
}

/// Result of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Output {
    Messages(Vec<MessageSummary>),
    Files(FilePage),
}

/// Runs operations against a [`Backend`].
pub struct Harness<B> {
    backend: B,
    timezone: Tz,
    root_folder: Option<String>,
}

impl<B: Backend> Harness<B> {
    pub fn new(backend: B, timezone: Tz, root_folder: Option<String>) -> Self {
        Self {
            backend,
            timezone,
            root_folder,
        }
    }

    /// Runs the operation called `name` with `params`.
    ///
    /// Unknown names fail before any authorization is attempted.
    pub async fn invoke(&self, name: &str, params: &Params) -> ClientResult<Output> {
        let operation = Operation::from_name(name).ok_or_else(|| ClientError::InvalidOperation {
            name: name.to_string(),
            hint: usage(),
        })?;
        debug!(%operation, ?params, "invoking");

        let params = Value::Object(params.clone());
        match operation {
            Operation::ReadGmail => {
                let query: MailQuery = serde_json::from_value(params)
                    .map_err(|e| ClientError::InvalidParams(e.to_string()))?;
                let api = self.backend.mail().await?;
                let messages = read_mail(api.as_ref(), &query, &self.timezone).await?;
                Ok(Output::Messages(messages))
            }
            Operation::ListFiles => {
                let query: FileQuery = serde_json::from_value(params)
                    .map_err(|e| ClientError::InvalidParams(e.to_string()))?;
                let api = self.backend.drive().await?;
                let root_folder = self.root_folder.as_deref();
                let page = if query.all_pages.unwrap_or(false) {
                    collect_all_files(api.as_ref(), &query, root_folder).await?
                } else {
                    list_files(api.as_ref(), &query, root_folder).await?
                };
                Ok(Output::Files(page))
            }
        }
    }

    /// Invokes `name` and prints the results or error block.
    ///
    /// Returns the exit status: 0 on success, 1 on failure.
    pub async fn report(&self, name: &str, params: &Params) -> u8 {
        match self.invoke(name, params).await {
            Ok(output) => match render_results(&output) {
                Ok(block) => {
                    println!("{}", block);
                    0
                }
                Err(e) => {
                    eprintln!("{}", render_error(&e));
                    1
                }
            },
            Err(e) => {
                error!(operation = name, "{}", e);
                eprintln!("{}", render_error(&e));
                1
            }
        }
    }

    /// Runs `function`, or every enabled entry of `examples` when absent.
    pub async fn run(&self, function: Option<&str>, params: &Params, examples: &[Example]) -> u8 {
        if let Some(name) = function {
            return self.report(name, params).await;
        }

        if !params.is_empty() {
            let err = ClientError::InvalidOperation {
                name: "<none>".to_string(),
                hint: usage(),
            };
            eprintln!("{}", render_error(&err));
            return 1;
        }

        let mut status = 1;
        let mut ran = 0;
        for example in examples.iter().filter(|e| e.enabled) {
            info!(example = %example.name, "running example");
            status = self.report(example.operation.name(), &example.params).await;
            ran += 1;
        }

        if ran == 0 {
            eprintln!("No function given and no example enabled.\n\n{}", usage());
        }
        status
    }
}

/// Formats the delimited results block.
pub fn render_results(output: &Output) -> ClientResult<String> {
    let json = serde_json::to_string_pretty(output).map_err(std::io::Error::from)?;
    Ok(format!(
        "_____________[ RESULTS ]___________________\n{}\n___________________________________________",
        json
    ))
}

/// Formats the delimited error block.
pub fn render_error(error: &ClientError) -> String {
    format!(
        "=================[ ERROR ]=================\n{}\n===========================================",
        error
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsandbox_google::{
        DriveFile, FileList, FileListRequest, GoogleError, GoogleErrorCode, MessageList,
        MessageListRequest, Thread,
    };
    use crate::cli::Cli;
    use crate::params::split_args;
    use clap::CommandFactory;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EmptyMail {
        queries: Arc<Mutex<Vec<String>>>,
    }

    impl MailApi for EmptyMail {
        fn list_messages<'a>(
            &'a self,
            request: &'a MessageListRequest,
        ) -> BoxFuture<'a, GoogleResult<MessageList>> {
            Box::pin(async move {
                self.queries.lock().unwrap().push(request.q.clone());
                Ok(MessageList::default())
            })
        }

        fn get_thread<'a>(
            &'a self,
            _user_id: &'a str,
            _id: &'a str,
        ) -> BoxFuture<'a, GoogleResult<Thread>> {
            Box::pin(async { Ok(Thread::default()) })
        }
    }

    /// Serves two pages of one file each.
    struct TwoPages;

    impl DriveApi for TwoPages {
        fn list_files<'a>(
            &'a self,
            request: &'a FileListRequest,
        ) -> BoxFuture<'a, GoogleResult<FileList>> {
            Box::pin(async move {
                let (id, next) = match request.page_token.as_deref() {
                    None => ("f1", Some("p2".to_string())),
                    Some(_) => ("f2", None),
                };
                Ok(FileList {
                    files: vec![DriveFile {
                        id: id.to_string(),
                        name: format!("{}.txt", id),
                        mime_type: "text/plain".to_string(),
                        ..DriveFile::default()
                    }],
                    next_page_token: next,
                })
            })
        }
    }

    #[derive(Default)]
    struct CountingBackend {
        mail_calls: AtomicUsize,
        drive_calls: AtomicUsize,
        queries: Arc<Mutex<Vec<String>>>,
        deny: bool,
    }

    impl CountingBackend {
        fn calls(&self) -> usize {
            self.mail_calls.load(Ordering::SeqCst) + self.drive_calls.load(Ordering::SeqCst)
        }
    }

    impl Backend for CountingBackend {
        fn mail(&self) -> BoxFuture<'_, GoogleResult<Box<dyn MailApi>>> {
            Box::pin(async move {
                self.mail_calls.fetch_add(1, Ordering::SeqCst);
                if self.deny {
                    return Err(GoogleError::auth_denied("consent refused"));
                }
                Ok(Box::new(EmptyMail {
                    queries: self.queries.clone(),
                }) as Box<dyn MailApi>)
            })
        }

        fn drive(&self) -> BoxFuture<'_, GoogleResult<Box<dyn DriveApi>>> {
            Box::pin(async move {
                self.drive_calls.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(TwoPages) as Box<dyn DriveApi>)
            })
        }
    }

    fn harness(backend: CountingBackend) -> Harness<CountingBackend> {
        Harness::new(backend, Tz::UTC, Some("root-id".to_string()))
    }

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn bogus_function_fails_without_backend_calls() {
        let harness = harness(CountingBackend::default());

        let err = harness.invoke("bogus", &Params::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidOperation { ref name, .. } if name == "bogus"));

        let status = harness.run(Some("bogus"), &Params::new(), &[]).await;
        assert_eq!(status, 1);
        assert_eq!(harness.backend.calls(), 0);
    }

    #[tokio::test]
    async fn read_gmail_uses_mail_backend() {
        let harness = harness(CountingBackend::default());

        let output = harness
            .invoke("readGmail", &params(json!({"q": "label:inbox"})))
            .await
            .unwrap();

        assert_eq!(output, Output::Messages(vec![]));
        assert_eq!(*harness.backend.queries.lock().unwrap(), ["label:inbox"]);
        assert_eq!(harness.backend.mail_calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.backend.drive_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn numeric_flag_values_reach_string_params() {
        let harness = harness(CountingBackend::default());

        let (_, mail) = split_args(&Cli::command(), ["gsandbox", "--q=2024"]);
        harness.invoke("readGmail", &mail).await.unwrap();
        assert_eq!(*harness.backend.queries.lock().unwrap(), ["2024"]);

        let (_, drive) = split_args(&Cli::command(), ["gsandbox", "--parentFolder=12345"]);
        let Output::Files(page) = harness.invoke("listFiles", &drive).await.unwrap() else {
            panic!("expected a file page");
        };
        assert_eq!(page.parent_folder.as_deref(), Some("12345"));
    }

    #[tokio::test]
    async fn all_pages_merges_the_listing() {
        let harness = harness(CountingBackend::default());

        let Output::Files(page) = harness
            .invoke("listFiles", &params(json!({"allPages": true})))
            .await
            .unwrap()
        else {
            panic!("expected a file page");
        };

        let ids: Vec<_> = page.files.iter().flatten().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["f1", "f2"]);
        assert_eq!(page.next_page_token, None);
    }

    #[tokio::test]
    async fn list_files_uses_root_folder() {
        let harness = harness(CountingBackend::default());

        let output = harness.invoke("listFiles", &Params::new()).await.unwrap();
        let Output::Files(page) = output else {
            panic!("expected a file page");
        };
        assert_eq!(page.parent_folder.as_deref(), Some("root-id"));
        assert_eq!(page.files.map(|f| f.len()), Some(1));
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn auth_failure_is_reported() {
        let harness = harness(CountingBackend {
            deny: true,
            ..CountingBackend::default()
        });

        let err = harness.invoke("readGmail", &Params::new()).await.unwrap_err();
        let ClientError::Google(err) = err else {
            panic!("expected a Google error");
        };
        assert_eq!(err.code(), GoogleErrorCode::AuthDenied);
        assert_eq!(harness.run(Some("readGmail"), &Params::new(), &[]).await, 1);
    }

    #[tokio::test]
    async fn mistyped_params_are_rejected() {
        let harness = harness(CountingBackend::default());
        let err = harness
            .invoke("listFiles", &params(json!({"recursive": "maybe"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidParams(_)));
        assert_eq!(harness.backend.calls(), 0);
    }

    #[tokio::test]
    async fn example_table_runs_enabled_entries() {
        let harness = harness(CountingBackend::default());
        let examples = example_table("a");

        let status = harness.run(None, &Params::new(), &examples).await;

        assert_eq!(status, 0);
        assert_eq!(harness.backend.mail_calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.backend.drive_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn nothing_enabled_is_usage_error() {
        let harness = harness(CountingBackend::default());
        let mut examples = example_table("a");
        examples.iter_mut().for_each(|e| e.enabled = false);

        assert_eq!(harness.run(None, &Params::new(), &examples).await, 1);
        assert_eq!(harness.backend.calls(), 0);
    }

    #[tokio::test]
    async fn params_without_function_is_usage_error() {
        let harness = harness(CountingBackend::default());
        let status = harness
            .run(None, &params(json!({"q": "label:inbox"})), &example_table("a"))
            .await;
        assert_eq!(status, 1);
        assert_eq!(harness.backend.calls(), 0);
    }

    #[test]
    fn example_table_entries() {
        let examples = example_table("reports");
        let names: Vec<_> = examples.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            ["Read Gmail", "List Files in reports", "List Folders in reports"]
        );
        assert!(!examples[2].enabled);
        assert_eq!(examples[2].params.get("listFolders"), Some(&json!(true)));
    }

    #[test]
    fn operation_names() {
        assert_eq!(Operation::from_name("readGmail"), Some(Operation::ReadGmail));
        assert_eq!(Operation::from_name("listfiles"), None);
    }

    #[test]
    fn usage_listing() {
        insta::assert_snapshot!(usage(), @r"
        Example usage:
          gsandbox --inputFunction=readGmail --q=label:inbox
          gsandbox --inputFunction=listFiles --gDrivePrefix=a

        List of functions:
          readGmail  [q, userId, pageToken]
          listFiles  [parentFolder, pageToken, recursive, gDrivePrefix, listFolders, fields, allPages]
        ");
    }

    #[test]
    fn results_block() {
        let block = render_results(&Output::Messages(vec![])).unwrap();
        assert!(block.starts_with("_____________[ RESULTS ]"));
        assert!(block.contains("\n[]\n"));
    }
}
