//! Terminal code prompt for the interactive grant.

use std::io::BufRead;

use tracing::{debug, warn};

use gsandbox_google::{BoxFuture, CodePrompt, GoogleError, GoogleResult};

/// Shows the consent URL on stderr and reads the code from stdin.
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    /// Try to open the consent URL in the default browser.
    pub open_browser: bool,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self { open_browser: true }
    }
}

impl CodePrompt for TerminalPrompt {
    fn request_code<'a>(&'a self, auth_url: &'a str) -> BoxFuture<'a, GoogleResult<String>> {
        Box::pin(async move {
            eprintln!("\nAuthorize this app by visiting this url:\n\n{}\n", auth_url);
            if self.open_browser
                && let Err(e) = open::that(auth_url)
            {
                warn!("failed to open browser: {}", e);
            }
            eprint!("Enter the code from that page here: ");

            let line = tokio::task::spawn_blocking(|| {
                let mut line = String::new();
                std::io::stdin().lock().read_line(&mut line).map(|_| line)
            })
            .await
            .map_err(|e| GoogleError::io(format!("prompt task failed: {}", e)))?
            .map_err(|e| GoogleError::io(format!("failed to read code: {}", e)).with_source(e))?;

            let code = read_code(&line)?;
            debug!("authorization code received");
            Ok(code)
        })
    }
}

/// Extracts the code from an input line.
fn read_code(line: &str) -> GoogleResult<String> {
    let code = line.trim();
    if code.is_empty() {
        return Err(GoogleError::auth_denied("no authorization code entered"));
    }
    Ok(code.to_string())
}
