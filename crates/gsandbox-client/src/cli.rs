//! Command-line interface definition.
//!
//! Only the harness's own flags are declared here. Operation parameters
//! (`--q=label:inbox`, `--gDrivePrefix a`, ...) are split off before clap
//! sees the arguments; see [`crate::params::split_args`].

use std::path::PathBuf;

use clap::Parser;

use gsandbox_core::TracingOutputFormat;
use gsandbox_google::AuthStrategy;

/// gsandbox - exercise the Gmail and Google Drive APIs
#[derive(Debug, Default, Parser)]
#[command(name = "gsandbox")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Operation parameters are passed as extra flags, e.g.\n  \
    gsandbox --inputFunction=readGmail --q=label:inbox\n  \
    gsandbox --inputFunction=listFiles --gDrivePrefix=a")]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "GSANDBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format (compact, pretty, json)
    #[arg(long, value_name = "FORMAT", env = "GSANDBOX_LOG_FORMAT")]
    pub log_format: Option<TracingOutputFormat>,

    /// Abort the whole invocation after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Delete the stored Gmail token before authorizing
    #[arg(long)]
    pub reset_token: bool,

    /// Operation to run (readGmail, listFiles); runs the example table when absent
    #[arg(long = "inputFunction", value_name = "NAME")]
    pub input_function: Option<String>,

    // --- Credentials ---
    /// Installed-app OAuth credentials file
    #[arg(long, env = "GSANDBOX_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Service-account key file
    #[arg(long, env = "GSANDBOX_SERVICE_ACCOUNT")]
    pub service_account: Option<PathBuf>,

    /// Where the Gmail token record is stored
    #[arg(long, env = "GSANDBOX_TOKEN_PATH")]
    pub token_path: Option<PathBuf>,

    /// Authorization used by readGmail
    #[arg(long, value_name = "STRATEGY")]
    pub mail_strategy: Option<AuthStrategy>,

    /// Authorization used by listFiles
    #[arg(long, value_name = "STRATEGY")]
    pub drive_strategy: Option<AuthStrategy>,

    // --- Scopes and targets ---
    /// Gmail scope override
    #[arg(long, env = "GOOGLE_GMAIL_SCOPE")]
    pub gmail_scope: Option<String>,

    /// Drive scope override
    #[arg(long, env = "GOOGLE_DRIVE_SCOPE")]
    pub drive_scope: Option<String>,

    /// Drive folder listed when no parentFolder is given
    #[arg(long, env = "GDRIVE_ROOT_FOLDER")]
    pub root_folder: Option<String>,

    /// IANA timezone for rendered dates
    #[arg(long, env = "GSANDBOX_TIMEZONE")]
    pub timezone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_input_function() {
        let cli = Cli::try_parse_from([
            "gsandbox",
            "--inputFunction=listFiles",
            "--drive-strategy",
            "service-account",
            "--timeout",
            "20",
        ])
        .unwrap();
        assert_eq!(cli.input_function.as_deref(), Some("listFiles"));
        assert_eq!(cli.drive_strategy, Some(AuthStrategy::ServiceAccount));
        assert_eq!(cli.timeout, Some(20));
    }

    #[test]
    fn parse_log_format() {
        let cli = Cli::try_parse_from(["gsandbox", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, Some(TracingOutputFormat::Json));
        assert!(Cli::try_parse_from(["gsandbox", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let result = Cli::try_parse_from(["gsandbox", "--mail-strategy", "magic"]);
        assert!(result.is_err());
    }
}
