//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/gsandbox/config.toml` by default. Command-line flags and their
//! environment variables take precedence over the file.
//!
//! ```toml
//! timezone = "Europe/Paris"
//!
//! [google]
//! credentials = "/home/me/.config/gsandbox/gmail-credentials.json"
//! service_account = "/home/me/.config/gsandbox/google-drive-creds.json"
//! root_folder = "0AbCdEfGhIjK"
//! mail_strategy = "stored-token"
//! drive_strategy = "service-account"
//!
//! [examples]
//! drive_prefix = "a"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gsandbox_core::{Tz, resolve_timezone};
use gsandbox_google::{AuthConfig, AuthStrategy, DRIVE_SCOPE, GMAIL_READONLY_SCOPE};

use crate::cli::Cli;
use crate::error::{ClientError, ClientResult};

/// Configuration for the gsandbox client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// IANA timezone for rendered dates.
    pub timezone: Option<String>,

    /// Google credentials and targets.
    pub google: GoogleSettings,

    /// Settings for the built-in example table.
    pub examples: ExampleSettings,
}

/// Google credential and API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// Installed-app OAuth credentials file.
    pub credentials: Option<PathBuf>,

    /// Service-account key file.
    pub service_account: Option<PathBuf>,

    /// Path to token storage.
    pub token_path: Option<PathBuf>,

    /// Gmail scope override.
    pub gmail_scope: Option<String>,

    /// Drive scope override.
    pub drive_scope: Option<String>,

    /// Drive folder listed when no parent folder is given.
    pub root_folder: Option<String>,

    /// Authorization used for Gmail operations.
    pub mail_strategy: Option<AuthStrategy>,

    /// Authorization used for Drive operations.
    pub drive_strategy: Option<AuthStrategy>,

    /// Token-endpoint timeout in seconds.
    pub timeout: Option<u64>,
}

/// Settings for the built-in example table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleSettings {
    /// Drive path whose last segment names the folder to list.
    pub drive_prefix: String,
}

impl Default for ExampleSettings {
    fn default() -> Self {
        Self {
            drive_prefix: "a".to_string(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gsandbox")
    }
}

/// Settings after merging the command line over `config.toml`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials_path: PathBuf,
    pub service_account_path: PathBuf,
    pub token_path: PathBuf,
    pub scopes: Vec<String>,
    pub root_folder: Option<String>,
    pub mail_strategy: AuthStrategy,
    pub drive_strategy: AuthStrategy,
    pub timezone: Tz,
    pub request_timeout: Duration,
    pub reset_token: bool,
    pub drive_prefix: String,
}

impl Settings {
    /// Merges `cli` over `config`, filling the rest with defaults.
    pub fn resolve(cli: &Cli, config: &ClientConfig) -> ClientResult<Self> {
        let google = &config.google;
        let config_dir = ClientConfig::default_config_dir();

        let timezone_name = cli.timezone.as_deref().or(config.timezone.as_deref());
        let timezone = resolve_timezone(timezone_name)
            .map_err(|e| ClientError::Config(e.to_string()))?;

        let gmail_scope = cli
            .gmail_scope
            .clone()
            .or_else(|| google.gmail_scope.clone())
            .unwrap_or_else(|| GMAIL_READONLY_SCOPE.to_string());
        let drive_scope = cli
            .drive_scope
            .clone()
            .or_else(|| google.drive_scope.clone())
            .unwrap_or_else(|| DRIVE_SCOPE.to_string());

        Ok(Self {
            credentials_path: cli
                .credentials
                .clone()
                .or_else(|| google.credentials.clone())
                .unwrap_or_else(|| config_dir.join("gmail-credentials.json")),
            service_account_path: cli
                .service_account
                .clone()
                .or_else(|| google.service_account.clone())
                .unwrap_or_else(|| config_dir.join("google-drive-creds.json")),
            token_path: cli
                .token_path
                .clone()
                .or_else(|| google.token_path.clone())
                .unwrap_or_else(AuthConfig::default_token_path),
            scopes: vec![gmail_scope, drive_scope],
            root_folder: cli
                .root_folder
                .clone()
                .or_else(|| google.root_folder.clone())
                .filter(|f| !f.is_empty()),
            mail_strategy: cli
                .mail_strategy
                .or(google.mail_strategy)
                .unwrap_or(AuthStrategy::StoredToken),
            drive_strategy: cli
                .drive_strategy
                .or(google.drive_strategy)
                .unwrap_or(AuthStrategy::ServiceAccount),
            timezone,
            request_timeout: Duration::from_secs(
                google.timeout.unwrap_or(AuthConfig::DEFAULT_TIMEOUT_SECS),
            ),
            reset_token: cli.reset_token,
            drive_prefix: config.examples.drive_prefix.clone(),
        })
    }

    /// Authorization settings shared by both providers.
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new()
            .with_scopes(self.scopes.clone())
            .with_token_path(&self.token_path)
            .with_timeout(self.request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn config_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            timezone = "Europe/Paris"

            [google]
            credentials = "/etc/gsandbox/creds.json"
            root_folder = "0AbC"
            mail_strategy = "interactive"
            timeout = 10

            [examples]
            drive_prefix = "reports/2024"
            "#,
        )
        .unwrap();

        assert_eq!(config.timezone.as_deref(), Some("Europe/Paris"));
        assert_eq!(
            config.google.credentials,
            Some(PathBuf::from("/etc/gsandbox/creds.json"))
        );
        assert_eq!(config.google.mail_strategy, Some(AuthStrategy::Interactive));
        assert_eq!(config.examples.drive_prefix, "reports/2024");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert!(!config.debug);
        assert_eq!(config.examples.drive_prefix, "a");
        assert!(config.google.credentials.is_none());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "debug = true\n[google]\ndrive_strategy = \"service-account\"").unwrap();

        let config = ClientConfig::load_from(file.path()).unwrap();
        assert!(config.debug);
        assert_eq!(
            config.google.drive_strategy,
            Some(AuthStrategy::ServiceAccount)
        );
    }

    #[test]
    fn load_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "google = 3").unwrap();
        let err = ClientConfig::load_from(file.path()).unwrap_err();
        assert!(err.contains("failed to parse config"));
    }

    #[test]
    fn cli_overrides_config() {
        let config = ClientConfig {
            timezone: Some("Europe/Paris".to_string()),
            google: GoogleSettings {
                root_folder: Some("from-config".to_string()),
                gmail_scope: Some("config-scope".to_string()),
                mail_strategy: Some(AuthStrategy::Interactive),
                ..GoogleSettings::default()
            },
            ..ClientConfig::default()
        };
        let cli = Cli {
            root_folder: Some("from-cli".to_string()),
            timezone: Some("America/New_York".to_string()),
            reset_token: true,
            ..Cli::default()
        };

        let settings = Settings::resolve(&cli, &config).unwrap();
        assert_eq!(settings.root_folder.as_deref(), Some("from-cli"));
        assert_eq!(settings.timezone, Tz::America__New_York);
        assert_eq!(settings.scopes, ["config-scope", DRIVE_SCOPE]);
        assert_eq!(settings.mail_strategy, AuthStrategy::Interactive);
        assert_eq!(settings.drive_strategy, AuthStrategy::ServiceAccount);
        assert!(settings.reset_token);
    }

    #[test]
    fn unknown_timezone_is_config_error() {
        let cli = Cli {
            timezone: Some("Mars/Olympus".to_string()),
            ..Cli::default()
        };
        let err = Settings::resolve(&cli, &ClientConfig::default()).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
