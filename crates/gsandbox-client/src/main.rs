//! gsandbox CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use tracing::info;

use gsandbox_client::cli::Cli;
use gsandbox_client::config::{ClientConfig, Settings};
use gsandbox_client::error::{ClientError, ClientResult};
use gsandbox_client::harness::{GoogleBackend, Harness, example_table};
use gsandbox_client::params::{Params, split_args};
use gsandbox_client::prompt::TerminalPrompt;
use gsandbox_client::runtime;
use gsandbox_core::{TracingConfig, init_tracing};
use gsandbox_google::TokenStore;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let (args, params) = split_args(&Cli::command(), std::env::args());
    let cli = Cli::parse_from(args);

    // Load configuration
    let config = match cli.config {
        Some(ref path) => match ClientConfig::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", ClientError::Config(e));
                return ExitCode::FAILURE;
            }
        },
        None => ClientConfig::load().unwrap_or_default(),
    };

    let tracing_config = TracingConfig::cli(cli.debug || config.debug)
        .with_format(cli.log_format.unwrap_or_default());
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match runtime::block_on(run(cli, config, params)) {
        Ok(Ok(status)) => ExitCode::from(status),
        Ok(Err(e)) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: failed to start runtime: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ClientConfig, params: Params) -> ClientResult<u8> {
    let settings = Settings::resolve(&cli, &config)?;

    if settings.reset_token {
        let store = TokenStore::new(&settings.token_path);
        store.clear()?;
        info!(path = %store.path().display(), "stored token cleared");
    }

    let examples = example_table(&settings.drive_prefix);
    let harness = Harness::new(
        GoogleBackend::new(settings.clone(), Arc::new(TerminalPrompt::new())),
        settings.timezone,
        settings.root_folder.clone(),
    );

    let work = harness.run(cli.input_function.as_deref(), &params, &examples);
    match cli.timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), work)
            .await
            .map_err(|_| ClientError::Timeout(secs)),
        None => Ok(work.await),
    }
}
