//! `strava-sync`: authorize once, then keep `activities.json` up to date.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use strava_activity_sync::{
    ActivitySync, AppConfig, AuthorizationFlow, AuthorizationOptions, DEFAULT_ACTIVITIES_PATH,
    DEFAULT_CALLBACK_PORT, DEFAULT_CREDENTIALS_PATH, DEFAULT_LIMIT, MAX_LIMIT, StravaClient,
    SyncError, SyncMode, SyncOptions,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Strava activities updater
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Credentials file with CLIENT_ID, CLIENT_SECRET and the saved tokens
    #[arg(long, global = true, default_value = DEFAULT_CREDENTIALS_PATH)]
    credentials: PathBuf,

    /// JSON file the activities are kept in
    #[arg(long, global = true, default_value = DEFAULT_ACTIVITIES_PATH)]
    activities: PathBuf,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Perform the one-time browser authorization and save tokens
    Authorize {
        /// Local port for the OAuth redirect (must match the app's callback domain)
        #[arg(long, default_value_t = DEFAULT_CALLBACK_PORT)]
        port: u16,

        /// Seconds to wait for the browser to come back
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,

        /// Log the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Fetch recent activities and merge them into the activities file
    Sync {
        /// Replace the activities file instead of appending new activities
        #[arg(long)]
        full_refresh: bool,

        /// Number of activities to fetch
        #[arg(long, default_value_t = DEFAULT_LIMIT,
              value_parser = clap::value_parser!(u32).range(1..=MAX_LIMIT as i64))]
        limit: u32,

        /// Fail instead of starting over when the activities file is not valid JSON
        #[arg(long)]
        strict_store: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<SyncError>() {
                Some(inner) if inner.is_configuration() => {
                    tracing::error!("Configuration error: {:#}", e)
                }
                _ => tracing::error!("An error occurred: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(&cli.credentials, &cli.activities)?;
    let client = StravaClient::new(config.strava.clone()).context("initializing Strava client")?;
    let tokens = config.token_store();

    match cli.command {
        Command::Authorize {
            port,
            timeout_secs,
            no_browser,
        } => {
            let options = AuthorizationOptions {
                port,
                timeout: Duration::from_secs(timeout_secs),
            };
            let flow = AuthorizationFlow::new(&client, &tokens, options);
            if no_browser {
                flow.run_with(|url| {
                    tracing::info!(%url, "Open this URL in a browser to authorize access");
                    Ok(())
                })?;
            } else {
                flow.run()?;
            }
        }
        Command::Sync {
            full_refresh,
            limit,
            strict_store,
        } => {
            let store = config.activity_store();
            let options = SyncOptions {
                mode: if full_refresh {
                    SyncMode::FullRefresh
                } else {
                    SyncMode::Incremental
                },
                limit,
                strict_store,
            };
            let outcome = ActivitySync::new(&client, &tokens, &store).run(&options)?;
            if outcome.written {
                tracing::info!(
                    added = outcome.added,
                    total = outcome.total,
                    skipped = outcome.skipped,
                    "Successfully updated activities file"
                );
            }
        }
    }
    Ok(())
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .init(),
    }
}
