//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::{GmailMailClient, MailClient};
use crate::config::Config;
use crate::error::Result;
use crate::scheduler::{self, CycleSummary, ResponderContext, Scheduler};

#[derive(Parser, Debug)]
#[command(name = "vacation-responder")]
#[command(version = "0.1.0")]
#[command(about = "Unattended Gmail vacation auto-responder", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".vacation-responder/token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Start answering unlabeled inbox messages
    Run {
        /// Compose replies but never send or label
        #[arg(long)]
        dry_run: bool,

        /// Run a single cycle immediately and exit
        #[arg(long)]
        once: bool,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Load config, authenticate and drive the responder
///
/// Returns the summary of the single cycle when `once` is set.
pub async fn run_responder(
    cli: &Cli,
    dry_run: bool,
    once: bool,
    shutdown: CancellationToken,
) -> Result<Option<CycleSummary>> {
    let mut config = Config::load(&cli.config).await?;
    if dry_run {
        config.execution.dry_run = true;
    }
    config.validate()?;

    info!("Authenticating with Gmail API...");
    let hub = crate::auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?;
    let client: Arc<dyn MailClient> = Arc::new(GmailMailClient::new(hub, &config.client));

    if once {
        let ctx = Arc::new(ResponderContext::initialize(client, &config).await?);
        let summary = Scheduler::single_shot(ctx).run_once().await?;
        return Ok(Some(summary));
    }

    scheduler::start(client, &config, shutdown).await?;
    Ok(None)
}
