use anyhow::Result;
use clap::Parser;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use vacation_responder::cli::{self, Cli, Commands};
use vacation_responder::client::{GmailMailClient, MailClient};
use vacation_responder::config::Config;
use vacation_responder::error::ResponderError;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        eprintln!("\nFor help, run: vacation-responder --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // aws-lc-rs everywhere except Windows, where ring avoids the NASM/CMake toolchain
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("vacation_responder=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("vacation_responder=info,warn"))
    };

    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .init();
    }

    match cli.command {
        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");

            if let Some(parent) = cli.token_cache.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            if force && cli.token_cache.exists() {
                tokio::fs::remove_file(&cli.token_cache).await?;
                tracing::info!("Removed existing token cache");
            }

            let config = Config::load(&cli.config).await?;
            let hub =
                vacation_responder::auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache)
                    .await?;

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", cli.token_cache);

            let client = GmailMailClient::new(hub, &config.client);
            println!("Connected to account: {}", client.account_address().await?);

            Ok(())
        }

        Commands::Run { dry_run, once } => {
            if let Some(parent) = cli.token_cache.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            if dry_run {
                println!("Running in DRY RUN mode - no replies will be sent");
            }

            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutdown requested, finishing current cycle");
                    signal_token.cancel();
                }
            });

            if let Some(summary) = cli::run_responder(&cli, dry_run, once, shutdown).await? {
                println!("\n========================================");
                println!("Cycle Summary");
                println!("========================================");
                println!("Cycle ID: {}", summary.cycle_id);
                println!("Started: {}", summary.started_at.format("%Y-%m-%d %H:%M:%S"));
                println!("Candidates found: {}", summary.found);
                println!("Replied: {}", summary.succeeded);
                println!("Skipped: {}", summary.skipped);
                println!("Reconciliation gaps: {}", summary.reconciliation_gaps);
                if summary.previewed > 0 {
                    println!("Previewed (dry run): {}", summary.previewed);
                }
                println!("========================================");
            }

            Ok(())
        }

        Commands::InitConfig { output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !force {
                return Err(ResponderError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(&output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nKey settings to review:");
            println!("  - responder.label_name: Label applied to answered messages");
            println!("  - schedule.min_interval_secs / max_interval_secs: Polling window");
            println!("  - execution.dry_run: Compose replies without sending");

            Ok(())
        }
    }
}
