//! Gmail Vacation Responder
//!
//! An unattended auto-responder that periodically scans an inbox for messages
//! that have never been answered, sends each a canned reply, and labels the
//! message so it is never processed again.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 installed-app flow with token caching
//! - **Qualification**: a server-side Gmail query selects unanswered mail
//! - **Reply pipeline**: fetch headers, compose, send, label and archive
//! - **Label Management**: idempotent creation of the singleton label
//! - **Scheduling**: jittered polling cycles that never overlap
//!
//! Deduplication is carried entirely by the remote label: a labeled message
//! no longer matches the candidate query, so no local state is kept.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use vacation_responder::{auth, client::GmailMailClient, config::Config, scheduler};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let hub = auth::initialize_gmail_hub(
//!         "credentials.json".as_ref(),
//!         ".vacation-responder/token.json".as_ref(),
//!     )
//!     .await?;
//!
//!     let client = Arc::new(GmailMailClient::new(hub, &config.client));
//!     scheduler::start(client, &config, CancellationToken::new()).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 authentication and Gmail API initialization
//! - [`client`] - Mail provider trait and the retrying Gmail implementation
//! - [`cli`] - Command-line interface
//! - [`compose`] - Reply composition and base64url encoding
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`filter`] - Candidate qualification query
//! - [`label_manager`] - Singleton label resolution
//! - [`models`] - Core data structures
//! - [`scheduler`] - Polling loop and process context
//! - [`worker`] - Per-message reply pipeline

pub mod auth;
pub mod cli;
pub mod client;
pub mod compose;
pub mod config;
pub mod error;
pub mod filter;
pub mod label_manager;
pub mod models;
pub mod scheduler;
pub mod worker;

pub use error::{ResponderError, Result};

pub use models::{LabelCreation, LabelInfo, MessageHeaders, MessageRef, SendReceipt};

pub use config::Config;

pub use client::{GmailMailClient, MailClient};

pub use compose::{MessageComposer, ReplyDraft};
pub use filter::QualificationFilter;
pub use label_manager::LabelManager;

pub use scheduler::{
    CycleSummary, FixedIntervals, IntervalSource, JitteredInterval, ResponderContext, Scheduler,
};
pub use worker::{ReplyOutcome, ReplyWorker};

pub use cli::{Cli, Commands};
