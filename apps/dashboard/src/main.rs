use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client_core::{DashboardController, FetchOutcome, HttpAgentInvoker, ShareOutcome};
use shared::domain::ConnectionStatus;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::load_settings;
use render::{render_connection, render_repositories};

#[derive(Parser, Debug)]
#[command(name = "dashboard")]
#[command(about = "Check GitHub connectivity, list repositories and share a summary via agents")]
struct Args {
    /// Path to a configuration file (defaults to ./dashboard.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Agent service endpoint (overrides config and environment)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Serve built-in sample repositories instead of calling the data agent
    #[arg(long, global = true)]
    sample: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Ask the data agent whether the GitHub account is connected
    Status,
    /// Fetch repositories and their recent commits
    Repos,
    /// Fetch repositories, then ask the manager agent to email a summary
    Share {
        #[arg(long)]
        to: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the requested action succeeded.
async fn run(args: Args) -> Result<bool> {
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(endpoint) = args.endpoint {
        settings.agent_endpoint = endpoint;
    }
    if args.sample {
        settings.use_sample_data = true;
    }

    let endpoint = settings.endpoint_url()?;
    info!(endpoint = %endpoint, sample = settings.use_sample_data, "starting dashboard");
    let invoker = HttpAgentInvoker::new(endpoint, settings.invoker_options())
        .context("failed to set up agent transport")?;
    let controller = DashboardController::new(invoker, settings.agents());
    controller.set_use_sample_data(settings.use_sample_data);

    match args.command {
        Command::Status => {
            controller.check_connection().await;
            let state = controller.snapshot();
            println!("{}", render_connection(&state));
            Ok(state.connection_status == ConnectionStatus::Connected)
        }
        Command::Repos => {
            let outcome = controller.fetch_repositories().await;
            print!(
                "{}",
                render_repositories(&controller.displayed_repositories(), Utc::now())
            );
            match outcome {
                FetchOutcome::Sample(_) | FetchOutcome::Loaded(_) => Ok(true),
                FetchOutcome::Failed(message) => {
                    eprintln!("{message}");
                    Ok(false)
                }
            }
        }
        Command::Share { to } => {
            if let FetchOutcome::Failed(message) = controller.fetch_repositories().await {
                eprintln!("{message}");
            }
            match controller.share_via_email(&to).await {
                ShareOutcome::Sent(message) => {
                    println!("{message}");
                    Ok(true)
                }
                ShareOutcome::Rejected(message) | ShareOutcome::Failed(message) => {
                    eprintln!("{message}");
                    Ok(false)
                }
            }
        }
    }
}
