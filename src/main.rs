//! CLI entry point for songbridge.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use songbridge_core::config::Config;
use songbridge_core::model::ErrorResponse;
use songbridge_core::search::{SearchOrchestrator, SearchRequest, SearchTarget};
use tracing::{debug, error};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "resolution failed");
            let body = serde_json::to_string(&ErrorResponse::new(format!("{err:#}")))
                .unwrap_or_else(|_| String::from(r#"{"error":"unknown error"}"#));
            println!("{body}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<()> {
    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let orchestrator = SearchOrchestrator::from_config(&config)
        .await
        .context("Failed to initialize resolver")?;

    let target = match (&args.link, &args.search_id) {
        (Some(link), _) => SearchTarget::Link(link.clone()),
        (None, Some(id)) => SearchTarget::SearchId(id.clone()),
        (None, None) => anyhow::bail!("No link or search id given"),
    };
    let request = SearchRequest {
        target,
        adapters: args.adapters.clone(),
    };

    let mut stdout = io::stdout().lock();
    if args.headless {
        for url in orchestrator.search_headless(&request).await? {
            writeln!(stdout, "{url}")?;
        }
    } else {
        let result = orchestrator.search(&request).await?;
        serde_json::to_writer_pretty(&mut stdout, &result)?;
        writeln!(stdout)?;
    }
    Ok(())
}
