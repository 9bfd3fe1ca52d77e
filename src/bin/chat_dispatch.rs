//! chat-dispatch: run Azure OpenAI chat-completion batches from a run document
//!
//! Usage:
//!   chat-dispatch run <file> [--concurrency <mode|N>] [--continue-on-failure]
//!   chat-dispatch models [--config <file>]
//!   chat-dispatch verify [--config <file>]

use anyhow::{bail, Context};
use azure_chat_dispatch::{ChatDispatcher, ChatDispatcherBuilder, ConcurrencyMode, RunDocument};
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "run" => cmd_run(&args[2..]).await,
        "models" => cmd_models(&args[2..]).await,
        "verify" => cmd_verify(&args[2..]).await,
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"chat-dispatch: batched Azure OpenAI chat completions

USAGE:
    chat-dispatch <COMMAND> [OPTIONS]

COMMANDS:
    run <file>                  Dispatch every item of a run document, one JSON line per item
        --concurrency <mode|N>  single, low, medium, high or a custom size (1-20)
        --continue-on-failure   Emit failures inline instead of aborting the run
    models [--config <file>]    List models available to the resource
    verify [--config <file>]    Probe the default deployment with a one-token request
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    AZURE_OPENAI_ENDPOINT       Resource endpoint, e.g. https://my-resource.openai.azure.com
    AZURE_OPENAI_API_KEY        API key
    AZURE_OPENAI_API_VERSION    API version (default 2025-01-01-preview)
    AZURE_OPENAI_DEPLOYMENT     Default deployment
    RUST_LOG                    Log filter (default info)"#
    );
}

fn cmd_version() {
    println!("chat-dispatch {}", env!("CARGO_PKG_VERSION"));
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn parse_concurrency(raw: &str) -> anyhow::Result<ConcurrencyMode> {
    Ok(match raw {
        "single" => ConcurrencyMode::Single,
        "low" => ConcurrencyMode::Low,
        "medium" => ConcurrencyMode::Medium,
        "high" => ConcurrencyMode::High,
        n => ConcurrencyMode::custom(
            n.parse()
                .with_context(|| format!("invalid --concurrency value: {n}"))?,
        ),
    })
}

fn load_document(path: &str) -> anyhow::Result<RunDocument> {
    RunDocument::from_path(Path::new(path)).with_context(|| format!("failed to load {path}"))
}

fn dispatcher_for(args: &[String]) -> anyhow::Result<ChatDispatcher> {
    let builder = match flag_value(args, "--config") {
        Some(path) => ChatDispatcherBuilder::from_document(&load_document(path)?),
        None => ChatDispatcherBuilder::new(),
    };
    Ok(builder.build()?)
}

async fn cmd_run(args: &[String]) -> anyhow::Result<()> {
    let Some(path) = args.first().filter(|a| !a.starts_with("--")) else {
        bail!("run requires a run document path");
    };
    let doc = load_document(path)?;

    let mut builder = ChatDispatcherBuilder::from_document(&doc);
    if let Some(raw) = flag_value(args, "--concurrency") {
        builder = builder.concurrency(parse_concurrency(raw)?);
    }
    if args.iter().any(|a| a == "--continue-on-failure") {
        builder = builder.continue_on_failure(true);
    }
    let dispatcher = builder.build()?;

    let report = dispatcher.run(doc.items).await?;
    for record in &report.results {
        println!("{}", serde_json::to_string(record)?);
    }
    eprintln!(
        "{} succeeded, {} failed in {} batch(es), {:.2}s",
        report.stats.succeeded,
        report.stats.failed,
        report.stats.batches,
        report.stats.elapsed.as_secs_f64()
    );
    Ok(())
}

async fn cmd_models(args: &[String]) -> anyhow::Result<()> {
    let dispatcher = dispatcher_for(args)?;
    for id in dispatcher.list_models().await {
        println!("{id}");
    }
    Ok(())
}

async fn cmd_verify(args: &[String]) -> anyhow::Result<()> {
    let dispatcher = dispatcher_for(args)?;
    dispatcher
        .verify_credentials()
        .await
        .context("credential check failed")?;
    println!("ok");
    Ok(())
}
