//! ollama-chat - A minimal command-line client for a local Ollama server.
//!
//! Checks that the server is up, lists installed models, sends one chat
//! prompt and prints the reply.

mod chat;
mod config;
mod format;
mod ollama;
mod protocol;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use chat::{ChatSettings, RunOutcome};
use clap::Parser;
use config::{Config, Endpoint};
use ollama::OllamaClient;
use protocol::OptionValue;
use std::future::Future;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_PROMPT: &str = "Why is the sky blue? Keep the answer brief.";

#[derive(Parser)]
#[command(name = "ollama-chat")]
#[command(author, version, about = "Chat with a model on a local Ollama server")]
#[command(long_about = concat!(
    "Checks the Ollama server, lists installed models and sends a single prompt.\n\n",
    "The server address is taken from --host, then OLLAMA_HOST, then the config file."
))]
struct Cli {
    /// Prompt to send
    #[arg(value_name = "PROMPT", default_value = DEFAULT_PROMPT)]
    prompt: String,

    /// Model to chat with (default from config, then llama3:latest)
    #[arg(short = 'm', long, value_name = "MODEL")]
    model: Option<String>,

    /// Ollama server address, e.g. localhost:11434
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// System message sent before the prompt
    #[arg(short = 's', long, value_name = "TEXT")]
    system: Option<String>,

    /// Sampling temperature
    #[arg(short = 't', long)]
    temperature: Option<f64>,

    /// Context window size in tokens
    #[arg(long, value_name = "TOKENS")]
    num_ctx: Option<u32>,

    /// Extra model option, repeatable (e.g. -o seed=42)
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
    options: Vec<(String, OptionValue)>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Parse a `KEY=VALUE` model option.
fn parse_option(raw: &str) -> Result<(String, OptionValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing option name in '{}'", raw));
    }
    let value = match value.trim().parse::<OptionValue>() {
        Ok(value) => value,
        Err(never) => match never {},
    };
    Ok((key.to_string(), value))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = supervise(execute(cli), interrupted(), &mut std::io::stdout()).await;
    ExitCode::from(code)
}

/// Race the run against cancellation and turn the result into an exit code.
///
/// Whichever loses the race is dropped, so an interrupted run releases the
/// client and its connections before the process exits.
async fn supervise<R, C, W>(run: R, cancel: C, out: &mut W) -> u8
where
    R: Future<Output = Result<RunOutcome>>,
    C: Future<Output = ()>,
    W: Write,
{
    let result = tokio::select! {
        result = run => result,
        () = cancel => {
            let _ = writeln!(out, "\n🛑 Operation cancelled by user.");
            return 1;
        }
    };

    match result {
        Ok(outcome) => outcome.code(),
        Err(e) => {
            let _ = writeln!(out, "\n❌ An unexpected error occurred: {:#}", e);
            1
        }
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Logs go to stderr; stdout carries the conversation. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ollama_chat={},reqwest=warn", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve configuration, build the client and drive one run.
async fn execute(cli: Cli) -> Result<RunOutcome> {
    let config = Config::load().context("Failed to load configuration")?;
    let env_host = std::env::var(config::HOST_ENV).ok();

    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.timeout());
    let endpoint = Endpoint::new(config.host(cli.host.as_deref(), env_host.as_deref()), timeout);
    debug!("Resolved endpoint {} (timeout {:?})", endpoint.base_url(), timeout);

    let settings = resolve_settings(cli, &config);
    let client = OllamaClient::new(endpoint, config.model.clone())
        .context("Failed to create HTTP client")?;

    let mut stdout = std::io::stdout();
    chat::run(&client, &settings, &mut stdout).await
}

/// Merge command-line flags over config-file defaults.
fn resolve_settings(cli: Cli, config: &Config) -> ChatSettings {
    let mut options = config.options.clone();
    if let Some(temperature) = cli.temperature {
        options.insert("temperature".to_string(), OptionValue::Float(temperature));
    }
    if let Some(num_ctx) = cli.num_ctx {
        options.insert("num_ctx".to_string(), num_ctx.into());
    }
    options.extend(cli.options);

    ChatSettings {
        prompt: cli.prompt,
        model: cli.model,
        system: cli.system,
        options,
    }
}
