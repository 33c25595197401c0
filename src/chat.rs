//! One run of the client: health check, model listing, a single chat turn.
//!
//! Every step is terminal on failure; there is no retry and no going back.

use crate::format::{format_chat_message, format_elapsed, format_model_info};
use crate::ollama::OllamaClient;
use crate::protocol::{reply_content, reply_message, ChatOptions, ConversationHistory, Role};
use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Write;
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;

/// What to ask and how.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub prompt: String,
    /// Overrides the client's default model.
    pub model: Option<String>,
    /// Sent before the user prompt when present.
    pub system: Option<String>,
    pub options: ChatOptions,
}

/// Where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    ServerUnavailable,
    NoModels,
    ChatFailed,
}

impl RunOutcome {
    pub fn code(self) -> u8 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::ServerUnavailable | RunOutcome::NoModels | RunOutcome::ChatFailed => 1,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

/// Drive a full run, writing status lines to `out`.
pub async fn run<W: Write>(
    client: &OllamaClient,
    settings: &ChatSettings,
    out: &mut W,
) -> Result<RunOutcome> {
    writeln!(out, "Using Ollama server at: {}", client.endpoint().base_url())?;

    writeln!(out, "🔍 Checking Ollama server...")?;
    if !check_ollama_server(client, out).await? {
        return Ok(RunOutcome::ServerUnavailable);
    }

    writeln!(out, "\n📡 Fetching available models...")?;
    let model = settings.model.as_deref().unwrap_or(client.default_model());
    if !list_available_models(client, model, out).await? {
        return Ok(RunOutcome::NoModels);
    }

    let mut history = ConversationHistory::new();
    if let Some(system) = &settings.system {
        history.push(format_chat_message(Role::System, system.as_str()));
    }
    history.push(format_chat_message(Role::User, settings.prompt.as_str()));

    let response = chat_with_model(client, &history, model, &settings.options, out).await?;
    let Some(response) = response else {
        return Ok(RunOutcome::ChatFailed);
    };

    if let Some(reply) = reply_message(&response) {
        history.push(reply);
    }
    info!("Conversation finished with {} messages", history.messages().len());

    print_response(&response, out)?;
    Ok(RunOutcome::Completed)
}

async fn check_ollama_server<W: Write>(client: &OllamaClient, out: &mut W) -> Result<bool> {
    if client.check_server().await {
        writeln!(out, "✅ Connected to Ollama server")?;
        Ok(true)
    } else {
        writeln!(out, "❌ Could not connect to Ollama server")?;
        writeln!(
            out,
            "Please make sure Ollama is running. You can start it with: ollama serve"
        )?;
        Ok(false)
    }
}

async fn list_available_models<W: Write>(
    client: &OllamaClient,
    model: &str,
    out: &mut W,
) -> Result<bool> {
    let models = client.list_models().await;
    if models.is_empty() {
        writeln!(
            out,
            "\nℹ️  No models found. Try pulling a model first with: ollama pull {}",
            model
        )?;
        return Ok(false);
    }

    writeln!(out, "{}", format_model_info(&models))?;
    Ok(true)
}

async fn chat_with_model<W: Write>(
    client: &OllamaClient,
    history: &ConversationHistory,
    model: &str,
    options: &ChatOptions,
    out: &mut W,
) -> Result<Option<Value>> {
    writeln!(out, "\n🚀 Sending request to Ollama (this may take a moment)...")?;
    out.flush()?;
    let started = Instant::now();

    let Some(response) = client.chat(history.messages(), Some(model), options).await else {
        writeln!(out, "\n❌ Failed to get a response from the model.")?;
        return Ok(None);
    };

    writeln!(
        out,
        "\n✅ Response received in {} seconds",
        format_elapsed(started.elapsed())
    )?;
    writeln!(out, "{}", "-".repeat(50))?;
    Ok(Some(response))
}

fn print_response<W: Write>(response: &Value, out: &mut W) -> Result<()> {
    if let Some(content) = reply_content(response) {
        writeln!(out, "{}", content)?;
    }
    let pretty = serde_json::to_string_pretty(response).context("Failed to serialize response")?;
    writeln!(out, "{}", pretty)?;
    Ok(())
}
