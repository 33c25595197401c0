//! Ollama API client.
//!
//! Ollama is a local LLM server; this client covers the three calls the CLI
//! needs: `/api/version`, `/api/tags` and `/api/chat`.

use crate::config::Endpoint;
use crate::protocol::{ChatMessage, ChatOptions, ChatRequest, ModelDescriptor, TagsResponse};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use std::io::Write;
use tracing::debug;

/// Failures from a single request to the Ollama server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, DNS failure, timeout.
    #[error("failed to reach Ollama at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with something other than 200.
    #[error("Ollama returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The body was not the JSON we expected.
    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Client for a single Ollama server.
///
/// Holds one connection pool for its whole lifetime; dropping the client
/// releases it.
pub struct OllamaClient {
    endpoint: Endpoint,
    default_model: String,
    client: Client,
}

impl OllamaClient {
    /// Create a new client. Fails only if the HTTP stack cannot be set up.
    pub fn new(
        endpoint: Endpoint,
        default_model: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        // The server is local; never route it through HTTP(S)_PROXY.
        let client = Client::builder()
            .timeout(endpoint.timeout())
            .no_proxy()
            .build()?;

        Ok(Self {
            endpoint,
            default_model: default_model.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Check whether the server is up. Any failure reads as `false`.
    pub async fn check_server(&self) -> bool {
        let url = self.endpoint.url("/api/version");
        match self.client.get(&url).send().await {
            Ok(response) => {
                debug!("GET {} -> {}", url, response.status());
                response.status() == StatusCode::OK
            }
            Err(e) => {
                debug!("GET {} failed: {}", url, e);
                false
            }
        }
    }

    /// List installed models; errors are reported and yield an empty list.
    pub async fn list_models(&self) -> Vec<ModelDescriptor> {
        match self.try_list_models().await {
            Ok(models) => models,
            Err(e) => {
                report(&format!("Error listing models: {}", e));
                Vec::new()
            }
        }
    }

    /// `GET /api/tags`, returning the `models` array.
    pub async fn try_list_models(&self) -> Result<Vec<ModelDescriptor>, ClientError> {
        let url = self.endpoint.url("/api/tags");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        let body = read_success_body(&url, response).await?;
        let tags: TagsResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let models = tags.into_models();
        debug!("Found {} models", models.len());
        Ok(models)
    }

    /// Send a chat request; errors are reported and yield `None`.
    ///
    /// `model` falls back to the client's default. `options` is passed
    /// through verbatim.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        options: &ChatOptions,
    ) -> Option<Value> {
        match self.try_chat(messages, model, options).await {
            Ok(response) => Some(response),
            Err(e) => {
                report_chat_error(&mut std::io::stderr(), &e);
                None
            }
        }
    }

    /// `POST /api/chat` without streaming, returning the parsed body unmodified.
    pub async fn try_chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        options: &ChatOptions,
    ) -> Result<Value, ClientError> {
        let url = self.endpoint.url("/api/chat");
        let request = ChatRequest {
            model: model.unwrap_or(&self.default_model),
            messages,
            stream: false,
            options,
        };
        debug!(
            "POST {} (model: {}, {} messages)",
            url,
            request.model,
            messages.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        let body = read_success_body(&url, response).await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Decode {
            url,
            reason: e.to_string(),
        })
    }
}

/// Read the body of a response, turning non-200 statuses into errors.
async fn read_success_body(url: &str, response: reqwest::Response) -> Result<String, ClientError> {
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status { status, body });
    }

    response.text().await.map_err(|source| ClientError::Transport {
        url: url.to_string(),
        source,
    })
}

/// Surface a client failure on stderr without aborting the run.
fn report(message: &str) {
    report_to(&mut std::io::stderr(), message);
}

/// Each message is written once; the log line stays at debug so the
/// default filter does not echo it.
fn report_to<W: Write>(out: &mut W, message: &str) {
    debug!("client error reported: {}", message);
    let _ = writeln!(out, "{}", message);
}

fn report_chat_error<W: Write>(out: &mut W, error: &ClientError) {
    match error {
        ClientError::Status { status, body } => {
            report_to(out, &format!("Error from Ollama API: {}", status.as_u16()));
            report_to(out, body);
        }
        other => report_to(out, &format!("Error communicating with Ollama API: {}", other)),
    }
}
