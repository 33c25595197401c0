//! Display helpers for models and chat turns.

use crate::protocol::{ChatMessage, ModelDescriptor, Role};
use std::time::Duration;

const BYTES_PER_GB: f64 = (1024u64 * 1024 * 1024) as f64;

/// Render the model list shown after connecting.
pub fn format_model_info(models: &[ModelDescriptor]) -> String {
    if models.is_empty() {
        return "No models found.".to_string();
    }

    let mut lines = vec!["\n📋 Available models:".to_string()];
    for model in models {
        lines.push(format!(
            "- {} ({:.1}GB, {})",
            model.name,
            model.size as f64 / BYTES_PER_GB,
            model.parameter_size().unwrap_or("unknown")
        ));
    }
    lines.join("\n")
}

/// Build a chat message for the request payload.
pub fn format_chat_message(role: Role, content: impl Into<String>) -> ChatMessage {
    ChatMessage {
        role,
        content: content.into(),
    }
}

/// Seconds with two decimals, e.g. `3.14`.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}", elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(value: serde_json::Value) -> ModelDescriptor {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_format_empty_models() {
        assert_eq!(format_model_info(&[]), "No models found.");
    }

    #[test]
    fn test_format_model_line() {
        let models = vec![model(json!({
            "name": "llama3:latest",
            "size": 4294967296u64,
            "details": {"parameter_size": "8B"}
        }))];
        let text = format_model_info(&models);
        assert!(text.contains("Available models:"));
        assert!(text.contains("- llama3:latest (4.0GB, 8B)"));
    }

    #[test]
    fn test_format_model_unknown_parameter_size() {
        let models = vec![
            model(json!({"name": "phi3:mini", "size": 2176178913u64})),
            model(json!({"name": "tiny", "size": 0, "details": {}})),
        ];
        let text = format_model_info(&models);
        assert!(text.contains("- phi3:mini (2.0GB, unknown)"));
        assert!(text.contains("- tiny (0.0GB, unknown)"));
    }

    #[test]
    fn test_format_chat_message() {
        let msg = format_chat_message(Role::User, "Why is the sky blue?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Why is the sky blue?");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(1234)), "1.23");
        assert_eq!(format_elapsed(Duration::ZERO), "0.00");
    }
}
