pub mod config;
pub mod doctor;
pub mod evaluate;
pub mod tiers;

use serde::Serialize;
use serde_json::{json, Value};
use tierwise_core::EngineError;

pub const EXIT_CONFIG_FAILURE: u8 = 2;
pub const EXIT_INVALID_AMOUNT: u8 = 3;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

#[derive(Debug, Serialize)]
struct CommandPayload<'a> {
    command: &'a str,
    status: &'static str,
    #[serde(flatten)]
    body: Value,
}

impl CommandResult {
    /// Successful result whose JSON object carries `body`'s fields alongside
    /// `command` and `status`.
    pub fn success_json(command: &str, body: impl Serialize) -> Self {
        let body = match serde_json::to_value(body) {
            Ok(body) => body,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 1);
            }
        };

        let payload = CommandPayload { command, status: "ok", body };
        Self { exit_code: 0, output: render_json(&payload, false) }
    }

    pub fn text(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: render_json(&payload, false) }
    }

    pub fn engine_failure(command: &str, error: &EngineError) -> Self {
        let exit_code = match error {
            EngineError::Configuration(_) => EXIT_CONFIG_FAILURE,
            EngineError::InvalidAmount(_) => EXIT_INVALID_AMOUNT,
        };
        Self::failure(command, error.error_class(), error.to_string(), exit_code)
    }

    pub fn config_failure(command: &str, message: impl Into<String>) -> Self {
        Self::failure(command, "config_validation", message, EXIT_CONFIG_FAILURE)
    }
}

/// Serializes `value`, reporting a serialization failure as a JSON error object.
pub(crate) fn render_json(value: &impl Serialize, pretty: bool) -> String {
    let rendered =
        if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|error| {
        json!({
            "status": "error",
            "error_class": "serialization",
            "message": error.to_string(),
        })
        .to_string()
    })
}
