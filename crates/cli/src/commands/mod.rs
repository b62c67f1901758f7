pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;
pub mod smoke;

use serde::Serialize;
use serde_json::Value;

/// Terminal outcome of one CLI command: a process exit code plus a single
/// JSON line on stdout that automation can parse.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &'static str, message: impl Into<String>) -> Self {
        Self::from_outcome(CommandOutcome {
            command,
            status: "ok",
            error_class: None,
            message: message.into(),
            details: None,
        })
    }

    pub fn success_with_details(
        command: &'static str,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self::from_outcome(CommandOutcome {
            command,
            status: "ok",
            error_class: None,
            message: message.into(),
            details: Some(details),
        })
    }

    pub fn failure(
        command: &'static str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let outcome = CommandOutcome {
            command,
            status: "error",
            error_class: Some(error_class.to_string()),
            message: message.into(),
            details: None,
        };
        Self { exit_code, output: serialize_payload(outcome) }
    }

    fn from_outcome(outcome: CommandOutcome) -> Self {
        Self { exit_code: 0, output: serialize_payload(outcome) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
