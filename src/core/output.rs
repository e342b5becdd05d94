use serde::Serialize;
use serde_json::Value;

/// Envelope printed by commands running with `--json`
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonOutput {
    Success {
        success: bool,
        command: String,
        result: Value,
    },
    Failure {
        success: bool,
        command: String,
        error: JsonError,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl JsonOutput {
    pub fn success(command: impl Into<String>, result: impl Serialize) -> Self {
        JsonOutput::Success {
            success: true,
            command: command.into(),
            result: serde_json::to_value(result).unwrap_or(Value::Null),
        }
    }

    pub fn failure(command: impl Into<String>, message: impl Into<String>, code: Option<&str>) -> Self {
        JsonOutput::Failure {
            success: false,
            command: command.into(),
            error: JsonError {
                message: message.into(),
                code: code.map(str::to_string),
            },
        }
    }

    pub fn print(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(text) => println!("{}", text),
            Err(e) => tracing::warn!("Failed to serialize JSON output: {}", e),
        }
    }
}
