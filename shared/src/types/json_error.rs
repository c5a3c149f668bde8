use serde::{Deserialize, Serialize};

/// Standard error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            status: "error".to_string(),
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// Body returned by the trigger endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerAck {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl TriggerAck {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: "Event broadcasted successfully".to_string(),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            message: "Failed to broadcast event".to_string(),
        }
    }
}
