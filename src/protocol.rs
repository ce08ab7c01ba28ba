//! IPC protocol types for daemon communication.

use crate::tools::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Run one tool against the daemon's store.
    Call { call: ToolCall },

    /// Shutdown the daemon.
    Shutdown,

    /// Ping to check if daemon is alive.
    Ping,
}

/// Response sent from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Tool result envelope, successful or not.
    Result { value: Value },

    /// Operation succeeded.
    Ok,

    /// Pong response to ping.
    Pong,

    /// The request itself could not be handled.
    Error { message: String },
}

impl Response {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
