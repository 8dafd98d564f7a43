//! Realtime protocol: the JSON frames exchanged with the iHuman `/ws`
//! endpoint, plus the execution status values shared with the HTTP API.
//!
//! Inbound frames are envelopes tagged by `type`:
//!
//! | `type`               | Fields                                  |
//! |----------------------|-----------------------------------------|
//! | `execution-progress` | `executionId`, `progress`, `status`     |
//! | `execution-complete` | `executionId`, `result`, `durationMs`   |
//! | `execution-error`    | `executionId`, `error`                  |
//! | `execution-log`      | `executionId`, `level`, `message`       |
//!
//! Any other `type` decodes to [`InboundMessage::Unknown`] so newer servers
//! can add message kinds without breaking older clients.
//!
//! Only `type` and `executionId` are typed. Every other field is carried as
//! the JSON value the server sent; a field is malformed only when absent.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server → client envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "execution-progress")]
    ExecutionProgress {
        #[serde(rename = "executionId")]
        execution_id: String,
        /// Percentage, normally `0..=100`.
        progress: Value,
        status: Value,
    },

    #[serde(rename = "execution-complete")]
    ExecutionComplete {
        #[serde(rename = "executionId")]
        execution_id: String,
        result: Value,
        #[serde(rename = "durationMs")]
        duration_ms: Value,
    },

    #[serde(rename = "execution-error")]
    ExecutionError {
        #[serde(rename = "executionId")]
        execution_id: String,
        error: Value,
    },

    #[serde(rename = "execution-log")]
    ExecutionLog {
        #[serde(rename = "executionId")]
        execution_id: String,
        level: Value,
        message: Value,
    },

    /// Any envelope whose `type` is not recognized.
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Decode one text frame.
    ///
    /// Fails on invalid JSON, a missing `type`, a non-string `executionId`,
    /// or a recognized `type` with a missing field.
    pub fn parse(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    pub fn execution_id(&self) -> Option<&str> {
        match self {
            Self::ExecutionProgress { execution_id, .. }
            | Self::ExecutionComplete { execution_id, .. }
            | Self::ExecutionError { execution_id, .. }
            | Self::ExecutionLog { execution_id, .. } => Some(execution_id),
            Self::Unknown => None,
        }
    }
}

/// Client → server frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    Subscribe {
        #[serde(rename = "executionId")]
        execution_id: String,
    },
    Unsubscribe {
        #[serde(rename = "executionId")]
        execution_id: String,
    },
    /// Ask the server to push the current state of an execution.
    RequestUpdate {
        #[serde(rename = "executionId")]
        execution_id: String,
    },
}

impl OutboundMessage {
    pub fn execution_id(&self) -> &str {
        match self {
            Self::Subscribe { execution_id }
            | Self::Unsubscribe { execution_id }
            | Self::RequestUpdate { execution_id } => execution_id,
        }
    }
}

/// Lifecycle of one skill execution.
///
/// The client only passes this through as a filter value; it never
/// interprets transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
