use serde::Serialize;

/// Structured trace events emitted across all iHuman SDK crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    HttpCall {
        endpoint: String,
        /// `0` when no response was received.
        status: u16,
        attempt: u32,
        duration_ms: u64,
    },
    SocketOpened {
        url: String,
    },
    SocketClosed {
        reason: String,
    },
    ReconnectScheduled {
        attempt: u32,
        delay_ms: u64,
    },
    FrameDropped {
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ih_event");
    }
}
