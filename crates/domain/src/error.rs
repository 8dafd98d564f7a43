/// Shared error type used across all iHuman SDK crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Network or connect failure (no HTTP status was obtained).
    #[error("transport: {0}")]
    Transport(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// The server answered with a non-success HTTP status.
    #[error("request failed ({status}): {message}")]
    Request { status: u16, message: String },

    #[error("WebSocket not connected; call connect() first")]
    NotConnected,

    #[error("WebSocket already connected or reconnecting")]
    AlreadyConnected,

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status of a [`Error::Request`], if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` for failures where no response was received at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_))
    }

    /// `true` for 4xx responses.
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(400..=499))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
