use std::io;

/// Typed error hierarchy for the relay.
/// Classifies errors as client-facing, locally recovered, or fatal.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    // Client-facing — reported to the producer, no relay-state change
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("unsupported payload shape: {0}")]
    UnsupportedShape(String),

    // Recovered locally — the offending viewer is dropped
    #[error("send to viewer {viewer} failed")]
    SendFailure { viewer: String },

    // Fatal at startup
    #[error("failed to listen on port {port}: {source}")]
    Listen { port: u16, source: io::Error },
}

impl RelayError {
    /// Only a bind failure takes the process down; everything else is
    /// answered or absorbed and the relay keeps running.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Listen { .. })
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "malformed_payload",
            Self::UnsupportedShape(_) => "unsupported_shape",
            Self::SendFailure { .. } => "send_failure",
            Self::Listen { .. } => "listen",
        }
    }
}
