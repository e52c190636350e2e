use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("failed to connect to {relay}: {reason}")]
    Connect { relay: String, reason: String },

    #[error("relay {0} timed out")]
    Timeout(String),

    #[error("relay protocol error: {0}")]
    Protocol(String),

    #[error("no profile found for {0}")]
    ProfileNotFound(String),

    #[error("event rejected by every relay: {0}")]
    Rejected(String),

    #[error("no relays to talk to")]
    NoRelays,
}
